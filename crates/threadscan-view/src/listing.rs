//! The listing shared between a collection run and its view.
//!
//! Records, selection and scroll offset live behind one mutex. The
//! `collecting` flag sits outside it so the producer can poll it per record
//! and a waiting consumer can observe a finished run without the lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use threadscan_core::ThreadRecord;

/// Lifecycle of the most recent collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Collecting,
    /// Query exhausted.
    Completed,
    /// Stopped by the consumer before the query was exhausted.
    Cancelled,
    /// The run could not open the store, run the query or finish cleanly.
    Failed,
}

impl RunState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Collecting => "collecting",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// State guarded by the listing mutex.
#[derive(Debug, Default)]
pub struct Listing {
    /// Append-only within a run, in store sort order.
    pub threads: Vec<ThreadRecord>,
    pub selected: usize,
    pub offset: usize,
    /// Incremented whenever a run starts; records from other runs are refused.
    pub generation: u64,
    pub run: RunState,
    /// Why the latest run failed, if it did.
    pub failure: Option<String>,
}

impl Listing {
    #[must_use]
    pub fn position_of(&self, id: &str, from: usize) -> Option<usize> {
        self.threads
            .get(from..)?
            .iter()
            .position(|record| record.id() == id)
            .map(|pos| pos + from)
    }

    /// Keep `selected` inside the listing (0 when empty).
    pub fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.threads.len().saturating_sub(1));
    }

    /// Shift `offset` so `selected` lies in `[offset, offset + capacity)`.
    pub fn scroll_to_selection(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset.saturating_add(capacity) {
            self.offset = self.selected + 1 - capacity;
        }
    }
}

/// A lock-consistent copy of the visible part of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingSnapshot {
    /// Records `first_row..first_row + rows.len()`.
    pub rows: Vec<ThreadRecord>,
    pub first_row: usize,
    pub total: usize,
    /// `None` when the listing is empty.
    pub selected: Option<usize>,
    pub collecting: bool,
    pub run: RunState,
}

impl ListingSnapshot {
    pub(crate) fn capture(listing: &Listing, capacity: usize, collecting: bool) -> Self {
        let total = listing.threads.len();
        let first_row = listing.offset.min(total);
        let end = first_row.saturating_add(capacity).min(total);
        Self {
            rows: listing.threads[first_row..end].to_vec(),
            first_row,
            total,
            selected: (total > 0).then_some(listing.selected),
            collecting,
            run: listing.run,
        }
    }

    /// Whether the row at absolute index `row` is the selection.
    #[must_use]
    pub fn is_selected(&self, row: usize) -> bool {
        self.selected == Some(row)
    }
}

/// Listing, wake-up condition and collecting flag shared by a view and the
/// collector feeding it.
#[derive(Debug)]
pub struct SharedListing {
    listing: Mutex<Listing>,
    changed: Condvar,
    collecting: AtomicBool,
    poll_interval: Duration,
}

impl SharedListing {
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            listing: Mutex::new(Listing::default()),
            changed: Condvar::new(),
            collecting: AtomicBool::new(false),
            poll_interval,
        }
    }

    /// Lock the listing. A poisoned lock is recovered; the data is append-only
    /// records and plain indexes, never left half-updated.
    pub fn lock(&self) -> MutexGuard<'_, Listing> {
        self.listing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_collecting(&self) -> bool {
        self.collecting.load(Ordering::Acquire)
    }

    pub fn set_collecting(&self, collecting: bool) {
        self.collecting.store(collecting, Ordering::Release);
    }

    /// Lower the flag on behalf of run `generation` and wake waiters.
    ///
    /// A no-op once a newer run owns the listing, so a late producer can
    /// never stop its successor.
    pub fn stop_generation(&self, generation: u64) -> bool {
        let listing = self.lock();
        if listing.generation != generation {
            return false;
        }
        self.set_collecting(false);
        drop(listing);
        self.notify();
        true
    }

    /// Wake every waiter.
    pub fn notify(&self) {
        self.changed.notify_all();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().threads.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Append a record produced by run `generation` and wake waiters.
    ///
    /// Refused (returns `false`) once the flag is down or a newer run owns
    /// the listing, so nothing lands after a stop request has been seen under
    /// the lock.
    pub fn push(&self, generation: u64, record: ThreadRecord) -> bool {
        let mut listing = self.lock();
        if listing.generation != generation || !self.is_collecting() {
            return false;
        }
        listing.threads.push(record);
        drop(listing);
        self.changed.notify_one();
        true
    }

    /// Block until `done` holds or collection is no longer running.
    ///
    /// Each wait is bounded by the poll interval and the flag is re-read
    /// every iteration, so a producer that dies without signalling cannot
    /// strand the caller. Returns the guard so the caller can act on the
    /// state it observed.
    pub fn wait_until<F>(&self, mut done: F) -> MutexGuard<'_, Listing>
    where
        F: FnMut(&Listing) -> bool,
    {
        let mut listing = self.lock();
        while !done(&listing) && self.is_collecting() {
            listing = self
                .changed
                .wait_timeout(listing, self.poll_interval)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        listing
    }
}
