//! Background collection of query results into a [`SharedListing`].
//!
//! A run lives on its own thread and opens its own store connection there;
//! a [`Database`](threadscan_store::Database) never crosses threads. For each
//! thread the query yields, the producer copies the handle into a
//! [`ThreadRecord`] without holding the listing lock, then takes the lock
//! only to append and signal.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use threadscan_core::{ScanError, ScanResult, SearchRequest, ThreadRecord};
use threadscan_store::{MailIndex, Query, TagCursor, Thread, ThreadCursor};

use crate::listing::{RunState, SharedListing};

/// Outcome of one collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub state: RunState,
    pub collected: usize,
    pub elapsed: Duration,
}

/// Copy the fields of a store thread handle into an owned record.
pub fn thread_record(thread: &Thread<'_>) -> ScanResult<ThreadRecord> {
    Ok(ThreadRecord::new(
        thread.id(),
        thread.newest_date(),
        thread.matched_messages(),
        thread.total_messages(),
    )?
    .with_authors(thread.authors())
    .with_subject(thread.subject())
    .with_tags(TagCursor::new(thread.tags())))
}

/// Handle on a running collection. Dropping it cancels and joins the run.
#[derive(Debug)]
pub struct ResultCollector {
    shared: Arc<SharedListing>,
    generation: u64,
    handle: Option<JoinHandle<RunSummary>>,
}

impl ResultCollector {
    /// Start a run for `request`. The listing is not cleared here; callers
    /// reset it before starting.
    ///
    /// Fails with [`ScanError::Collector`] while another run on `shared` is
    /// still collecting; cancel it first.
    pub fn spawn(
        index: MailIndex,
        shared: Arc<SharedListing>,
        request: SearchRequest,
        yield_between_records: bool,
    ) -> ScanResult<Self> {
        let generation = {
            let mut listing = shared.lock();
            if shared.is_collecting() {
                return Err(ScanError::Collector(format!(
                    "run {} is still collecting into this listing",
                    listing.generation
                )));
            }
            listing.generation += 1;
            listing.run = RunState::Collecting;
            listing.failure = None;
            shared.set_collecting(true);
            listing.generation
        };

        let worker_shared = Arc::clone(&shared);
        let spawned = thread::Builder::new()
            .name(format!("threadscan-collector-{generation}"))
            .spawn(move || {
                run_collection(
                    &index,
                    &worker_shared,
                    &request,
                    generation,
                    yield_between_records,
                )
            });

        match spawned {
            Ok(handle) => Ok(Self {
                shared,
                generation,
                handle: Some(handle),
            }),
            Err(err) => {
                let message = format!("failed to spawn collector thread: {err}");
                finish_run(&shared, generation, RunState::Failed, Some(message.clone()));
                shared.stop_generation(generation);
                Err(ScanError::Collector(message))
            }
        }
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Ask the producer to stop at its next record. Has no effect on a
    /// newer run sharing the listing.
    pub fn cancel(&self) {
        self.shared.stop_generation(self.generation);
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the producer thread to exit.
    pub fn join(mut self) -> RunSummary {
        self.join_inner()
    }

    fn join_inner(&mut self) -> RunSummary {
        let Some(handle) = self.handle.take() else {
            return RunSummary {
                state: self.shared.lock().run,
                collected: 0,
                elapsed: Duration::ZERO,
            };
        };
        if let Ok(summary) = handle.join() {
            return summary;
        }
        tracing::error!(generation = self.generation, "collector thread panicked");
        let collected = {
            let mut listing = self.shared.lock();
            if listing.generation == self.generation {
                listing.run = RunState::Failed;
                listing.failure = Some("collector thread panicked".into());
            }
            listing.threads.len()
        };
        RunSummary {
            state: RunState::Failed,
            collected,
            elapsed: Duration::ZERO,
        }
    }
}

impl Drop for ResultCollector {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel();
            self.join_inner();
        }
    }
}

/// Lowers the collecting flag and wakes waiters when the producer exits,
/// including by unwinding.
struct FinishGuard<'a> {
    shared: &'a SharedListing,
    generation: u64,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.shared.stop_generation(self.generation);
    }
}

fn run_collection(
    index: &MailIndex,
    shared: &SharedListing,
    request: &SearchRequest,
    generation: u64,
    yield_between_records: bool,
) -> RunSummary {
    let _finish = FinishGuard { shared, generation };
    let started = Instant::now();
    let mut collected = 0;

    tracing::debug!(
        generation,
        expression = %request.expression,
        sort = %request.sort,
        "collection run started"
    );
    let outcome = collect(
        index,
        shared,
        request,
        generation,
        yield_between_records,
        &mut collected,
    );
    let (state, failure) = match outcome {
        Ok(true) => (RunState::Completed, None),
        Ok(false) => (RunState::Cancelled, None),
        Err(err) => {
            tracing::warn!(
                generation,
                error = %err,
                error_type = err.error_type(),
                "collection run failed"
            );
            (RunState::Failed, Some(err.to_string()))
        }
    };
    finish_run(shared, generation, state, failure);

    let summary = RunSummary {
        state,
        collected,
        elapsed: started.elapsed(),
    };
    tracing::debug!(
        generation,
        state = state.as_str(),
        collected,
        elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
        "collection run finished"
    );
    summary
}

/// Returns `Ok(true)` when the query was exhausted, `Ok(false)` when the run
/// was stopped first.
fn collect(
    index: &MailIndex,
    shared: &SharedListing,
    request: &SearchRequest,
    generation: u64,
    yield_between_records: bool,
    collected: &mut usize,
) -> ScanResult<bool> {
    let db = index.open()?;
    let mut query = Query::new(&db, &request.expression)?;
    query.set_sort(request.sort);
    let mut cursor = ThreadCursor::new(query.search_threads());

    while cursor.valid() {
        if !shared.is_collecting() {
            return Ok(false);
        }
        let thread = cursor.current();
        if let Some(record) = usable_record(thread.id(), thread_record(&thread)) {
            if !shared.push(generation, record) {
                return Ok(false);
            }
            tracing::trace!(generation, thread = thread.id(), "record appended");
            *collected += 1;
        }
        cursor.advance();
        if yield_between_records {
            thread::yield_now();
        }
    }
    Ok(true)
}

/// A thread whose record cannot be built is logged and left out; the run
/// goes on with the next one.
fn usable_record(thread_id: &str, record: ScanResult<ThreadRecord>) -> Option<ThreadRecord> {
    record
        .inspect_err(|err| {
            tracing::warn!(
                thread = thread_id,
                error = %err,
                "skipping malformed thread"
            );
        })
        .ok()
}

fn finish_run(shared: &SharedListing, generation: u64, state: RunState, failure: Option<String>) {
    let mut listing = shared.lock();
    if listing.generation == generation {
        listing.run = state;
        listing.failure = failure;
    }
}
