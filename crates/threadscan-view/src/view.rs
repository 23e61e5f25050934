//! The search listing a user scrolls through while results arrive.
//!
//! # Refresh protocol
//!
//! 1. Cancel and join the running collection (never two runs at once).
//! 2. Remember the id of the selected thread.
//! 3. Clear the listing and start a new run.
//! 4. While the run is live, scan newly appended records for the remembered
//!    id. Once the run has finished, one last scan covers records appended
//!    just before it ended. Not found: the selection clamps to the last row.
//! 5. Wait until the rows from the current offset fill the viewport or the
//!    run has finished, then scroll the selection into view.

use std::sync::Arc;
use std::time::Duration;

use threadscan_core::{Config, ScanError, ScanResult, SearchRequest, SortMode, ThreadRecord};
use threadscan_store::{MailIndex, QueryExpr};

use crate::collector::{ResultCollector, RunSummary};
use crate::detail::ThreadDetail;
use crate::listing::{Listing, ListingSnapshot, RunState, SharedListing};

/// Everything a view needs from configuration, passed in explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSettings {
    /// Rows the viewport can show.
    pub capacity: usize,
    pub sort: SortMode,
    pub poll_interval: Duration,
    pub yield_between_records: bool,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            capacity: 24,
            sort: SortMode::NewestFirst,
            poll_interval: Duration::from_millis(50),
            yield_between_records: true,
        }
    }
}

impl ViewSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            capacity: config.view_rows.max(1),
            sort: config.sort_mode,
            poll_interval: config.poll_interval(),
            yield_between_records: config.yield_between_records,
        }
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub const fn with_sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }
}

pub struct CollectionView {
    index: MailIndex,
    settings: ViewSettings,
    request: SearchRequest,
    shared: Arc<SharedListing>,
    collector: Option<ResultCollector>,
    last_run: Option<RunSummary>,
    redraw: bool,
}

impl std::fmt::Debug for CollectionView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionView")
            .field("expression", &self.request.expression)
            .field("settings", &self.settings)
            .field("lines", &self.line_count())
            .field("collecting", &self.is_collecting())
            .finish_non_exhaustive()
    }
}

impl CollectionView {
    /// Create a view for `expression` and start collecting.
    ///
    /// Returns once the first page is filled or the run has finished. A
    /// malformed expression is rejected here, before any thread starts.
    pub fn open(index: MailIndex, settings: ViewSettings, expression: &str) -> ScanResult<Self> {
        QueryExpr::parse(expression)?;
        let request = SearchRequest::new(expression).with_sort(settings.sort);
        let shared = Arc::new(SharedListing::new(settings.poll_interval));
        let mut view = Self {
            index,
            settings,
            request,
            shared,
            collector: None,
            last_run: None,
            redraw: true,
        };
        view.start()?;
        Ok(view)
    }

    /// Start a fresh run from the top of the listing and wait for the first
    /// page.
    pub fn start(&mut self) -> ScanResult<()> {
        self.stop();
        {
            let mut listing = self.shared.lock();
            listing.threads.clear();
            listing.selected = 0;
            listing.offset = 0;
        }
        self.spawn_collector()?;

        let capacity = self.settings.capacity;
        let len = self
            .shared
            .wait_until(|l| l.threads.len() >= capacity)
            .threads
            .len();
        tracing::debug!(
            expression = %self.request.expression,
            rows = len,
            collecting = self.shared.is_collecting(),
            "first page ready"
        );
        self.redraw = true;
        Ok(())
    }

    /// Re-run the query, keeping the selection on the same thread if it is
    /// still listed.
    pub fn refresh(&mut self) -> ScanResult<()> {
        self.stop();

        let remembered = {
            let listing = self.shared.lock();
            listing
                .threads
                .get(listing.selected)
                .map(|record| record.id().to_string())
        };
        {
            let mut listing = self.shared.lock();
            listing.threads.clear();
            listing.selected = 0;
        }
        self.spawn_collector()?;

        let found = match remembered.as_deref() {
            Some(id) => self.relocate(id),
            None => false,
        };

        let capacity = self.settings.capacity;
        let mut listing = self
            .shared
            .wait_until(|l| l.threads.len() >= l.offset.saturating_add(capacity));
        if !found {
            listing.selected = if remembered.is_some() {
                listing.threads.len().saturating_sub(1)
            } else {
                0
            };
        }
        listing.clamp_selection();
        listing.scroll_to_selection(capacity);
        tracing::debug!(
            expression = %self.request.expression,
            remembered = remembered.as_deref().unwrap_or(""),
            found,
            selected = listing.selected,
            rows = listing.threads.len(),
            "refresh settled"
        );
        drop(listing);

        self.redraw = true;
        Ok(())
    }

    /// Scan the growing listing for `id` and select it. Returns whether it
    /// was found.
    fn relocate(&self, id: &str) -> bool {
        let mut scanned = 0;
        loop {
            // Flag first: if the run was already over, this scan sees its
            // final records.
            let finished = !self.shared.is_collecting();
            {
                let mut listing = self.shared.lock();
                if let Some(pos) = listing.position_of(id, scanned) {
                    listing.selected = pos;
                    return true;
                }
                scanned = listing.threads.len();
            }
            if finished {
                return false;
            }
            drop(self.shared.wait_until(|l| l.threads.len() > scanned));
        }
    }

    /// Cancel and join the running collection, if any.
    pub fn stop(&mut self) -> Option<RunSummary> {
        let collector = self.collector.take()?;
        collector.cancel();
        let summary = collector.join();
        tracing::debug!(
            state = summary.state.as_str(),
            collected = summary.collected,
            "collection stopped"
        );
        self.last_run = Some(summary);
        Some(summary)
    }

    fn spawn_collector(&mut self) -> ScanResult<()> {
        let collector = ResultCollector::spawn(
            self.index.clone(),
            Arc::clone(&self.shared),
            self.request.clone(),
            self.settings.yield_between_records,
        )?;
        self.collector = Some(collector);
        Ok(())
    }

    /// Change the viewport height.
    pub fn set_capacity(&mut self, rows: usize) {
        self.settings.capacity = rows.max(1);
        self.make_selection_visible();
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.settings.capacity
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        &self.request.expression
    }

    #[must_use]
    pub const fn settings(&self) -> &ViewSettings {
        &self.settings
    }

    #[must_use]
    pub const fn last_run(&self) -> Option<RunSummary> {
        self.last_run
    }

    // ── Navigation ──────────────────────────────────────────────────────────

    /// Move the selection to `target`, clamped to the listing. Returns
    /// whether it moved.
    fn move_selection(&mut self, target: impl FnOnce(&Listing) -> usize) -> bool {
        let capacity = self.settings.capacity;
        let moved = {
            let mut listing = self.shared.lock();
            if listing.threads.is_empty() {
                return false;
            }
            let next = target(&listing).min(listing.threads.len() - 1);
            let moved = next != listing.selected;
            listing.selected = next;
            listing.scroll_to_selection(capacity);
            moved
        };
        if moved {
            self.redraw = true;
        }
        moved
    }

    pub fn select_next(&mut self) -> bool {
        self.move_selection(|l| l.selected.saturating_add(1))
    }

    pub fn select_previous(&mut self) -> bool {
        self.move_selection(|l| l.selected.saturating_sub(1))
    }

    pub fn page_down(&mut self) -> bool {
        let capacity = self.settings.capacity;
        self.move_selection(|l| l.selected.saturating_add(capacity))
    }

    pub fn page_up(&mut self) -> bool {
        let capacity = self.settings.capacity;
        self.move_selection(|l| l.selected.saturating_sub(capacity))
    }

    pub fn select_first(&mut self) -> bool {
        self.move_selection(|_| 0)
    }

    /// Select the last row collected so far.
    pub fn select_last(&mut self) -> bool {
        self.move_selection(|l| l.threads.len().saturating_sub(1))
    }

    /// Adjust the scroll offset so the selection is on screen.
    pub fn make_selection_visible(&mut self) {
        let capacity = self.settings.capacity;
        let mut listing = self.shared.lock();
        let offset = listing.offset;
        listing.clamp_selection();
        listing.scroll_to_selection(capacity);
        if listing.offset != offset {
            self.redraw = true;
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// `None` while the listing is empty.
    #[must_use]
    pub fn selected_index(&self) -> Option<usize> {
        let listing = self.shared.lock();
        (!listing.threads.is_empty()).then_some(listing.selected)
    }

    #[must_use]
    pub fn selected_thread(&self) -> Option<ThreadRecord> {
        let listing = self.shared.lock();
        listing.threads.get(listing.selected).cloned()
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.shared.len()
    }

    #[must_use]
    pub fn is_collecting(&self) -> bool {
        self.shared.is_collecting()
    }

    #[must_use]
    pub fn run_state(&self) -> RunState {
        self.shared.lock().run
    }

    /// Why the latest run failed, if it did.
    #[must_use]
    pub fn failure(&self) -> Option<String> {
        self.shared.lock().failure.clone()
    }

    /// Copy the visible rows out under the lock.
    #[must_use]
    pub fn snapshot(&self) -> ListingSnapshot {
        let listing = self.shared.lock();
        ListingSnapshot::capture(&listing, self.settings.capacity, self.shared.is_collecting())
    }

    /// Status lines: the search terms, then the position in the listing.
    #[must_use]
    pub fn status(&self) -> Vec<String> {
        let (len, selected) = {
            let listing = self.shared.lock();
            (listing.threads.len(), listing.selected)
        };
        let mut position = if len == 0 {
            "no matching threads".to_string()
        } else {
            format!("thread {} of {len}", selected + 1)
        };
        if self.shared.is_collecting() {
            position.push_str(" (collecting)");
        }
        vec![
            format!("search-terms: \"{}\"", self.request.expression),
            position,
        ]
    }

    /// Open the selected thread on a fresh connection.
    pub fn open_selected(&self) -> ScanResult<ThreadDetail> {
        let record = self
            .selected_thread()
            .ok_or_else(|| ScanError::InvalidArgument("no thread selected".into()))?;
        ThreadDetail::load(&self.index, record.id()).inspect_err(|err| {
            tracing::info!(
                thread = record.id(),
                error = %err,
                "selected thread could not be opened"
            );
        })
    }

    /// Whether something changed since the last call.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }
}

impl Drop for CollectionView {
    fn drop(&mut self) {
        self.stop();
    }
}
