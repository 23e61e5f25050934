//! End-to-end behavior of collection runs against a real index.

use std::sync::Arc;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use threadscan_core::{ScanError, SearchRequest, SortMode};
use threadscan_store::{MailIndex, MessageEntry};
use threadscan_test_helpers::{init_test_tracing, message, numbered_index, thread_id};
use threadscan_view::{CollectionView, ResultCollector, RunState, SharedListing, ViewSettings};

fn settings(capacity: usize) -> ViewSettings {
    ViewSettings {
        poll_interval: Duration::from_millis(10),
        ..ViewSettings::default()
    }
    .with_capacity(capacity)
}

/// Five single-message threads `id1`..`id5`, newest last.
fn five_threads() -> MailIndex {
    MailIndex::from_messages((1..=5).map(|i| {
        message(&format!("m{i}"), &format!("id{i}"), "Ada", i * 100).with_tags(["inbox"])
    }))
    .unwrap()
}

fn select(view: &mut CollectionView, id: &str) {
    view.select_first();
    while view.selected_thread().is_some_and(|t| t.id() != id) {
        assert!(view.select_next(), "{id} not listed");
    }
}

fn wait_finished(view: &CollectionView) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while view.is_collecting() {
        assert!(Instant::now() < deadline, "collection never finished");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn small_result_set_returns_once_run_completes() {
    init_test_tracing();
    let started = Instant::now();
    let view = CollectionView::open(numbered_index(3), settings(20), "tag:inbox").unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!view.is_collecting());
    assert_eq!(view.line_count(), 3);
    assert_eq!(view.run_state(), RunState::Completed);
}

#[test]
fn first_page_is_filled_before_open_returns() {
    let view = CollectionView::open(numbered_index(400), settings(15), "*").unwrap();
    assert!(view.line_count() >= 15);
    let snapshot = view.snapshot();
    assert_eq!(snapshot.rows.len(), 15);
    assert_eq!(snapshot.rows[0].id(), thread_id(399));
}

#[test]
fn cancellation_keeps_a_consistent_prefix() {
    init_test_tracing();
    let index = numbered_index(3_000);
    let shared = Arc::new(SharedListing::new(Duration::from_millis(5)));
    let request = SearchRequest::new("*").with_sort(SortMode::NewestFirst);
    let collector = ResultCollector::spawn(index, Arc::clone(&shared), request, true).unwrap();

    drop(shared.wait_until(|l| l.threads.len() >= 10));
    collector.cancel();
    let seen = shared.len();
    let started = Instant::now();
    let summary = collector.join();
    assert!(started.elapsed() < Duration::from_secs(5));

    assert!(matches!(
        summary.state,
        RunState::Cancelled | RunState::Completed
    ));
    assert!(!shared.is_collecting());
    let listing = shared.lock();
    assert!(listing.threads.len() <= seen + 1);
    assert_eq!(summary.collected, listing.threads.len());
    for (i, record) in listing.threads.iter().enumerate() {
        assert_eq!(record.id(), thread_id(2_999 - i));
    }
}

#[test]
fn refresh_joins_a_running_collection_promptly() {
    let mut view = CollectionView::open(numbered_index(3_000), settings(5), "*").unwrap();
    let started = Instant::now();
    view.refresh().unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(view.last_run().is_some());
    assert_eq!(view.selected_index(), Some(0));
}

#[test]
fn refresh_follows_the_selected_thread_to_its_new_position() {
    let index = five_threads();
    let mut view = CollectionView::open(index.clone(), settings(10), "tag:inbox").unwrap();
    wait_finished(&view);
    select(&mut view, "id3");
    assert_eq!(view.selected_index(), Some(2));

    // new activity moves id3 to the top of newest-first order
    index
        .add_message(message("m3b", "id3", "Grace", 900).with_reply_to("m3"))
        .unwrap();
    view.refresh().unwrap();
    wait_finished(&view);

    assert_eq!(view.line_count(), 5);
    assert_eq!(view.selected_index(), Some(0));
    assert_eq!(view.selected_thread().unwrap().id(), "id3");
    assert!(view.take_redraw());
}

#[test]
fn refresh_clamps_when_selected_thread_is_gone() {
    let index = five_threads();
    let mut view = CollectionView::open(index.clone(), settings(10), "*").unwrap();
    wait_finished(&view);
    select(&mut view, "id3");

    index.remove_thread("id3").unwrap();
    view.refresh().unwrap();
    assert_eq!(view.line_count(), 4);
    assert_eq!(view.selected_index(), Some(3));

    for id in ["id1", "id2", "id4", "id5"] {
        index.remove_thread(id).unwrap();
    }
    view.refresh().unwrap();
    assert_eq!(view.line_count(), 0);
    assert_eq!(view.selected_index(), None);
    assert_eq!(view.status()[1], "no matching threads");
}

#[test]
fn locked_store_ends_the_run_with_an_empty_listing() {
    init_test_tracing();
    let index = five_threads();
    let lock = index.lock_exclusive().unwrap();

    let started = Instant::now();
    let mut view = CollectionView::open(index.clone(), settings(10), "*").unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(view.line_count(), 0);
    assert!(!view.is_collecting());
    assert_eq!(view.run_state(), RunState::Failed);
    assert!(view.failure().is_some());

    // retry is user-driven
    drop(lock);
    view.refresh().unwrap();
    assert_eq!(view.line_count(), 5);
    assert_eq!(view.run_state(), RunState::Completed);
}

#[test]
fn opening_a_vanished_thread_is_recoverable() {
    let index = five_threads();
    let view = CollectionView::open(index.clone(), settings(10), "*").unwrap();
    let selected = view.selected_thread().unwrap();
    assert_eq!(view.open_selected().unwrap().thread_id, selected.id());

    index.remove_thread(selected.id()).unwrap();
    let err = view.open_selected().unwrap_err();
    assert!(matches!(err, ScanError::ThreadNotFound(_)));
    assert!(err.is_recoverable());
}

#[test]
fn dropping_a_busy_view_stops_its_collector() {
    let view = CollectionView::open(numbered_index(3_000), settings(2), "*").unwrap();
    let started = Instant::now();
    drop(view);
    assert!(started.elapsed() < Duration::from_secs(10));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every appended record has matched <= total, whatever the query hits.
    #[test]
    fn matched_never_exceeds_total(
        shape in prop::collection::vec((0usize..6, any::<bool>(), 0i64..1_000), 1..40)
    ) {
        let build = || {
            MailIndex::from_messages(shape.iter().enumerate().map(|(i, &(thread, tagged, date))| {
                let entry = MessageEntry::new(format!("m{i}"), format!("t{thread}"), "Ada", date);
                if tagged { entry.with_tags(["x"]) } else { entry }
            }))
            .unwrap()
        };
        let collect = |expression: &str| {
            let shared = Arc::new(SharedListing::new(Duration::from_millis(5)));
            let summary = ResultCollector::spawn(
                build(),
                Arc::clone(&shared),
                SearchRequest::new(expression),
                false,
            )
            .unwrap()
            .join();
            (summary, shared)
        };

        let (everything, shared) = collect("tag:x or -tag:x");
        prop_assert_eq!(everything.state, RunState::Completed);
        let (_, shared_tagged) = collect("tag:x");

        for listing in [shared.lock(), shared_tagged.lock()] {
            for record in &listing.threads {
                prop_assert!(record.matched_messages() <= record.total_messages());
                prop_assert!(record.matched_messages() > 0);
            }
        }
    }
}
