//! Shared fixtures for threadscan tests and benches.

#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Once;

use tempfile::TempDir;
use threadscan_store::{MailIndex, MessageEntry};

/// Base timestamp for fixture messages (2026-01-01T00:00:00Z).
pub const BASE_DATE: i64 = 1_767_225_600;

/// A message in `thread` dated `BASE_DATE + offset` seconds.
#[must_use]
pub fn message(id: &str, thread: &str, from: &str, offset: i64) -> MessageEntry {
    MessageEntry::new(id, thread, from, BASE_DATE + offset).with_subject(format!("Subject {id}"))
}

/// `n` single-message threads `thread-0000`.. with strictly increasing dates,
/// all tagged `inbox`; every even one is also `unread`.
///
/// Newest-first order is therefore `thread-{n-1}` down to `thread-0000`.
#[must_use]
pub fn numbered_index(n: usize) -> MailIndex {
    let messages = (0..n).map(|i| {
        let entry = message(
            &format!("msg-{i:04}"),
            &thread_id(i),
            &format!("Sender {}", i % 7),
            i64::try_from(i).unwrap_or(i64::MAX) * 60,
        );
        if i % 2 == 0 {
            entry.with_tags(["inbox", "unread"])
        } else {
            entry.with_tags(["inbox"])
        }
    });
    MailIndex::from_messages(messages).expect("fixture index is valid")
}

/// Thread id used by [`numbered_index`].
#[must_use]
pub fn thread_id(i: usize) -> String {
    format!("thread-{i:04}")
}

/// One thread `t-tree` shaped
///
/// ```text
/// root ─┬─ A ── A1
///       └─ B
/// ```
///
/// plus an unrelated single-message thread `t-other`.
#[must_use]
pub fn reply_tree_index() -> MailIndex {
    MailIndex::from_messages([
        message("root", "t-tree", "Ada", 0).with_tags(["inbox"]),
        message("A", "t-tree", "Grace", 10)
            .with_reply_to("root")
            .with_tags(["inbox", "unread"]),
        message("B", "t-tree", "Edsger", 20).with_reply_to("root"),
        message("A1", "t-tree", "Ada", 30).with_reply_to("A"),
        message("other", "t-other", "Barbara", 5).with_tags(["work"]),
    ])
    .expect("fixture index is valid")
}

/// A reply forest with `roots` top-level messages, each with `fanout`
/// replies nested `depth` levels deep. Used by benches.
#[must_use]
pub fn wide_tree_index(roots: usize, fanout: usize, depth: usize) -> MailIndex {
    let mut messages = Vec::new();
    let mut stamp = 0_i64;
    let mut level: Vec<String> = (0..roots).map(|r| format!("r{r}")).collect();
    for id in &level {
        messages.push(message(id, "t-wide", "Ada", stamp));
        stamp += 1;
    }
    for _ in 0..depth {
        let mut next = Vec::new();
        for parent in &level {
            for f in 0..fanout {
                let id = format!("{parent}.{f}");
                messages.push(message(&id, "t-wide", "Grace", stamp).with_reply_to(parent.as_str()));
                stamp += 1;
                next.push(id);
            }
        }
        level = next;
    }
    MailIndex::from_messages(messages).expect("fixture index is valid")
}

/// Save `index` into a fresh temp dir; keep the `TempDir` alive while the
/// path is in use.
#[must_use]
pub fn saved_index(index: &MailIndex) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("index.json");
    index.save_json(&path).expect("save fixture index");
    (dir, path)
}

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness. Honors `RUST_LOG`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
