//! Opening a listed thread.

use chrono::{DateTime, Utc};
use serde::Serialize;
use threadscan_core::{ScanResult, relative_time, unix_to_datetime};
use threadscan_store::{MailIndex, TagCursor};

/// One message of an opened thread, in reply-tree order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailLine {
    pub id: String,
    pub from: String,
    pub subject: String,
    pub date: i64,
    pub depth: usize,
    pub tags: Vec<String>,
}

/// A thread's messages, each reply directly after the message it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadDetail {
    pub thread_id: String,
    pub subject: String,
    pub lines: Vec<DetailLine>,
}

impl ThreadDetail {
    /// Load `thread_id` on a fresh connection.
    ///
    /// A thread that vanished since it was listed yields
    /// [`ScanError::ThreadNotFound`](threadscan_core::ScanError::ThreadNotFound),
    /// which is meant to be shown to the user.
    pub fn load(index: &MailIndex, thread_id: &str) -> ScanResult<Self> {
        let db = index.open()?;
        let thread = db.find_thread(thread_id)?;
        let lines = thread
            .messages_tree()
            .map(|(message, depth)| DetailLine {
                id: message.id().to_string(),
                from: message.from().to_string(),
                subject: message.subject().to_string(),
                date: message.date(),
                depth,
                tags: TagCursor::new(message.tags()).map(str::to_string).collect(),
            })
            .collect();
        Ok(Self {
            thread_id: thread.id().to_string(),
            subject: thread.subject().to_string(),
            lines,
        })
    }

    /// Indented text lines, two spaces per nesting level.
    #[must_use]
    pub fn render(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut out = Vec::with_capacity(self.lines.len() + 1);
        out.push(format!("thread {}: {}", self.thread_id, self.subject));
        for line in &self.lines {
            let indent = "  ".repeat(line.depth);
            let when = relative_time(unix_to_datetime(line.date), now);
            let mut text = format!("{indent}{} <{}> {when}: {}", line.id, line.from, line.subject);
            if !line.tags.is_empty() {
                text.push_str(&format!(" ({})", line.tags.join(" ")));
            }
            out.push(text);
        }
        out
    }
}
