//! Data models for threadscan
//!
//! [`ThreadRecord`] is the locally owned copy of a store thread handle. It is
//! built on the producer thread before the handle goes away and is immutable
//! afterwards: listings only ever append records.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::timestamps::unix_to_datetime;

/// Tag marking threads that still have unread messages.
pub const UNREAD_TAG: &str = "unread";

/// One row of a search listing.
///
/// # Constraints
/// - `id`: stable within a query; used to relocate the selection on refresh.
/// - `matched_messages <= total_messages`, enforced by [`ThreadRecord::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadRecord {
    id: String,
    newest_date: i64,
    matched_messages: usize,
    total_messages: usize,
    authors: String,
    subject: String,
    tags: BTreeSet<String>,
}

impl ThreadRecord {
    /// Create a record with its identity, newest activity (unix seconds) and
    /// message counts.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRecord`] if more messages matched than exist.
    pub fn new(
        id: impl Into<String>,
        newest_date: i64,
        matched_messages: usize,
        total_messages: usize,
    ) -> Result<Self> {
        let id = id.into();
        if matched_messages > total_messages {
            return Err(Error::InvalidRecord {
                id,
                matched: matched_messages,
                total: total_messages,
            });
        }
        Ok(Self {
            id,
            newest_date,
            matched_messages,
            total_messages,
            authors: String::new(),
            subject: String::new(),
            tags: BTreeSet::new(),
        })
    }

    #[must_use]
    pub fn with_authors(mut self, authors: impl Into<String>) -> Self {
        self.authors = authors.into();
        self
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Newest activity as unix seconds.
    #[must_use]
    pub const fn newest_date(&self) -> i64 {
        self.newest_date
    }

    #[must_use]
    pub fn newest_datetime(&self) -> DateTime<Utc> {
        unix_to_datetime(self.newest_date)
    }

    #[must_use]
    pub const fn matched_messages(&self) -> usize {
        self.matched_messages
    }

    #[must_use]
    pub const fn total_messages(&self) -> usize {
        self.total_messages
    }

    #[must_use]
    pub fn authors(&self) -> &str {
        &self.authors
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    #[must_use]
    pub fn is_unread(&self) -> bool {
        self.has_tag(UNREAD_TAG)
    }

    /// Every message in the thread matched the query.
    #[must_use]
    pub const fn is_complete_match(&self) -> bool {
        self.matched_messages == self.total_messages
    }
}
