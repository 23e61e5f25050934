//! Stored message records

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// One indexed message as persisted in the JSON index file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntry {
    pub id: String,
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    pub from: String,
    #[serde(default)]
    pub subject: String,
    /// Unix seconds.
    pub date: i64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
}

impl MessageEntry {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        thread_id: impl Into<String>,
        from: impl Into<String>,
        date: i64,
    ) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            in_reply_to: None,
            from: from.into(),
            subject: String::new(),
            date,
            tags: BTreeSet::new(),
            body: String::new(),
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    #[must_use]
    pub fn with_reply_to(mut self, parent: impl Into<String>) -> Self {
        self.in_reply_to = Some(parent.into());
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
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub(crate) fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(StoreError::InvalidMessage("message id is empty".into()));
        }
        if self.thread_id.trim().is_empty() {
            return Err(StoreError::InvalidMessage(format!(
                "message {} has an empty thread id",
                self.id
            )));
        }
        if self.tags.iter().any(|t| t.is_empty() || t.contains(char::is_whitespace)) {
            return Err(StoreError::InvalidMessage(format!(
                "message {} carries an empty or whitespace tag",
                self.id
            )));
        }
        Ok(())
    }
}
