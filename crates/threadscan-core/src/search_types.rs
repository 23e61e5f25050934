//! Search request model
//!
//! [`SearchRequest`] is what a collection run is started with. It is passed
//! explicitly so the collector never reads process-wide configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Order in which the store yields threads for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SortMode {
    /// Oldest message date ascending
    OldestFirst,
    /// Newest message date descending
    #[default]
    NewestFirst,
    /// Thread identity ascending
    MessageId,
    /// Store insertion order
    Unsorted,
}

impl SortMode {
    pub const ALL: [Self; 4] = [
        Self::OldestFirst,
        Self::NewestFirst,
        Self::MessageId,
        Self::Unsorted,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OldestFirst => "oldest-first",
            Self::NewestFirst => "newest-first",
            Self::MessageId => "message-id",
            Self::Unsorted => "unsorted",
        }
    }

    /// Parse a sort mode name, accepting `_` and `-` separators.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "oldest-first" | "oldest" => Some(Self::OldestFirst),
            "newest-first" | "newest" => Some(Self::NewestFirst),
            "message-id" | "id" => Some(Self::MessageId),
            "unsorted" | "none" => Some(Self::Unsorted),
            _ => None,
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "unknown sort mode {s:?} (expected oldest-first, newest-first, message-id or unsorted)"
            ))
        })
    }
}

/// A search expression plus the order results should be produced in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The raw search expression
    pub expression: String,
    /// Result ordering
    #[serde(default)]
    pub sort: SortMode,
}

impl SearchRequest {
    #[must_use]
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            sort: SortMode::default(),
        }
    }

    #[must_use]
    pub const fn with_sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!(SortMode::parse("newest"), Some(SortMode::NewestFirst));
        assert_eq!(SortMode::parse("OLDEST_FIRST"), Some(SortMode::OldestFirst));
        assert_eq!(SortMode::parse(" message-id "), Some(SortMode::MessageId));
        assert_eq!(SortMode::parse("none"), Some(SortMode::Unsorted));
        assert_eq!(SortMode::parse("sideways"), None);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for mode in SortMode::ALL {
            assert_eq!(SortMode::parse(&mode.to_string()), Some(mode));
        }
    }

    #[test]
    fn from_str_reports_invalid_argument() {
        let err = "sideways".parse::<SortMode>().unwrap_err();
        assert_eq!(err.error_type(), "INVALID_ARGUMENT");
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&SortMode::OldestFirst).unwrap();
        assert_eq!(json, "\"oldest-first\"");
        let request: SearchRequest =
            serde_json::from_str(r#"{"expression":"tag:inbox"}"#).unwrap();
        assert_eq!(request.sort, SortMode::NewestFirst);
    }

    #[test]
    fn request_builder_sets_sort() {
        let request = SearchRequest::new("tag:unread").with_sort(SortMode::MessageId);
        assert_eq!(request.expression, "tag:unread");
        assert_eq!(request.sort, SortMode::MessageId);
    }
}
