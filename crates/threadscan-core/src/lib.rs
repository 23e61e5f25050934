//! Core types, configuration, and models for threadscan
//!
//! This crate provides:
//! - Configuration management (`Config`, environment parsing)
//! - The consumer-visible thread model (`ThreadRecord`)
//! - Search request types (`SearchRequest`, `SortMode`)
//! - Timestamp helpers used by the row formatter
//! - Common error types

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod models;
pub mod search_types;
pub mod timestamps;

// Re-export key types for convenience
pub use config::{Config, env_value};
pub use error::{Error as ScanError, Result as ScanResult};
pub use models::ThreadRecord;
pub use search_types::{SearchRequest, SortMode};
pub use timestamps::{relative_time, unix_to_datetime};
