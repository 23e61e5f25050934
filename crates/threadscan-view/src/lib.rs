//! Background result collection and the search listing it feeds.
//!
//! A [`CollectionView`] owns one [`SharedListing`] and at most one running
//! [`ResultCollector`]. The collector appends [`ThreadRecord`]s on its own
//! thread while the view waits, scrolls and relocates its selection.
//!
//! [`ThreadRecord`]: threadscan_core::ThreadRecord

#![forbid(unsafe_code)]

pub mod collector;
pub mod detail;
pub mod listing;
pub mod render;
pub mod view;

pub use collector::{ResultCollector, RunSummary, thread_record};
pub use detail::{DetailLine, ThreadDetail};
pub use listing::{Listing, ListingSnapshot, RunState, SharedListing};
pub use render::{format_row, format_rows};
pub use view::{CollectionView, ViewSettings};
