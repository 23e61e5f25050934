//! Indexed mail store for threadscan.
//!
//! A [`MailIndex`] holds messages grouped into threads. Readers open a
//! [`Database`] connection and run a [`Query`] against it, walking the
//! results with [`ThreadCursor`], [`MessageCursor`], [`TagCursor`] or, for a
//! thread's reply forest, [`TreeCursor`].

#![forbid(unsafe_code)]

pub mod cursor;
pub mod entry;
pub mod error;
pub mod handles;
pub mod index;
pub mod query;
pub mod tree;

pub use cursor::{
    CursorKind, MessageCursor, MessageKind, TagCursor, TagKind, ThreadCursor, ThreadKind,
    TypedCursor,
};
pub use entry::MessageEntry;
pub use error::{StoreError, StoreResult};
pub use handles::{Message, Messages, Tags, Thread, Threads};
pub use index::{Database, ExclusiveLock, MailIndex};
pub use query::{Query, QueryExpr};
pub use tree::TreeCursor;
