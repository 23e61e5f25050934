//! Typed forward cursors over the store's raw sequences.
//!
//! One generic [`TypedCursor`] serves every element kind. A kind binds the
//! raw sequence type, the element handle it yields and the identity used for
//! equality; adding a kind means implementing [`CursorKind`] once.
//!
//! ```
//! use threadscan_store::{MailIndex, MessageEntry, TagCursor};
//!
//! let index = MailIndex::from_messages([
//!     MessageEntry::new("m1", "t1", "Ada", 0).with_tags(["inbox", "unread"]),
//! ])?;
//! let db = index.open()?;
//! let tags: Vec<&str> = TagCursor::new(db.all_tags()).collect();
//! assert_eq!(tags, ["inbox", "unread"]);
//! # Ok::<(), threadscan_store::StoreError>(())
//! ```

use std::fmt;
use std::marker::PhantomData;

use crate::handles::{Message, Messages, Tags, Thread, Threads};

/// Binding between a raw sequence type and the cursor that walks it.
pub trait CursorKind<'db> {
    type Raw;
    type Item;
    type Id: PartialEq;

    fn get(raw: &Self::Raw) -> Option<Self::Item>;
    fn valid(raw: &Self::Raw) -> bool;
    fn move_to_next(raw: &mut Self::Raw);
    fn identity(item: &Self::Item) -> Self::Id;
}

#[derive(Debug)]
pub enum MessageKind {}

#[derive(Debug)]
pub enum ThreadKind {}

#[derive(Debug)]
pub enum TagKind {}

impl<'db> CursorKind<'db> for MessageKind {
    type Raw = Messages<'db>;
    type Item = Message<'db>;
    type Id = &'db str;

    fn get(raw: &Self::Raw) -> Option<Self::Item> {
        raw.get()
    }

    fn valid(raw: &Self::Raw) -> bool {
        raw.valid()
    }

    fn move_to_next(raw: &mut Self::Raw) {
        raw.move_to_next();
    }

    fn identity(item: &Self::Item) -> Self::Id {
        item.id()
    }
}

impl<'db> CursorKind<'db> for ThreadKind {
    type Raw = Threads<'db>;
    type Item = Thread<'db>;
    type Id = &'db str;

    fn get(raw: &Self::Raw) -> Option<Self::Item> {
        raw.get()
    }

    fn valid(raw: &Self::Raw) -> bool {
        raw.valid()
    }

    fn move_to_next(raw: &mut Self::Raw) {
        raw.move_to_next();
    }

    fn identity(item: &Self::Item) -> Self::Id {
        item.id()
    }
}

impl<'db> CursorKind<'db> for TagKind {
    type Raw = Tags<'db>;
    type Item = &'db str;
    type Id = &'db str;

    fn get(raw: &Self::Raw) -> Option<Self::Item> {
        raw.get()
    }

    fn valid(raw: &Self::Raw) -> bool {
        raw.valid()
    }

    fn move_to_next(raw: &mut Self::Raw) {
        raw.move_to_next();
    }

    fn identity(item: &Self::Item) -> Self::Id {
        item
    }
}

/// Single-pass forward cursor over a raw sequence.
///
/// A cursor is either at a position (it owns the raw sequence) or the end
/// sentinel. Two cursors are equal when both are exhausted, or when both
/// are valid and their current elements have the same identity.
pub struct TypedCursor<'db, K: CursorKind<'db>> {
    raw: Option<K::Raw>,
    _kind: PhantomData<fn() -> K>,
}

pub type MessageCursor<'db> = TypedCursor<'db, MessageKind>;
pub type ThreadCursor<'db> = TypedCursor<'db, ThreadKind>;
pub type TagCursor<'db> = TypedCursor<'db, TagKind>;

impl<'db, K: CursorKind<'db>> TypedCursor<'db, K> {
    /// Cursor positioned at the first element of `raw`.
    #[must_use]
    pub const fn new(raw: K::Raw) -> Self {
        Self {
            raw: Some(raw),
            _kind: PhantomData,
        }
    }

    /// The end sentinel.
    #[must_use]
    pub const fn end() -> Self {
        Self {
            raw: None,
            _kind: PhantomData,
        }
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.raw.as_ref().is_some_and(K::valid)
    }

    /// The current element.
    ///
    /// # Panics
    /// Panics if the cursor is exhausted.
    #[must_use]
    pub fn current(&self) -> K::Item {
        match self.try_current() {
            Some(item) => item,
            None => panic!("current() called on an exhausted cursor"),
        }
    }

    #[must_use]
    pub fn try_current(&self) -> Option<K::Item> {
        self.raw
            .as_ref()
            .filter(|raw| K::valid(raw))
            .and_then(K::get)
    }

    /// Step to the next element; a no-op on an exhausted cursor.
    pub fn advance(&mut self) {
        if let Some(raw) = self.raw.as_mut()
            && K::valid(raw)
        {
            K::move_to_next(raw);
        }
    }
}

impl<'db, K: CursorKind<'db>> Default for TypedCursor<'db, K> {
    fn default() -> Self {
        Self::end()
    }
}

impl<'db, K: CursorKind<'db>> Iterator for TypedCursor<'db, K> {
    type Item = K::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.try_current()?;
        self.advance();
        Some(item)
    }
}

impl<'db, K: CursorKind<'db>> PartialEq for TypedCursor<'db, K> {
    fn eq(&self, other: &Self) -> bool {
        match (self.try_current(), other.try_current()) {
            (None, None) => true,
            (Some(a), Some(b)) => K::identity(&a) == K::identity(&b),
            _ => false,
        }
    }
}

impl<'db, K: CursorKind<'db>> fmt::Debug for TypedCursor<'db, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedCursor")
            .field("kind", &std::any::type_name::<K>())
            .field("valid", &self.valid())
            .finish()
    }
}
