//! Depth-first walk over a thread's reply forest.

use std::collections::VecDeque;
use std::fmt;

use crate::cursor::MessageCursor;
use crate::handles::{Message, Thread};

/// Pre-order cursor over a message forest.
///
/// Starting from the top-level messages, each message is followed by its
/// replies (in date order, recursively) before its next sibling. Advancing
/// pops the front of a work queue and splices the popped message's replies
/// in at the front, so the walk never recurses.
///
/// Equality is weak: two cursors are equal when both are exhausted, or when
/// their current messages have the same id. Cursors over the same forest
/// compare by position; cursors over unrelated forests can compare equal.
pub struct TreeCursor<'db> {
    queue: VecDeque<(Message<'db>, usize)>,
}

impl<'db> TreeCursor<'db> {
    #[must_use]
    pub fn new(toplevel: MessageCursor<'db>) -> Self {
        Self {
            queue: toplevel.map(|message| (message, 0)).collect(),
        }
    }

    #[must_use]
    pub const fn end() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        !self.queue.is_empty()
    }

    /// # Panics
    /// Panics if the cursor is exhausted.
    #[must_use]
    pub fn current(&self) -> Message<'db> {
        match self.try_current() {
            Some(message) => message,
            None => panic!("current() called on an exhausted tree cursor"),
        }
    }

    #[must_use]
    pub fn try_current(&self) -> Option<Message<'db>> {
        self.queue.front().map(|&(message, _)| message)
    }

    /// Nesting level of the current message; top-level messages are 0.
    #[must_use]
    pub fn depth(&self) -> Option<usize> {
        self.queue.front().map(|&(_, depth)| depth)
    }

    pub fn advance(&mut self) {
        let Some((message, depth)) = self.queue.pop_front() else {
            return;
        };
        let replies: Vec<Message<'db>> = MessageCursor::new(message.replies()).collect();
        for reply in replies.into_iter().rev() {
            self.queue.push_front((reply, depth + 1));
        }
    }
}

impl Default for TreeCursor<'_> {
    fn default() -> Self {
        Self::end()
    }
}

impl<'db> Iterator for TreeCursor<'db> {
    type Item = (Message<'db>, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let front = self.queue.front().copied()?;
        self.advance();
        Some(front)
    }
}

impl PartialEq for TreeCursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self.try_current(), other.try_current()) {
            (None, None) => true,
            (Some(a), Some(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl fmt::Debug for TreeCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeCursor")
            .field("current", &self.try_current().map(|m| m.id()))
            .field("depth", &self.depth())
            .field("pending", &self.queue.len())
            .finish()
    }
}

impl<'db> Thread<'db> {
    /// Pre-order walk over the whole thread.
    #[must_use]
    pub fn messages_tree(&self) -> TreeCursor<'db> {
        TreeCursor::new(MessageCursor::new(self.toplevel_messages()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::MessageEntry;
    use crate::index::MailIndex;

    fn reply_tree() -> MailIndex {
        // root ─┬─ A ── A1
        //       └─ B
        MailIndex::from_messages([
            MessageEntry::new("root", "t1", "Ada", 1),
            MessageEntry::new("A", "t1", "Grace", 2).with_reply_to("root"),
            MessageEntry::new("B", "t1", "Edsger", 3).with_reply_to("root"),
            MessageEntry::new("A1", "t1", "Ada", 4).with_reply_to("A"),
        ])
        .unwrap()
    }

    #[test]
    fn visits_replies_before_siblings() {
        let index = reply_tree();
        let db = index.open().unwrap();
        let walk: Vec<(&str, usize)> = db
            .find_thread("t1")
            .unwrap()
            .messages_tree()
            .map(|(m, depth)| (m.id(), depth))
            .collect();
        assert_eq!(walk, [("root", 0), ("A", 1), ("A1", 2), ("B", 1)]);
    }

    #[test]
    fn equality_by_front_identity() {
        let index = reply_tree();
        let db = index.open().unwrap();
        let thread = db.find_thread("t1").unwrap();
        let mut a = thread.messages_tree();
        let mut b = thread.messages_tree();
        assert_eq!(a, b);
        a.advance();
        assert_ne!(a, b);
        b.advance();
        assert_eq!(a, b);
        while a.valid() {
            a.advance();
        }
        assert_eq!(a, TreeCursor::end());
        a.advance();
        assert!(!a.valid());
        assert_eq!(a.depth(), None);
    }

    #[test]
    fn empty_forest_is_end() {
        let cursor = TreeCursor::new(MessageCursor::end());
        assert_eq!(cursor, TreeCursor::end());
        assert!(cursor.try_current().is_none());
    }

    #[test]
    #[should_panic(expected = "exhausted tree cursor")]
    fn current_on_end_panics() {
        let _ = TreeCursor::end().current();
    }
}
