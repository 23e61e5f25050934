//! Store handles and raw result sequences.
//!
//! Handles borrow from their [`Database`](crate::Database) connection and
//! cannot outlive it. The raw sequences follow the store's C-style protocol:
//! `valid` tells whether a current element exists, `get` returns it and
//! `move_to_next` steps forward. Typed access goes through
//! [`TypedCursor`](crate::TypedCursor).

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::entry::MessageEntry;
use crate::index::{IndexData, ThreadData};

// ── Thread ──────────────────────────────────────────────────────────────────

/// One thread as seen by a query: its matched messages are the ones the
/// query selected.
#[derive(Clone)]
pub struct Thread<'db> {
    data: &'db IndexData,
    index: usize,
    matched: Rc<[usize]>,
}

impl fmt::Debug for Thread<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id())
            .field("matched", &self.matched_messages())
            .field("total", &self.total_messages())
            .finish()
    }
}

impl<'db> Thread<'db> {
    pub(crate) const fn new(data: &'db IndexData, index: usize, matched: Rc<[usize]>) -> Self {
        Self {
            data,
            index,
            matched,
        }
    }

    fn thread(&self) -> &'db ThreadData {
        &self.data.threads[self.index]
    }

    #[must_use]
    pub fn id(&self) -> &'db str {
        &self.thread().id
    }

    /// Subject of the oldest message.
    #[must_use]
    pub fn subject(&self) -> &'db str {
        self.thread().subject(self.data)
    }

    #[must_use]
    pub fn newest_date(&self) -> i64 {
        self.thread().newest_date(self.data)
    }

    #[must_use]
    pub fn oldest_date(&self) -> i64 {
        self.thread().oldest_date(self.data)
    }

    #[must_use]
    pub fn total_messages(&self) -> usize {
        self.thread().messages.len()
    }

    #[must_use]
    pub fn matched_messages(&self) -> usize {
        self.matched.len()
    }

    /// Matched authors in date order, then `|` and the remaining authors.
    #[must_use]
    pub fn authors(&self) -> String {
        let mut seen = HashSet::new();
        let mut matched = Vec::new();
        let mut others = Vec::new();
        for &i in &self.thread().messages {
            if self.matched.contains(&i) {
                let from = self.data.messages[i].from.as_str();
                if seen.insert(from) {
                    matched.push(from);
                }
            }
        }
        for &i in &self.thread().messages {
            let from = self.data.messages[i].from.as_str();
            if seen.insert(from) {
                others.push(from);
            }
        }
        let mut out = matched.join(", ");
        if !others.is_empty() {
            out.push_str("| ");
            out.push_str(&others.join(", "));
        }
        out
    }

    /// Union of every message's tags, sorted.
    #[must_use]
    pub fn tags(&self) -> Tags<'db> {
        Tags::new(self.thread().tags(self.data).into_iter().collect())
    }

    /// Messages without a parent inside the thread.
    #[must_use]
    pub fn toplevel_messages(&self) -> Messages<'db> {
        Messages::new(self.data, self.thread().toplevel.clone())
    }

    /// Every message, oldest first.
    #[must_use]
    pub fn messages(&self) -> Messages<'db> {
        Messages::new(self.data, self.thread().messages.clone())
    }
}

// ── Message ─────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
pub struct Message<'db> {
    data: &'db IndexData,
    index: usize,
}

impl fmt::Debug for Message<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id())
            .field("thread", &self.thread_id())
            .finish()
    }
}

impl<'db> Message<'db> {
    pub(crate) const fn new(data: &'db IndexData, index: usize) -> Self {
        Self { data, index }
    }

    fn entry(&self) -> &'db MessageEntry {
        &self.data.messages[self.index]
    }

    #[must_use]
    pub fn id(&self) -> &'db str {
        &self.entry().id
    }

    #[must_use]
    pub fn thread_id(&self) -> &'db str {
        &self.entry().thread_id
    }

    #[must_use]
    pub fn in_reply_to(&self) -> Option<&'db str> {
        self.entry().in_reply_to.as_deref()
    }

    #[must_use]
    pub fn from(&self) -> &'db str {
        &self.entry().from
    }

    #[must_use]
    pub fn subject(&self) -> &'db str {
        &self.entry().subject
    }

    #[must_use]
    pub fn date(&self) -> i64 {
        self.entry().date
    }

    #[must_use]
    pub fn body(&self) -> &'db str {
        &self.entry().body
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.entry().tags.contains(tag)
    }

    #[must_use]
    pub fn tags(&self) -> Tags<'db> {
        Tags::new(self.entry().tags.iter().map(String::as_str).collect())
    }

    /// Direct replies, oldest first.
    #[must_use]
    pub fn replies(&self) -> Messages<'db> {
        let thread = &self.data.threads[self.data.thread_index_of(self.index)];
        let replies = thread.replies.get(&self.index).cloned().unwrap_or_default();
        Messages::new(self.data, replies)
    }
}

// ── Raw sequences ───────────────────────────────────────────────────────────

pub(crate) struct ThreadHit {
    pub(crate) thread: usize,
    pub(crate) matched: Rc<[usize]>,
}

/// Raw thread sequence produced by a query.
pub struct Threads<'db> {
    data: &'db IndexData,
    hits: Vec<ThreadHit>,
    pos: usize,
}

impl<'db> Threads<'db> {
    pub(crate) const fn new(data: &'db IndexData, hits: Vec<ThreadHit>) -> Self {
        Self { data, hits, pos: 0 }
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.pos < self.hits.len()
    }

    #[must_use]
    pub fn get(&self) -> Option<Thread<'db>> {
        self.hits
            .get(self.pos)
            .map(|hit| Thread::new(self.data, hit.thread, Rc::clone(&hit.matched)))
    }

    pub fn move_to_next(&mut self) {
        if self.valid() {
            self.pos += 1;
        }
    }
}

impl fmt::Debug for Threads<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Threads")
            .field("len", &self.hits.len())
            .field("pos", &self.pos)
            .finish()
    }
}

/// Raw message sequence: query results, a thread's messages or a reply list.
pub struct Messages<'db> {
    data: &'db IndexData,
    items: Vec<usize>,
    pos: usize,
}

impl<'db> Messages<'db> {
    pub(crate) const fn new(data: &'db IndexData, items: Vec<usize>) -> Self {
        Self {
            data,
            items,
            pos: 0,
        }
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.pos < self.items.len()
    }

    #[must_use]
    pub fn get(&self) -> Option<Message<'db>> {
        self.items
            .get(self.pos)
            .map(|&i| Message::new(self.data, i))
    }

    pub fn move_to_next(&mut self) {
        if self.valid() {
            self.pos += 1;
        }
    }
}

impl fmt::Debug for Messages<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messages")
            .field("len", &self.items.len())
            .field("pos", &self.pos)
            .finish()
    }
}

/// Raw tag sequence, sorted.
#[derive(Debug)]
pub struct Tags<'db> {
    items: Vec<&'db str>,
    pos: usize,
}

impl<'db> Tags<'db> {
    pub(crate) const fn new(items: Vec<&'db str>) -> Self {
        Self { items, pos: 0 }
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.pos < self.items.len()
    }

    #[must_use]
    pub fn get(&self) -> Option<&'db str> {
        self.items.get(self.pos).copied()
    }

    pub fn move_to_next(&mut self) {
        if self.valid() {
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::entry::MessageEntry;
    use crate::index::MailIndex;

    #[test]
    fn raw_protocol_steps_to_the_end_and_stays_there() {
        let index = MailIndex::from_messages([
            MessageEntry::new("a", "t1", "Ada", 1).with_tags(["x", "y"]),
        ])
        .unwrap();
        let db = index.open().unwrap();
        let mut tags = db.all_tags();
        assert_eq!(tags.get(), Some("x"));
        tags.move_to_next();
        assert_eq!(tags.get(), Some("y"));
        tags.move_to_next();
        assert!(!tags.valid());
        assert_eq!(tags.get(), None);
        tags.move_to_next();
        assert!(!tags.valid());
    }

    #[test]
    fn thread_handle_reports_structure() {
        let index = MailIndex::from_messages([
            MessageEntry::new("a", "t1", "Ada", 10)
                .with_subject("first")
                .with_tags(["inbox"]),
            MessageEntry::new("b", "t1", "Grace", 20)
                .with_reply_to("a")
                .with_tags(["unread"]),
            MessageEntry::new("c", "t1", "Ada", 30).with_reply_to("b"),
        ])
        .unwrap();
        let db = index.open().unwrap();
        let thread = db.find_thread("t1").unwrap();
        assert_eq!(thread.subject(), "first");
        assert_eq!(thread.total_messages(), 3);
        assert_eq!(thread.matched_messages(), 3);
        assert_eq!(thread.authors(), "Ada, Grace");
        assert_eq!((thread.oldest_date(), thread.newest_date()), (10, 30));

        let mut tags = thread.tags();
        let mut collected = Vec::new();
        while let Some(tag) = tags.get() {
            collected.push(tag);
            tags.move_to_next();
        }
        assert_eq!(collected, ["inbox", "unread"]);

        let top = thread.toplevel_messages();
        let a = top.get().unwrap();
        assert_eq!(a.id(), "a");
        let replies = a.replies();
        assert_eq!(replies.get().unwrap().id(), "b");
        assert_eq!(replies.get().unwrap().in_reply_to(), Some("a"));
    }
}
