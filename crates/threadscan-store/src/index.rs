//! The indexed mail store and its connections.
//!
//! [`MailIndex`] owns the data and accepts writes. Readers go through a
//! [`Database`] connection, which pins the snapshot current at open time:
//! writes made afterwards are invisible to it, and handles borrowed from it
//! stay valid for as long as the connection lives.

use std::cell::Cell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::entry::MessageEntry;
use crate::error::{StoreError, StoreResult};
use crate::handles::{Message, Tags, Thread};

const INDEX_FILE_VERSION: u32 = 1;

// ── Indexed data ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub(crate) struct IndexData {
    pub(crate) messages: Vec<MessageEntry>,
    pub(crate) message_by_id: HashMap<String, usize>,
    /// Threads in order of their first inserted message.
    pub(crate) threads: Vec<ThreadData>,
    pub(crate) thread_by_id: HashMap<String, usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct ThreadData {
    pub(crate) id: String,
    /// Message indexes ordered by (date, insertion).
    pub(crate) messages: Vec<usize>,
    /// Messages with no parent inside the thread, date order.
    pub(crate) toplevel: Vec<usize>,
    /// Direct replies per message, date order.
    pub(crate) replies: HashMap<usize, Vec<usize>>,
}

impl ThreadData {
    fn new(id: String) -> Self {
        Self {
            id,
            messages: Vec::new(),
            toplevel: Vec::new(),
            replies: HashMap::new(),
        }
    }

    pub(crate) fn oldest_date(&self, data: &IndexData) -> i64 {
        self.messages.first().map_or(0, |&i| data.messages[i].date)
    }

    pub(crate) fn newest_date(&self, data: &IndexData) -> i64 {
        self.messages.last().map_or(0, |&i| data.messages[i].date)
    }

    pub(crate) fn subject<'a>(&self, data: &'a IndexData) -> &'a str {
        self.messages
            .first()
            .map_or("", |&i| data.messages[i].subject.as_str())
    }

    pub(crate) fn tags<'a>(&self, data: &'a IndexData) -> BTreeSet<&'a str> {
        self.messages
            .iter()
            .flat_map(|&i| data.messages[i].tags.iter().map(String::as_str))
            .collect()
    }
}

impl IndexData {
    fn from_entries(entries: Vec<MessageEntry>) -> StoreResult<Self> {
        let mut data = Self::default();
        for entry in entries {
            data.check_insertable(&entry)?;
            data.push_entry(entry);
        }
        for t in 0..data.threads.len() {
            data.reindex_thread(t);
        }
        Ok(data)
    }

    fn check_insertable(&self, entry: &MessageEntry) -> StoreResult<()> {
        entry.validate()?;
        if self.message_by_id.contains_key(&entry.id) {
            return Err(StoreError::DuplicateMessage(entry.id.clone()));
        }
        Ok(())
    }

    /// Append without rebuilding thread structure; returns the thread index.
    fn push_entry(&mut self, entry: MessageEntry) -> usize {
        let index = self.messages.len();
        let t = if let Some(&t) = self.thread_by_id.get(&entry.thread_id) {
            t
        } else {
            let t = self.threads.len();
            self.threads.push(ThreadData::new(entry.thread_id.clone()));
            self.thread_by_id.insert(entry.thread_id.clone(), t);
            t
        };
        self.threads[t].messages.push(index);
        self.message_by_id.insert(entry.id.clone(), index);
        self.messages.push(entry);
        t
    }

    fn insert(&mut self, entry: MessageEntry) -> StoreResult<()> {
        self.check_insertable(&entry)?;
        let t = self.push_entry(entry);
        self.reindex_thread(t);
        Ok(())
    }

    fn remove_thread(&mut self, thread_id: &str) -> StoreResult<usize> {
        let Some(&t) = self.thread_by_id.get(thread_id) else {
            return Err(StoreError::ThreadNotFound(thread_id.to_string()));
        };
        let removed = self.threads[t].messages.len();
        let remaining: Vec<MessageEntry> = self
            .messages
            .iter()
            .filter(|m| m.thread_id != thread_id)
            .cloned()
            .collect();
        *self = Self::from_entries(remaining)?;
        Ok(removed)
    }

    fn set_tags(&mut self, message_id: &str, tags: BTreeSet<String>) -> StoreResult<()> {
        let Some(&index) = self.message_by_id.get(message_id) else {
            return Err(StoreError::MessageNotFound(message_id.to_string()));
        };
        let mut updated = self.messages[index].clone();
        updated.tags = tags;
        updated.validate()?;
        self.messages[index] = updated;
        Ok(())
    }

    /// Recompute date order, parent links and the top-level set for one
    /// thread. Reply cycles are cut so every message is reachable from a
    /// top-level message exactly once.
    fn reindex_thread(&mut self, t: usize) {
        let messages = &self.messages;
        let by_id = &self.message_by_id;
        let thread = &mut self.threads[t];

        thread.messages.sort_by_key(|&i| (messages[i].date, i));

        let mut parent_of: HashMap<usize, usize> = HashMap::new();
        for &i in &thread.messages {
            if let Some(parent_id) = messages[i].in_reply_to.as_deref()
                && parent_id != messages[i].id
                && let Some(&p) = by_id.get(parent_id)
                && messages[p].thread_id == thread.id
            {
                parent_of.insert(i, p);
            }
        }

        for &i in &thread.messages {
            let mut seen = HashSet::from([i]);
            let mut cur = i;
            while let Some(&p) = parent_of.get(&cur) {
                if !seen.insert(p) {
                    tracing::debug!(
                        thread = %thread.id,
                        message = %messages[cur].id,
                        "cutting reply cycle"
                    );
                    parent_of.remove(&cur);
                    break;
                }
                cur = p;
            }
        }

        thread.toplevel.clear();
        thread.replies.clear();
        for &i in &thread.messages {
            match parent_of.get(&i) {
                Some(&p) => thread.replies.entry(p).or_default().push(i),
                None => thread.toplevel.push(i),
            }
        }
    }

    pub(crate) fn thread_index_of(&self, message: usize) -> usize {
        self.thread_by_id
            .get(&self.messages[message].thread_id)
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    #[serde(default)]
    version: u32,
    messages: Vec<MessageEntry>,
}

// ── MailIndex ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct Shared {
    data: RwLock<Arc<IndexData>>,
    exclusive: AtomicBool,
}

/// Shared, cheaply clonable handle over the indexed mail data.
#[derive(Clone, Default)]
pub struct MailIndex {
    shared: Arc<Shared>,
}

impl fmt::Debug for MailIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailIndex")
            .field("threads", &self.thread_count())
            .field("messages", &self.message_count())
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl MailIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages<I>(messages: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = MessageEntry>,
    {
        let data = IndexData::from_entries(messages.into_iter().collect())?;
        Ok(Self {
            shared: Arc::new(Shared {
                data: RwLock::new(Arc::new(data)),
                exclusive: AtomicBool::new(false),
            }),
        })
    }

    pub fn load_json(path: &Path) -> StoreResult<Self> {
        let raw = fs::read_to_string(path)?;
        let file: IndexFile = serde_json::from_str(&raw)?;
        if file.version > INDEX_FILE_VERSION {
            tracing::warn!(
                path = %path.display(),
                version = file.version,
                "index file is newer than this build understands"
            );
        }
        let index = Self::from_messages(file.messages)?;
        tracing::debug!(
            path = %path.display(),
            threads = index.thread_count(),
            messages = index.message_count(),
            "loaded mail index"
        );
        Ok(index)
    }

    /// Write the index as JSON. The file is replaced atomically.
    pub fn save_json(&self, path: &Path) -> StoreResult<()> {
        let snapshot = self.snapshot();
        let file = IndexFile {
            version: INDEX_FILE_VERSION,
            messages: snapshot.messages.clone(),
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&file)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn add_message(&self, entry: MessageEntry) -> StoreResult<()> {
        self.update(|data| data.insert(entry))
    }

    /// Remove every message of a thread; returns how many were removed.
    pub fn remove_thread(&self, thread_id: &str) -> StoreResult<usize> {
        self.update(|data| data.remove_thread(thread_id))
    }

    pub fn set_tags<I, S>(&self, message_id: &str, tags: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = tags.into_iter().map(Into::into).collect();
        self.update(|data| data.set_tags(message_id, tags))
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.snapshot().threads.len()
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        self.snapshot().messages.len()
    }

    /// Take the store exclusively. Until the guard drops, [`MailIndex::open`]
    /// fails with [`StoreError::Locked`].
    pub fn lock_exclusive(&self) -> StoreResult<ExclusiveLock> {
        self.shared
            .exclusive
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| StoreError::Locked("exclusive lock already held".into()))?;
        tracing::debug!("store locked exclusively");
        Ok(ExclusiveLock {
            shared: Arc::clone(&self.shared),
        })
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.shared.exclusive.load(Ordering::Acquire)
    }

    /// Open a read-only connection on the current snapshot.
    pub fn open(&self) -> StoreResult<Database> {
        if self.is_locked() {
            return Err(StoreError::Locked(
                "store is held exclusively, cannot open a connection".into(),
            ));
        }
        Ok(Database {
            data: self.snapshot(),
            _not_sync: PhantomData,
        })
    }

    fn snapshot(&self) -> Arc<IndexData> {
        Arc::clone(
            &self
                .shared
                .data
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Copy-on-write update: open connections keep the old snapshot. Every
    /// mutation validates before touching the data, so a failed update leaves
    /// it unchanged.
    fn update<T>(&self, f: impl FnOnce(&mut IndexData) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self
            .shared
            .data
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(Arc::make_mut(&mut guard))
    }
}

/// Exclusive hold on a [`MailIndex`]; released on drop.
#[derive(Debug)]
#[must_use = "the store is unlocked as soon as the guard is dropped"]
pub struct ExclusiveLock {
    shared: Arc<Shared>,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("exclusive", &self.exclusive.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Drop for ExclusiveLock {
    fn drop(&mut self) {
        self.shared.exclusive.store(false, Ordering::Release);
        tracing::debug!("store exclusive lock released");
    }
}

// ── Database ────────────────────────────────────────────────────────────────

/// A read-only connection bound to one snapshot of the index.
///
/// A connection may move to another thread but cannot be shared between
/// threads (`Send`, not `Sync`). Each thread that reads the store opens its
/// own.
pub struct Database {
    data: Arc<IndexData>,
    _not_sync: PhantomData<Cell<()>>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("threads", &self.data.threads.len())
            .field("messages", &self.data.messages.len())
            .finish()
    }
}

impl Database {
    pub(crate) fn data(&self) -> &IndexData {
        &self.data
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.data.threads.len()
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        self.data.messages.len()
    }

    /// Look up a thread by id. Every message counts as matched.
    pub fn find_thread(&self, thread_id: &str) -> StoreResult<Thread<'_>> {
        let t = self
            .data
            .thread_by_id
            .get(thread_id)
            .copied()
            .ok_or_else(|| StoreError::ThreadNotFound(thread_id.to_string()))?;
        let matched = self.data.threads[t].messages.clone();
        Ok(Thread::new(&self.data, t, matched.into()))
    }

    pub fn find_message(&self, message_id: &str) -> StoreResult<Message<'_>> {
        self.data
            .message_by_id
            .get(message_id)
            .map(|&i| Message::new(&self.data, i))
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))
    }

    /// Every tag used by any message, sorted.
    #[must_use]
    pub fn all_tags(&self) -> Tags<'_> {
        let tags: BTreeSet<&str> = self
            .data
            .messages
            .iter()
            .flat_map(|m| m.tags.iter().map(String::as_str))
            .collect();
        Tags::new(tags.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, thread: &str, date: i64) -> MessageEntry {
        MessageEntry::new(id, thread, "Ada", date).with_subject(format!("subject {id}"))
    }

    #[test]
    fn derives_thread_structure() {
        let index = MailIndex::from_messages([
            msg("b", "t1", 20).with_reply_to("a"),
            msg("a", "t1", 10),
            msg("c", "t1", 15).with_reply_to("a"),
            msg("d", "t1", 30).with_reply_to("missing"),
        ])
        .unwrap();
        let db = index.open().unwrap();
        let data = db.data();
        let t = &data.threads[0];
        let ids = |v: &[usize]| v.iter().map(|&i| data.messages[i].id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&t.messages), ["a", "c", "b", "d"]);
        assert_eq!(ids(&t.toplevel), ["a", "d"]);
        let a = data.message_by_id["a"];
        assert_eq!(ids(&t.replies[&a]), ["c", "b"]);
        assert_eq!(t.oldest_date(data), 10);
        assert_eq!(t.newest_date(data), 30);
        assert_eq!(t.subject(data), "subject a");
    }

    #[test]
    fn reply_cycles_are_cut() {
        let index = MailIndex::from_messages([
            msg("a", "t1", 10).with_reply_to("b"),
            msg("b", "t1", 20).with_reply_to("a"),
            msg("c", "t1", 30).with_reply_to("c"),
        ])
        .unwrap();
        let db = index.open().unwrap();
        let t = &db.data().threads[0];
        let reachable = t.toplevel.len() + t.replies.values().map(Vec::len).sum::<usize>();
        assert_eq!(reachable, 3);
        assert!(!t.toplevel.is_empty());
    }

    #[test]
    fn cross_thread_parent_is_ignored() {
        let index = MailIndex::from_messages([
            msg("a", "t1", 10),
            msg("b", "t2", 20).with_reply_to("a"),
        ])
        .unwrap();
        let db = index.open().unwrap();
        assert_eq!(db.data().threads[1].toplevel.len(), 1);
    }

    #[test]
    fn rejects_duplicates_without_changing_data() {
        let index = MailIndex::from_messages([msg("a", "t1", 10)]).unwrap();
        let err = index.add_message(msg("a", "t2", 11)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateMessage(_)));
        assert_eq!(index.message_count(), 1);
        assert_eq!(index.thread_count(), 1);
    }

    #[test]
    fn connections_keep_their_snapshot() {
        let index = MailIndex::from_messages([msg("a", "t1", 10)]).unwrap();
        let before = index.open().unwrap();
        index.add_message(msg("b", "t2", 20)).unwrap();
        assert_eq!(before.thread_count(), 1);
        assert_eq!(index.open().unwrap().thread_count(), 2);
    }

    #[test]
    fn remove_thread_and_set_tags() {
        let index = MailIndex::from_messages([
            msg("a", "t1", 10),
            msg("b", "t1", 11).with_reply_to("a"),
            msg("c", "t2", 12),
        ])
        .unwrap();
        assert_eq!(index.remove_thread("t1").unwrap(), 2);
        assert!(matches!(
            index.remove_thread("t1"),
            Err(StoreError::ThreadNotFound(_))
        ));
        index.set_tags("c", ["inbox", "unread"]).unwrap();
        let db = index.open().unwrap();
        assert!(db.find_message("c").unwrap().has_tag("unread"));
        assert!(matches!(
            index.set_tags("zz", ["inbox"]),
            Err(StoreError::MessageNotFound(_))
        ));
    }

    #[test]
    fn exclusive_lock_blocks_open_until_dropped() {
        let index = MailIndex::new();
        let lock = index.lock_exclusive().unwrap();
        assert!(matches!(index.open(), Err(StoreError::Locked(_))));
        assert!(matches!(index.lock_exclusive(), Err(StoreError::Locked(_))));
        drop(lock);
        assert!(index.open().is_ok());
    }

    #[test]
    fn find_errors_name_the_missing_id() {
        let index = MailIndex::from_messages([msg("a", "t1", 10)]).unwrap();
        let db = index.open().unwrap();
        assert!(matches!(db.find_thread("nope"), Err(StoreError::ThreadNotFound(id)) if id == "nope"));
        assert!(matches!(db.find_message("nope"), Err(StoreError::MessageNotFound(_))));
    }

    #[test]
    fn json_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("index.json");
        let index = MailIndex::from_messages([
            msg("a", "t1", 10).with_tags(["inbox"]),
            msg("b", "t1", 20).with_reply_to("a").with_body("hi"),
        ])
        .unwrap();
        index.save_json(&path).unwrap();
        let loaded = MailIndex::load_json(&path).unwrap();
        assert_eq!(loaded.message_count(), 2);
        let db = loaded.open().unwrap();
        assert_eq!(db.find_message("b").unwrap().body(), "hi");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = MailIndex::load_json(&tmp.path().join("absent.json")).unwrap_err();
        assert_eq!(err.error_type(), "IO_ERROR");
    }

    #[test]
    fn database_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Database>();
    }
}
