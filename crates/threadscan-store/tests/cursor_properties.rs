//! Cursor behavior over real store sequences.

use proptest::prelude::*;
use threadscan_core::SortMode;
use threadscan_store::{
    MailIndex, MessageCursor, MessageEntry, Query, TagCursor, ThreadCursor, TreeCursor,
};
use threadscan_test_helpers::{numbered_index, reply_tree_index, thread_id};

fn unsorted_threads(index: &MailIndex) -> Vec<String> {
    let db = index.open().unwrap();
    let mut query = Query::new(&db, "*").unwrap();
    query.set_sort(SortMode::Unsorted);

    let mut cursor = ThreadCursor::new(query.search_threads());
    let mut ids = Vec::new();
    while cursor.valid() {
        ids.push(cursor.current().id().to_string());
        cursor.advance();
    }
    assert!(!cursor.valid());
    assert!(cursor == ThreadCursor::end());
    ids
}

proptest! {
    #[test]
    fn cursor_yields_every_element_in_store_order(n in 0usize..60) {
        let index = numbered_index(n);
        let ids = unsorted_threads(&index);
        let expected: Vec<String> = (0..n).map(thread_id).collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn newest_first_is_reverse_insertion_for_numbered_index(n in 1usize..40) {
        let index = numbered_index(n);
        let db = index.open().unwrap();
        let query = Query::new(&db, "tag:inbox").unwrap();
        let ids: Vec<&str> = ThreadCursor::new(query.search_threads()).map(|t| t.id()).collect();
        prop_assert_eq!(ids.len(), n);
        prop_assert_eq!(ids[0], thread_id(n - 1));
        prop_assert_eq!(ids[n - 1], thread_id(0));
    }

    /// Any reply forest is walked in pre-order, each message exactly once.
    #[test]
    fn tree_cursor_is_preorder(shape in prop::collection::vec((any::<bool>(), any::<usize>()), 1..48)) {
        let parents: Vec<Option<usize>> = shape
            .iter()
            .enumerate()
            .map(|(i, &(is_root, pick))| (i > 0 && !is_root).then(|| pick % i))
            .collect();

        let entries = parents.iter().enumerate().map(|(i, parent)| {
            let entry = MessageEntry::new(format!("m{i}"), "t", "Ada", i64::try_from(i).unwrap());
            match parent {
                Some(p) => entry.with_reply_to(format!("m{p}")),
                None => entry,
            }
        });
        let index = MailIndex::from_messages(entries).unwrap();
        let db = index.open().unwrap();
        let walk: Vec<(String, usize)> = db
            .find_thread("t")
            .unwrap()
            .messages_tree()
            .map(|(m, depth)| (m.id().to_string(), depth))
            .collect();

        let mut expected = Vec::new();
        fn visit(node: usize, depth: usize, parents: &[Option<usize>], out: &mut Vec<(String, usize)>) {
            out.push((format!("m{node}"), depth));
            for (child, parent) in parents.iter().enumerate() {
                if *parent == Some(node) {
                    visit(child, depth + 1, parents, out);
                }
            }
        }
        for (i, parent) in parents.iter().enumerate() {
            if parent.is_none() {
                visit(i, 0, &parents, &mut expected);
            }
        }
        prop_assert_eq!(walk.len(), parents.len());
        prop_assert_eq!(walk, expected);
    }
}

#[test]
fn reply_tree_walks_root_a_a1_b() {
    let index = reply_tree_index();
    let db = index.open().unwrap();
    let ids: Vec<&str> = db
        .find_thread("t-tree")
        .unwrap()
        .messages_tree()
        .map(|(m, _)| m.id())
        .collect();
    assert_eq!(ids, ["root", "A", "A1", "B"]);
}

#[test]
fn exhausted_cursors_compare_equal_and_live_ones_do_not() {
    let index = reply_tree_index();
    let db = index.open().unwrap();
    let query = Query::new(&db, "*").unwrap();

    let mut exhausted = MessageCursor::new(query.search_messages());
    while exhausted.valid() {
        exhausted.advance();
    }
    let empty = Query::new(&db, "tag:none").unwrap();
    let also_exhausted = MessageCursor::new(empty.search_messages());
    let live = MessageCursor::new(query.search_messages());

    assert!(exhausted == also_exhausted);
    assert!(exhausted == MessageCursor::end());
    assert!(exhausted != live);
    assert!(live != exhausted);

    let thread = db.find_thread("t-tree").unwrap();
    let mut tree = thread.messages_tree();
    while tree.valid() {
        tree.advance();
    }
    assert_eq!(tree, TreeCursor::end());
    assert_ne!(tree, thread.messages_tree());
    assert_ne!(thread.messages_tree(), TreeCursor::end());

    let mut tags = TagCursor::new(db.all_tags());
    while tags.valid() {
        tags.advance();
    }
    assert!(tags == TagCursor::end());
    assert!(TagCursor::new(db.all_tags()) != tags);
}

#[test]
fn cursor_keeps_its_snapshot_across_writes() {
    let index = numbered_index(3);
    let db = index.open().unwrap();
    let query = Query::new(&db, "*").unwrap();
    let mut cursor = ThreadCursor::new(query.search_threads());
    index.remove_thread(&thread_id(1)).unwrap();
    let mut seen = 0;
    while cursor.valid() {
        seen += 1;
        cursor.advance();
    }
    assert_eq!(seen, 3);
}
