//! Text rows for a listing snapshot.
//!
//! Columns: relative date, `[matched/total]`, authors, subject, tags. The
//! selected row starts with `>`, threads with unread messages with `*`.

use chrono::{DateTime, Utc};
use threadscan_core::{ThreadRecord, relative_time};

use crate::listing::ListingSnapshot;

const DATE_WIDTH: usize = 13;
const COUNT_WIDTH: usize = 8;
const AUTHORS_WIDTH: usize = 20;

/// Format the snapshot's visible rows, each cut to `width` characters
/// (`0` means unlimited).
#[must_use]
pub fn format_rows(snapshot: &ListingSnapshot, width: usize, now: DateTime<Utc>) -> Vec<String> {
    snapshot
        .rows
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let selected = snapshot.is_selected(snapshot.first_row + i);
            let line = format_row(record, selected, now);
            if width == 0 {
                line
            } else {
                truncate(&line, width)
            }
        })
        .collect()
}

#[must_use]
pub fn format_row(record: &ThreadRecord, selected: bool, now: DateTime<Utc>) -> String {
    let marker = if selected { '>' } else { ' ' };
    let unread = if record.is_unread() { '*' } else { ' ' };
    let date = relative_time(record.newest_datetime(), now);
    let counts = format!(
        "[{}/{}]",
        record.matched_messages(),
        record.total_messages()
    );
    let mut line = format!(
        "{marker}{unread} {} {} {} {}",
        pad(&date, DATE_WIDTH),
        pad(&counts, COUNT_WIDTH),
        pad(record.authors(), AUTHORS_WIDTH),
        record.subject(),
    );
    if !record.tags().is_empty() {
        let tags: Vec<&str> = record.tags().iter().map(String::as_str).collect();
        line.push_str(" (");
        line.push_str(&tags.join(" "));
        line.push(')');
    }
    line
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

fn pad(text: &str, width: usize) -> String {
    let mut out = truncate(text, width);
    let len = out.chars().count();
    out.extend(std::iter::repeat_n(' ', width - len));
    out
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::listing::RunState;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn record(id: &str, unread: bool) -> ThreadRecord {
        let tags: &[&str] = if unread { &["inbox", "unread"] } else { &["inbox"] };
        ThreadRecord::new(id, now().timestamp() - 3_600, 1, 3)
            .unwrap()
            .with_authors("Ada Lovelace, Charles Babbage")
            .with_subject(format!("Subject {id}"))
            .with_tags(tags.iter().copied())
    }

    fn snapshot() -> ListingSnapshot {
        ListingSnapshot {
            rows: vec![record("t1", true), record("t2", false)],
            first_row: 4,
            total: 10,
            selected: Some(5),
            collecting: false,
            run: RunState::Completed,
        }
    }

    #[test]
    fn columns_and_markers() {
        let rows = format_rows(&snapshot(), 0, now());
        assert_eq!(
            rows[0],
            " * Today 11:00   [1/3]    Ada Lovelace, Charle Subject t1 (inbox unread)"
        );
        assert!(rows[1].starts_with(">  Today 11:00"));
        assert!(rows[1].ends_with("Subject t2 (inbox)"));
    }

    #[test]
    fn rows_are_cut_to_width() {
        let rows = format_rows(&snapshot(), 12, now());
        assert!(rows.iter().all(|r| r.chars().count() == 12));
    }

    #[test]
    fn pad_and_truncate_count_chars() {
        assert_eq!(pad("héllo", 7), "héllo  ");
        assert_eq!(pad("abcdefgh", 3), "abc");
        assert_eq!(truncate("ünïcode", 3), "ünï");
    }
}
