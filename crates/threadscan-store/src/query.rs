//! Search expressions and queries.
//!
//! An expression is a list of terms joined by AND. The word `or` splits it
//! into alternatives, `not term` or `-term` negates a single term, and `*`
//! (or an empty expression) matches everything.
//!
//! | Term | Matches |
//! |------|---------|
//! | `tag:inbox` | messages carrying the tag |
//! | `from:ada` | sender contains the text (case-insensitive) |
//! | `subject:"weekly sync"` | subject contains the text (case-insensitive) |
//! | `id:<message-id>` | exactly that message |
//! | `thread:<thread-id>` | every message of that thread |
//! | bare word | subject, sender or body contains the word |

use std::rc::Rc;

use threadscan_core::SortMode;

use crate::entry::MessageEntry;
use crate::error::{StoreError, StoreResult};
use crate::handles::{Messages, ThreadHit, Threads};
use crate::index::{Database, IndexData};

// ── Expression parsing ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    All,
    Tag(String),
    From(String),
    Subject(String),
    Id(String),
    Thread(String),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Clause {
    negated: bool,
    term: Term,
}

/// A parsed search expression in disjunctive normal form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryExpr {
    alternatives: Vec<Vec<Clause>>,
}

impl QueryExpr {
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let mut alternatives = Vec::new();
        let mut current: Vec<Clause> = Vec::new();
        let mut negate_next = false;
        let mut saw_term = false;

        for token in split_query_tokens(raw) {
            match token.to_ascii_lowercase().as_str() {
                "and" => {
                    if !saw_term || negate_next {
                        return Err(StoreError::InvalidQuery(format!(
                            "`and` needs a term on both sides in {raw:?}"
                        )));
                    }
                    continue;
                }
                "or" => {
                    if current.is_empty() || negate_next {
                        return Err(StoreError::InvalidQuery(format!(
                            "`or` needs a term on both sides in {raw:?}"
                        )));
                    }
                    alternatives.push(std::mem::take(&mut current));
                    saw_term = false;
                    continue;
                }
                "not" => {
                    negate_next = !negate_next;
                    continue;
                }
                _ => {}
            }

            let (negated, body) = match token.strip_prefix('-') {
                Some(rest) if !rest.is_empty() => (!negate_next, rest),
                _ => (negate_next, token.as_str()),
            };
            current.push(Clause {
                negated,
                term: parse_term(body)?,
            });
            negate_next = false;
            saw_term = true;
        }

        if negate_next {
            return Err(StoreError::InvalidQuery(format!(
                "`not` is missing its term in {raw:?}"
            )));
        }
        if current.is_empty() && !alternatives.is_empty() {
            return Err(StoreError::InvalidQuery(format!(
                "`or` needs a term on both sides in {raw:?}"
            )));
        }
        alternatives.push(current);
        Ok(Self { alternatives })
    }

    /// The expression matches every message.
    #[must_use]
    pub fn is_match_all(&self) -> bool {
        self.alternatives.iter().any(|alt| {
            alt.iter()
                .all(|clause| !clause.negated && clause.term == Term::All)
        })
    }

    pub(crate) fn matches(&self, message: &MessageEntry) -> bool {
        self.alternatives.iter().any(|alt| {
            alt.iter()
                .all(|clause| clause.term.matches(message) != clause.negated)
        })
    }
}

fn parse_term(token: &str) -> StoreResult<Term> {
    if token == "*" {
        return Ok(Term::All);
    }
    if token.starts_with('(') || token.ends_with(')') {
        return Err(StoreError::InvalidQuery(format!(
            "grouping with parentheses is not supported: {token:?}"
        )));
    }
    let Some((field, value)) = token.split_once(':') else {
        let text = unquote(token);
        if text.is_empty() {
            return Err(StoreError::InvalidQuery("empty search term".into()));
        }
        return Ok(Term::Text(text.to_lowercase()));
    };
    let value = unquote(value);
    if value.is_empty() {
        return Err(StoreError::InvalidQuery(format!(
            "field `{field}:` has no value"
        )));
    }
    match field.to_ascii_lowercase().as_str() {
        "tag" => Ok(Term::Tag(value.to_string())),
        "from" => Ok(Term::From(value.to_lowercase())),
        "subject" => Ok(Term::Subject(value.to_lowercase())),
        "id" => Ok(Term::Id(value.to_string())),
        "thread" => Ok(Term::Thread(value.to_string())),
        other => Err(StoreError::InvalidQuery(format!(
            "unknown search field `{other}:`"
        ))),
    }
}

impl Term {
    fn matches(&self, message: &MessageEntry) -> bool {
        match self {
            Self::All => true,
            Self::Tag(tag) => message.tags.contains(tag),
            Self::From(needle) => message.from.to_lowercase().contains(needle),
            Self::Subject(needle) => message.subject.to_lowercase().contains(needle),
            Self::Id(id) => message.id == *id,
            Self::Thread(id) => message.thread_id == *id,
            Self::Text(needle) => {
                message.subject.to_lowercase().contains(needle)
                    || message.from.to_lowercase().contains(needle)
                    || message.body.to_lowercase().contains(needle)
            }
        }
    }
}

fn unquote(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed.trim_matches('"')
    }
}

/// Split on whitespace, keeping double-quoted runs together.
fn split_query_tokens(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in raw.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
            current.push(ch);
            continue;
        }
        if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

// ── Query ───────────────────────────────────────────────────────────────────

/// A search over one connection.
#[derive(Debug)]
pub struct Query<'db> {
    db: &'db Database,
    expression: String,
    parsed: QueryExpr,
    sort: SortMode,
}

impl<'db> Query<'db> {
    pub fn new(db: &'db Database, expression: &str) -> StoreResult<Self> {
        let parsed = QueryExpr::parse(expression)?;
        Ok(Self {
            db,
            expression: expression.to_string(),
            parsed,
            sort: SortMode::default(),
        })
    }

    pub const fn set_sort(&mut self, sort: SortMode) {
        self.sort = sort;
    }

    #[must_use]
    pub const fn sort(&self) -> SortMode {
        self.sort
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Threads containing at least one matching message, in sort order.
    #[must_use]
    pub fn search_threads(&self) -> Threads<'db> {
        let data = self.db.data();
        let mut hits: Vec<ThreadHit> = data
            .threads
            .iter()
            .enumerate()
            .filter_map(|(t, thread)| {
                let matched: Vec<usize> = thread
                    .messages
                    .iter()
                    .copied()
                    .filter(|&i| self.parsed.matches(&data.messages[i]))
                    .collect();
                (!matched.is_empty()).then(|| ThreadHit {
                    thread: t,
                    matched: Rc::from(matched),
                })
            })
            .collect();
        sort_hits(data, &mut hits, self.sort);
        tracing::trace!(
            expression = %self.expression,
            sort = %self.sort,
            threads = hits.len(),
            "thread search"
        );
        Threads::new(data, hits)
    }

    /// Matching messages. Thread sort modes order by message date here, and
    /// `message-id` orders by message id.
    #[must_use]
    pub fn search_messages(&self) -> Messages<'db> {
        let data = self.db.data();
        let mut matched: Vec<usize> = (0..data.messages.len())
            .filter(|&i| self.parsed.matches(&data.messages[i]))
            .collect();
        match self.sort {
            SortMode::NewestFirst => matched.sort_by(|&a, &b| {
                data.messages[b]
                    .date
                    .cmp(&data.messages[a].date)
                    .then(a.cmp(&b))
            }),
            SortMode::OldestFirst => matched.sort_by_key(|&i| (data.messages[i].date, i)),
            SortMode::MessageId => {
                matched.sort_by(|&a, &b| data.messages[a].id.cmp(&data.messages[b].id));
            }
            SortMode::Unsorted => {}
        }
        Messages::new(data, matched)
    }

    #[must_use]
    pub fn count_threads(&self) -> usize {
        let data = self.db.data();
        data.threads
            .iter()
            .filter(|thread| {
                thread
                    .messages
                    .iter()
                    .any(|&i| self.parsed.matches(&data.messages[i]))
            })
            .count()
    }

    #[must_use]
    pub fn count_messages(&self) -> usize {
        self.db
            .data()
            .messages
            .iter()
            .filter(|m| self.parsed.matches(m))
            .count()
    }
}

fn hit_id<'a>(data: &'a IndexData, hit: &ThreadHit) -> &'a str {
    data.threads[hit.thread].id.as_str()
}

fn sort_hits(data: &IndexData, hits: &mut [ThreadHit], sort: SortMode) {
    let id = |hit: &ThreadHit| hit_id(data, hit);
    match sort {
        SortMode::NewestFirst => hits.sort_by(|a, b| {
            let (ta, tb) = (&data.threads[a.thread], &data.threads[b.thread]);
            tb.newest_date(data)
                .cmp(&ta.newest_date(data))
                .then_with(|| id(a).cmp(id(b)))
        }),
        SortMode::OldestFirst => hits.sort_by(|a, b| {
            let (ta, tb) = (&data.threads[a.thread], &data.threads[b.thread]);
            ta.oldest_date(data)
                .cmp(&tb.oldest_date(data))
                .then_with(|| id(a).cmp(id(b)))
        }),
        SortMode::MessageId => hits.sort_by(|a, b| id(a).cmp(id(b))),
        SortMode::Unsorted => {}
    }
}
