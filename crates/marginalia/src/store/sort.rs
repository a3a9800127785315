//! Orderings for [`CommentStore::get_threads_by_target`](super::CommentStore::get_threads_by_target).
//!
//! All sorts are stable, ascending, and produce a fresh list; the stored
//! per-target order (insertion order) is never touched.
//!
//! | Order | Key |
//! |-------|-----|
//! | `latest` | newest `created` among a thread's comments |
//! | `date` | `created` of the opening comment |
//! | `mostReplies` | `total`, fewest first |
//! | `idList` | position in a caller-supplied id list |
//!
//! `mostReplies` sorts ascending even though the name suggests the busiest
//! threads first. Callers wanting the busiest first reverse the result.

use std::collections::HashSet;

use crate::model::{Thread, ThreadId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    Latest,
    Date,
    MostReplies,
    IdList,
}

impl SortBy {
    /// Parses the wire name of an ordering. Unknown names fall back to `Latest`.
    pub fn parse(name: &str) -> SortBy {
        match name {
            "latest" => SortBy::Latest,
            "date" => SortBy::Date,
            "mostReplies" => SortBy::MostReplies,
            "idList" => SortBy::IdList,
            _ => SortBy::Latest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Latest => "latest",
            SortBy::Date => "date",
            SortBy::MostReplies => "mostReplies",
            SortBy::IdList => "idList",
        }
    }
}

impl From<&str> for SortBy {
    fn from(name: &str) -> Self {
        SortBy::parse(name)
    }
}

pub(crate) fn sort_threads(threads: &[Thread], sort_by: SortBy, id_list: &[ThreadId]) -> Vec<Thread> {
    match sort_by {
        SortBy::Latest => sorted_by_key(threads, Thread::latest_activity),
        SortBy::Date => sorted_by_key(threads, |t| t.opening().map(|c| c.created)),
        SortBy::MostReplies => sorted_by_key(threads, Thread::total),
        SortBy::IdList => by_id_list(threads, id_list),
    }
}

fn sorted_by_key<K: Ord>(threads: &[Thread], key: impl Fn(&Thread) -> K) -> Vec<Thread> {
    let mut sorted = threads.to_vec();
    // `sort_by_key` is stable, so ties keep insertion order.
    sorted.sort_by_key(|t| key(t));
    sorted
}

// Follows the order of `id_list`. Unknown ids are skipped, threads not named are
// left out, and a thread named twice appears once.
fn by_id_list(threads: &[Thread], id_list: &[ThreadId]) -> Vec<Thread> {
    let mut seen = HashSet::new();
    id_list
        .iter()
        .filter(|id| seen.insert(*id))
        .filter_map(|id| threads.iter().find(|t| &t.id == id).cloned())
        .collect()
}
