//! # Domain Model: Threads and Comments
//!
//! A [`Thread`] is a conversation anchored to one target document. Its `body` is
//! the ordered list of [`Comment`]s; `body[0]` is the opening comment.
//!
//! ## Invariants
//!
//! - `total == body.len()` after every mutation. The field is kept because it is
//!   part of the wire format, but nothing outside [`Thread`] writes it.
//! - Ids have the form `anno/<n>` and are unique across the whole store, not
//!   just per target. They are never reused, even after deletions.
//!
//! ## Timestamps
//!
//! `Comment::created` is refreshed when a comment is edited, so it means "time of
//! the latest content change". The `edited` flag records that this happened;
//! it is never reset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::position::Indicator;

const ID_PREFIX: &str = "anno/";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id assigned for counter value `n`.
    pub fn from_sequence(n: u64) -> Self {
        Self(format!("{}{}", ID_PREFIX, n))
    }

    /// The counter value encoded in an `anno/<n>` id, if it has that form.
    pub fn sequence(&self) -> Option<u64> {
        self.0.strip_prefix(ID_PREFIX)?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Author of a comment. Identity is opaque to this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    #[serde(default)]
    pub image: String,
    /// User handle on the hosting service.
    #[serde(default)]
    pub user: String,
}

impl Person {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub value: String,
    pub created: DateTime<Utc>,
    pub creator: Person,
    #[serde(default)]
    pub edited: bool,
}

impl Comment {
    pub fn new(value: String, creator: Person, created: DateTime<Utc>) -> Self {
        Self {
            value,
            created,
            creator,
            edited: false,
        }
    }

    pub fn edit(&mut self, value: String, now: DateTime<Utc>) {
        self.value = value;
        self.edited = true;
        self.created = now;
    }
}

/// Serialized as the wire thread; decoding goes through `store::wire` so that
/// `total` is always derived from `body`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thread {
    pub id: ThreadId,
    /// The target is the key the thread is filed under, so it is not part of
    /// the serialized thread.
    #[serde(skip)]
    pub target: String,
    total: usize,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicator: Option<Indicator>,
    body: Vec<Comment>,
}

impl Thread {
    pub fn new(
        id: ThreadId,
        target: impl Into<String>,
        opening: Comment,
        indicator: Option<Indicator>,
    ) -> Self {
        Self {
            id,
            target: target.into(),
            total: 1,
            resolved: false,
            indicator,
            body: vec![opening],
        }
    }

    /// Rebuilds a thread from decoded parts, re-deriving `total` from `body`.
    pub(crate) fn from_parts(
        id: ThreadId,
        target: String,
        resolved: bool,
        indicator: Option<Indicator>,
        body: Vec<Comment>,
    ) -> Self {
        Self {
            id,
            target,
            total: body.len(),
            resolved,
            indicator,
            body,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn body(&self) -> &[Comment] {
        &self.body
    }

    pub fn opening(&self) -> Option<&Comment> {
        self.body.first()
    }

    /// Timestamp of the most recent content change in the thread.
    pub fn latest_activity(&self) -> Option<DateTime<Utc>> {
        self.body.iter().map(|c| c.created).max()
    }

    pub(crate) fn push(&mut self, comment: Comment) {
        self.body.push(comment);
        self.total = self.body.len();
    }

    pub(crate) fn comment_mut(&mut self, index: usize) -> Option<&mut Comment> {
        self.body.get_mut(index)
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<Comment> {
        if index >= self.body.len() {
            return None;
        }
        let removed = self.body.remove(index);
        self.total = self.body.len();
        Some(removed)
    }
}
