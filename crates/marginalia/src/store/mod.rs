//! # Thread Store
//!
//! [`CommentStore`] is the authoritative in-memory table of comment threads,
//! keyed by target document. It owns thread CRUD, the id counter, the sort
//! orders and the indicator projection used for live highlighting.
//!
//! ## Persistence
//!
//! The store is generic over a [`Gateway`]:
//! - Production: `CommentStore<FsGateway>` or any HTTP-backed gateway
//! - Testing: `CommentStore<MemGateway>`
//!
//! Mutations only touch memory. Persisting is explicit via
//! [`CommentStore::save_comments`], one target at a time. Loading replaces the
//! whole table in a single step ([`CommentStore::apply_loaded`]), so readers
//! see either the previous table or the new one. A load can be split into
//! [`fetch_comments`] (talks to the gateway) and `apply_loaded` (mutates the
//! store) when the host runs the fetch off its event loop; if two loads are in
//! flight, whichever is applied last wins.
//!
//! Until the first load is applied the store is simply empty.
//!
//! ## Failure Policy
//!
//! - Mutations on unknown threads or comment indexes fail synchronously.
//! - Gateway failures are logged by `load_comments` / `save_comments` and never
//!   propagate; in-memory state stays the source of truth. The `try_` variants
//!   return the error instead.
//! - [`CommentStore::set_all_indicator_values`] skips unknown ids.
//!
//! ## Ids
//!
//! Ids are `anno/<n>` from a store-owned counter that only moves forward. After a
//! load the counter is raised past every loaded id.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::BTreeMap;

use crate::error::{MarginaliaError, Result};
use crate::gateway::{Gateway, Request};
use crate::model::{Comment, Person, Thread, ThreadId};
use crate::position::Indicator;

pub mod sort;
pub mod wire;

pub use sort::SortBy;
pub use wire::LoadedComments;

pub type Clock = Box<dyn Fn() -> DateTime<Utc>>;

/// What a [`CommentStore::delete_comment`] call removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentRemoval {
    Comment(Comment),
    /// Index 0 was deleted, which removes the whole thread.
    Thread(Thread),
}

/// Fetch and decode the whole comment table without touching any store.
pub fn fetch_comments<G: Gateway>(gateway: &G) -> Result<LoadedComments> {
    let response = gateway
        .query(&Request::GetAllComments.to_path())
        .map_err(|e| match e {
            MarginaliaError::Transport(_) => e,
            other => MarginaliaError::Transport(other.to_string()),
        })?;
    wire::decode_response(&response)
}

pub struct CommentStore<G: Gateway> {
    gateway: G,
    threads: BTreeMap<String, Vec<Thread>>,
    next_id: u64,
    clock: Clock,
}

impl<G: Gateway> CommentStore<G> {
    /// An empty store starting at `anno/0`, using the system clock.
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            threads: BTreeMap::new(),
            next_id: 0,
            clock: Box::new(Utc::now),
        }
    }

    /// Construct and immediately load from the gateway. A failed load is
    /// logged and leaves the store empty.
    pub fn connect(gateway: G) -> Self {
        let mut store = Self::new(gateway);
        store.load_comments();
        store
    }

    pub fn with_next_id(mut self, next_id: u64) -> Self {
        self.next_id = next_id;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// The id the next [`CommentStore::create_thread`] call will assign.
    pub fn latest_thread_id(&self) -> ThreadId {
        ThreadId::from_sequence(self.next_id)
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.threads.keys().map(String::as_str)
    }

    pub fn thread(&self, target: &str, thread_id: &ThreadId) -> Option<&Thread> {
        self.threads
            .get(target)?
            .iter()
            .find(|t| &t.id == thread_id)
    }

    fn thread_mut(&mut self, target: &str, thread_id: &ThreadId) -> Result<&mut Thread> {
        self.threads
            .get_mut(target)
            .and_then(|threads| threads.iter_mut().find(|t| &t.id == thread_id))
            .ok_or_else(|| not_found(target, thread_id))
    }

    // --- Mutations ---

    pub fn create_thread(
        &mut self,
        target: &str,
        value: String,
        creator: Person,
        indicator: Option<Indicator>,
    ) -> Result<ThreadId> {
        validate_creator(&creator)?;

        let id = ThreadId::from_sequence(self.next_id);
        self.next_id += 1;

        let opening = Comment::new(value, creator, (self.clock)());
        let thread = Thread::new(id.clone(), target, opening, indicator);
        self.threads.entry(target.to_string()).or_default().push(thread);

        debug!(target: "marginalia::store", "Created thread {} on {}", id, target);
        Ok(id)
    }

    /// Append a reply to a thread.
    pub fn create_comment(
        &mut self,
        target: &str,
        thread_id: &ThreadId,
        value: String,
        creator: Person,
    ) -> Result<()> {
        validate_creator(&creator)?;
        let now = (self.clock)();
        let thread = self.thread_mut(target, thread_id)?;
        thread.push(Comment::new(value, creator, now));
        Ok(())
    }

    pub fn edit_comment(
        &mut self,
        target: &str,
        thread_id: &ThreadId,
        value: String,
        index: usize,
    ) -> Result<()> {
        let now = (self.clock)();
        let thread = self.thread_mut(target, thread_id)?;
        let total = thread.total();
        let comment = thread
            .comment_mut(index)
            .ok_or_else(|| out_of_range(thread_id, index, total))?;
        comment.edit(value, now);
        Ok(())
    }

    /// Edit the opening comment of a thread.
    pub fn edit_thread(&mut self, target: &str, thread_id: &ThreadId, value: String) -> Result<()> {
        self.edit_comment(target, thread_id, value, 0)
    }

    /// Remove `body[index]`. Removing the opening comment (index 0) deletes the
    /// whole thread.
    pub fn delete_comment(
        &mut self,
        target: &str,
        thread_id: &ThreadId,
        index: usize,
    ) -> Result<CommentRemoval> {
        let total = self.thread_mut(target, thread_id)?.total();
        if index >= total {
            return Err(out_of_range(thread_id, index, total));
        }
        if index == 0 {
            return self.delete_thread(target, thread_id).map(CommentRemoval::Thread);
        }
        self.thread_mut(target, thread_id)?
            .remove(index)
            .map(CommentRemoval::Comment)
            .ok_or_else(|| out_of_range(thread_id, index, total))
    }

    /// Remove a thread from its target. The id is not reused.
    pub fn delete_thread(&mut self, target: &str, thread_id: &ThreadId) -> Result<Thread> {
        let threads = self
            .threads
            .get_mut(target)
            .ok_or_else(|| not_found(target, thread_id))?;
        let position = threads
            .iter()
            .position(|t| &t.id == thread_id)
            .ok_or_else(|| not_found(target, thread_id))?;
        let removed = threads.remove(position);
        debug!(target: "marginalia::store", "Deleted thread {} on {}", thread_id, target);
        Ok(removed)
    }

    pub fn set_resolved_value(
        &mut self,
        target: &str,
        thread_id: &ThreadId,
        state: bool,
    ) -> Result<()> {
        self.thread_mut(target, thread_id)?.resolved = state;
        Ok(())
    }

    // --- Indicators ---

    /// Indicators of unresolved threads that have one, keyed by thread id.
    pub fn get_all_indicator_values(&self, target: &str) -> BTreeMap<ThreadId, Indicator> {
        self.threads
            .get(target)
            .map(|threads| {
                threads
                    .iter()
                    .filter(|t| !t.resolved)
                    .filter_map(|t| t.indicator.clone().map(|i| (t.id.clone(), i)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Assign indicators in bulk. Ids with no thread on `target` are skipped.
    pub fn set_all_indicator_values(
        &mut self,
        target: &str,
        indicators: BTreeMap<ThreadId, Indicator>,
    ) {
        for (id, indicator) in indicators {
            match self.thread_mut(target, &id) {
                Ok(thread) => thread.indicator = Some(indicator),
                Err(_) => {
                    debug!(target: "marginalia::store", "Skipping indicator for unknown thread {} on {}", id, target)
                }
            }
        }
    }

    // --- Queries ---

    /// Threads of `target` in the requested order. Unknown targets yield an
    /// empty list. `id_list` is only consulted for [`SortBy::IdList`].
    pub fn get_threads_by_target(
        &self,
        target: &str,
        sort_by: SortBy,
        id_list: &[ThreadId],
    ) -> Vec<Thread> {
        match self.threads.get(target) {
            Some(threads) => sort::sort_threads(threads, sort_by, id_list),
            None => Vec::new(),
        }
    }

    // --- Persistence ---

    /// Load from the gateway, logging any failure.
    pub fn load_comments(&mut self) {
        if let Err(e) = self.try_load_comments() {
            warn!(target: "marginalia::store", "Error loading comments: {}", e);
        }
    }

    /// Load from the gateway and apply. Returns the number of threads loaded.
    pub fn try_load_comments(&mut self) -> Result<usize> {
        info!(target: "marginalia::store", "Loading comments...");
        let loaded = fetch_comments(&self.gateway)?;
        let count = loaded.thread_count();
        self.apply_loaded(loaded);
        info!(target: "marginalia::store", "Loaded {} threads", count);
        Ok(count)
    }

    /// Replace the whole table with a decoded load.
    pub fn apply_loaded(&mut self, loaded: LoadedComments) {
        let floor = loaded
            .max_sequence()
            .map(|n| n + 1)
            .unwrap_or(0)
            .max(loaded.thread_count() as u64);
        self.next_id = self.next_id.max(floor);
        self.threads = loaded.threads;
    }

    /// Persist one target, logging any failure.
    pub fn save_comments(&self, target: &str) {
        if let Err(e) = self.try_save_comments(target) {
            warn!(target: "marginalia::store", "Error saving comments for {}: {}", target, e);
        }
    }

    /// Send one target's threads through the gateway. No-op for targets the
    /// store has never held threads for. A target emptied by deletes is sent as
    /// an empty list so the deletes persist.
    pub fn try_save_comments(&self, target: &str) -> Result<()> {
        let threads = match self.threads.get(target) {
            Some(threads) => threads,
            None => return Ok(()),
        };
        let request = Request::SaveComments {
            target: target.to_string(),
            comments: wire::encode_target(threads)?,
        };
        self.gateway.query(&request.to_path())?;
        Ok(())
    }
}

fn validate_creator(creator: &Person) -> Result<()> {
    if creator.name.trim().is_empty() {
        return Err(MarginaliaError::InvalidCreator(
            "creator name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn not_found(target: &str, thread: &ThreadId) -> MarginaliaError {
    MarginaliaError::ThreadNotFound {
        target: target.to_string(),
        thread: thread.clone(),
    }
}

fn out_of_range(thread: &ThreadId, index: usize, total: usize) -> MarginaliaError {
    MarginaliaError::CommentOutOfRange {
        thread: thread.clone(),
        index,
        total,
    }
}
