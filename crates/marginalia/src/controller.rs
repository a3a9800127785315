//! # Sync Controller
//!
//! [`SyncController`] is the only type a presentation layer talks to. It owns
//! the [`CommentStore`] and the [`IndicatorEngine`], and re-renders the active
//! document's indicators whenever thread state changes.
//!
//! State owned here, and only mutated here:
//! - `active_target`: the document currently shown.
//! - `expanded`: the thread whose card is open (highlighted in the active color).
//! - the pending new thread, between [`SyncController::begin_new_thread`] and
//!   commit or cancel. While it exists, resyncs do not wipe the document's
//!   marks so the pending underline survives.
//!
//! Every mutation goes store → save → refresh. Saves log and swallow gateway
//! failures; store errors (unknown thread, bad index, bad creator) are returned.

use log::{debug, info};
use std::collections::BTreeMap;

use crate::config::MarginaliaConfig;
use crate::error::{MarginaliaError, Result};
use crate::gateway::Gateway;
use crate::indicator::{context_for, Document, IndicatorEngine};
use crate::model::{Person, Thread, ThreadId};
use crate::position::Indicator;
use crate::store::{CommentRemoval, CommentStore, SortBy};

struct PendingThread {
    id: ThreadId,
    indicator: Indicator,
}

pub struct SyncController<G: Gateway, D: Document> {
    store: CommentStore<G>,
    engine: IndicatorEngine<D>,
    expanded: Option<ThreadId>,
    active_target: Option<String>,
    pending: Option<PendingThread>,
}

impl<G: Gateway, D: Document> SyncController<G, D> {
    pub fn new(store: CommentStore<G>, engine: IndicatorEngine<D>) -> Self {
        Self {
            store,
            engine,
            expanded: None,
            active_target: None,
            pending: None,
        }
    }

    /// Controller with an engine styled from `config`.
    pub fn from_config(store: CommentStore<G>, config: &MarginaliaConfig) -> Self {
        let engine = IndicatorEngine::new(config.palette()).with_context_limit(config.context_limit);
        Self::new(store, engine)
    }

    pub fn store(&self) -> &CommentStore<G> {
        &self.store
    }

    /// Mutable store access, e.g. to apply a load fetched off the event loop.
    /// Call [`SyncController::refresh`] afterwards.
    pub fn store_mut(&mut self) -> &mut CommentStore<G> {
        &mut self.store
    }

    pub fn engine(&self) -> &IndicatorEngine<D> {
        &self.engine
    }

    pub fn expanded_thread(&self) -> Option<&ThreadId> {
        self.expanded.as_ref()
    }

    pub fn active_target(&self) -> Option<&str> {
        self.active_target.as_deref()
    }

    pub fn is_composing(&self) -> bool {
        self.pending.is_some()
    }

    fn target(&self) -> Result<String> {
        self.active_target
            .clone()
            .ok_or_else(|| MarginaliaError::InvalidRequest("No active document".to_string()))
    }

    fn active_threads(&self) -> Vec<Thread> {
        match &self.active_target {
            Some(target) => self.store.get_threads_by_target(target, SortBy::Date, &[]),
            None => Vec::new(),
        }
    }

    // --- Document lifecycle ---

    /// Switch to `target` shown in `doc`.
    ///
    /// Markers on the outgoing document are cleared through `previous`. Pass
    /// `None` when that document is already closed; its markers are then
    /// forgotten without touching any document.
    pub fn activate(&mut self, previous: Option<&mut D>, doc: &mut D, target: &str) {
        if self.active_target.as_deref() != Some(target) {
            match previous {
                Some(previous) => self.deactivate(previous),
                None => self.detach(),
            }
            info!(target: "marginalia::controller", "Activating {}", target);
            self.active_target = Some(target.to_string());
        }
        self.refresh(doc);
    }

    /// Clear the active document's indicators from `doc` and leave it.
    pub fn deactivate(&mut self, doc: &mut D) {
        let threads = self.active_threads();
        self.engine.clear_all_indicators(doc, &threads);
        self.detach();
    }

    fn detach(&mut self) {
        self.engine.reset();
        self.active_target = None;
        self.expanded = None;
        self.pending = None;
    }

    /// Re-render the active document's indicators from the store.
    pub fn refresh(&mut self, doc: &mut D) {
        if self.active_target.is_none() {
            return;
        }
        let threads = self.active_threads();
        self.engine
            .put_indicators(doc, &threads, self.expanded.as_ref(), self.pending.is_some());
    }

    // --- Focus ---

    pub fn focus_thread(&mut self, doc: &mut D, thread_id: &ThreadId) -> Result<()> {
        let target = self.target()?;
        if self.store.thread(&target, thread_id).is_none() {
            return Err(MarginaliaError::ThreadNotFound {
                target,
                thread: thread_id.clone(),
            });
        }
        self.expanded = Some(thread_id.clone());
        self.refresh(doc);
        Ok(())
    }

    pub fn collapse(&mut self, doc: &mut D) {
        self.expanded = None;
        self.refresh(doc);
    }

    /// Handle a cursor entering a highlight. Focuses and returns the owning
    /// thread unless it is already expanded.
    pub fn cursor_entered(&mut self, doc: &mut D) -> Option<ThreadId> {
        let id = self.engine.focus_target(doc, self.expanded.as_ref())?;
        debug!(target: "marginalia::controller", "Cursor entered {}", id);
        self.expanded = Some(id.clone());
        self.refresh(doc);
        Some(id)
    }

    // --- New thread composition ---

    /// Start composing a thread on the current selection. Returns the id the
    /// thread will get if committed.
    pub fn begin_new_thread(&mut self, doc: &mut D) -> Result<ThreadId> {
        self.target()?;
        let indicator = self.engine.selection_indicator(doc);
        let id = self.store.latest_thread_id();
        if let Some(range) = indicator.text_range() {
            self.engine.preview(doc, range, &id);
        }
        self.pending = Some(PendingThread {
            id: id.clone(),
            indicator,
        });
        Ok(id)
    }

    pub fn commit_new_thread(&mut self, doc: &mut D, value: String, creator: Person) -> Result<ThreadId> {
        let target = self.target()?;
        let pending = self
            .pending
            .take()
            .ok_or_else(|| MarginaliaError::InvalidRequest("No thread is being composed".to_string()))?;

        let id = match self
            .store
            .create_thread(&target, value, creator, Some(pending.indicator.clone()))
        {
            Ok(id) => id,
            Err(e) => {
                self.pending = Some(pending);
                return Err(e);
            }
        };
        if id != pending.id {
            debug!(target: "marginalia::controller", "Pending {} committed as {}", pending.id, id);
        }

        self.engine.clear_preview(doc);
        self.expanded = Some(id.clone());
        self.store.save_comments(&target);
        self.refresh(doc);
        Ok(id)
    }

    pub fn cancel_new_thread(&mut self, doc: &mut D) {
        self.pending = None;
        self.engine.clear_preview(doc);
        self.refresh(doc);
    }

    // --- Thread mutations ---

    pub fn reply(&mut self, doc: &mut D, thread_id: &ThreadId, value: String, creator: Person) -> Result<()> {
        let target = self.target()?;
        self.store.create_comment(&target, thread_id, value, creator)?;
        self.persist(doc, &target);
        Ok(())
    }

    pub fn edit_comment(&mut self, doc: &mut D, thread_id: &ThreadId, value: String, index: usize) -> Result<()> {
        let target = self.target()?;
        self.store.edit_comment(&target, thread_id, value, index)?;
        self.persist(doc, &target);
        Ok(())
    }

    pub fn edit_thread(&mut self, doc: &mut D, thread_id: &ThreadId, value: String) -> Result<()> {
        let target = self.target()?;
        self.store.edit_thread(&target, thread_id, value)?;
        self.persist(doc, &target);
        Ok(())
    }

    pub fn delete_comment(&mut self, doc: &mut D, thread_id: &ThreadId, index: usize) -> Result<CommentRemoval> {
        let target = self.target()?;
        let removal = self.store.delete_comment(&target, thread_id, index)?;
        if matches!(removal, CommentRemoval::Thread(_)) {
            self.forget(thread_id);
        }
        self.persist(doc, &target);
        Ok(removal)
    }

    pub fn delete_thread(&mut self, doc: &mut D, thread_id: &ThreadId) -> Result<Thread> {
        let target = self.target()?;
        let removed = self.store.delete_thread(&target, thread_id)?;
        self.forget(thread_id);
        self.persist(doc, &target);
        Ok(removed)
    }

    /// Resolve or reopen a thread. Resolving the expanded thread collapses it.
    pub fn set_resolved(&mut self, doc: &mut D, thread_id: &ThreadId, state: bool) -> Result<()> {
        let target = self.target()?;
        self.store.set_resolved_value(&target, thread_id, state)?;
        if state {
            self.forget(thread_id);
        }
        self.persist(doc, &target);
        Ok(())
    }

    /// Write the live range of every tracked marker back to its thread's
    /// `current` anchor, then save.
    pub fn sync_indicator_positions(&mut self, doc: &D) -> Result<usize> {
        let target = self.target()?;
        let limit = self.engine.context_limit();

        let updates: BTreeMap<ThreadId, Indicator> = self
            .engine
            .current_ranges(doc)
            .into_iter()
            .filter_map(|(id, range)| {
                let indicator = self.store.thread(&target, &id)?.indicator.as_ref()?;
                let refreshed = indicator.with_current(range, Some(context_for(doc, range, limit)));
                Some((id, refreshed))
            })
            .collect();

        let count = updates.len();
        self.store.set_all_indicator_values(&target, updates);
        self.store.save_comments(&target);
        Ok(count)
    }

    // --- Queries ---

    /// Threads of the active document. Empty when no document is active.
    pub fn threads(&self, sort_by: SortBy, id_list: &[ThreadId]) -> Vec<Thread> {
        match &self.active_target {
            Some(target) => self.store.get_threads_by_target(target, sort_by, id_list),
            None => Vec::new(),
        }
    }

    fn forget(&mut self, thread_id: &ThreadId) {
        if self.expanded.as_ref() == Some(thread_id) {
            self.expanded = None;
        }
    }

    fn persist(&mut self, doc: &mut D, target: &str) {
        self.store.save_comments(target);
        self.refresh(doc);
    }
}
