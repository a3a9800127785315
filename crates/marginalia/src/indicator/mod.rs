//! # Indicator Engine
//!
//! Projects threads onto a live [`Document`] as marker decorations and answers
//! "which thread owns this position".
//!
//! The engine keeps `ThreadId -> Marker` for every highlighted thread. Once a
//! marker exists its range is owned by the document: hit-testing and
//! [`IndicatorEngine::current_ranges`] always ask the document where the marker
//! is now, never the indicator it was created from. Nothing here rebases an
//! indicator when text is edited; the controller writes live marker ranges back
//! as `current` when asked to.
//!
//! Only [`Indicator::Text`] is rendered. Notebook indicators pass through
//! untouched.
//!
//! ## Marker Kinds
//!
//! | Kind | Style | Tracked |
//! |------|-------|---------|
//! | [`MarkKind::Highlight`] | background tint, focus-on-enter | yes |
//! | [`MarkKind::Underline`] | underline | yes |
//! | [`MarkKind::Clear`] | inert, released immediately | no |
//!
//! Marking a thread that already has a marker replaces it, so a thread never
//! owns two decorations.
//!
//! ## Hit-Test Order
//!
//! The map is ordered by thread id, compared as strings, so when ranges
//! overlap the lexicographically smallest id wins (`anno/10` before `anno/2`).

use log::{debug, trace};
use std::collections::BTreeMap;

use crate::config::Palette;
use crate::model::{Thread, ThreadId};
use crate::position::{Indicator, Position, Range};

pub mod document;
pub mod memory;

pub use document::{Document, EnterAction, MarkStyle, MarkerEvent};

pub const DEFAULT_CONTEXT_LIMIT: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkKind {
    Highlight,
    Underline,
    Clear,
}

pub struct IndicatorEngine<D: Document> {
    indicators: BTreeMap<ThreadId, D::Marker>,
    pending: Option<(ThreadId, D::Marker)>,
    palette: Palette,
    context_limit: usize,
}

impl<D: Document> Default for IndicatorEngine<D> {
    fn default() -> Self {
        Self::new(Palette::default())
    }
}

impl<D: Document> IndicatorEngine<D> {
    pub fn new(palette: Palette) -> Self {
        Self {
            indicators: BTreeMap::new(),
            pending: None,
            palette,
            context_limit: DEFAULT_CONTEXT_LIMIT,
        }
    }

    pub fn with_context_limit(mut self, limit: usize) -> Self {
        self.context_limit = limit;
        self
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn context_limit(&self) -> usize {
        self.context_limit
    }

    pub fn is_tracking(&self, thread_id: &ThreadId) -> bool {
        self.indicators.contains_key(thread_id)
    }

    pub fn tracked_ids(&self) -> impl Iterator<Item = &ThreadId> {
        self.indicators.keys()
    }

    /// Render `indicator` for `thread_id`. A missing or non-text indicator is
    /// ignored. `color` overrides the palette color for the kind.
    pub fn create_indicator(
        &mut self,
        doc: &mut D,
        indicator: Option<&Indicator>,
        thread_id: &ThreadId,
        kind: MarkKind,
        color: Option<&str>,
    ) {
        let range = match indicator.and_then(Indicator::text_range) {
            Some(range) => range.normalized(),
            None => return,
        };

        if let Some(previous) = self.indicators.remove(thread_id) {
            doc.clear_mark(previous);
        }

        match kind {
            MarkKind::Highlight => {
                let style = MarkStyle::Highlight {
                    color: color.unwrap_or(self.palette.highlight.as_str()).to_string(),
                };
                let marker = doc.mark_text(range.start, range.end, &style);
                doc.on_mark_event(&marker, MarkerEvent::BeforeCursorEnter, EnterAction::FocusOwner);
                self.indicators.insert(thread_id.clone(), marker);
            }
            MarkKind::Underline => {
                let style = MarkStyle::Underline {
                    color: color.unwrap_or(self.palette.pending.as_str()).to_string(),
                };
                let marker = doc.mark_text(range.start, range.end, &style);
                self.indicators.insert(thread_id.clone(), marker);
            }
            MarkKind::Clear => {
                let marker = doc.mark_text(range.start, range.end, &MarkStyle::Inert);
                doc.on_mark_event(&marker, MarkerEvent::BeforeCursorEnter, EnterAction::Ignore);
                doc.clear_mark(marker);
            }
        }
        trace!(target: "marginalia::indicator", "{:?} {} at {:?}", kind, thread_id, range);
    }

    /// Full resync for one target's threads.
    ///
    /// Unless a new thread is being composed, every mark in the document is
    /// cleared first. Unresolved threads are highlighted, in the active color
    /// when expanded. Resolved threads that were highlighted get a clear.
    pub fn put_indicators(
        &mut self,
        doc: &mut D,
        threads: &[Thread],
        expanded: Option<&ThreadId>,
        composing: bool,
    ) {
        let was_tracked: Vec<ThreadId> = self.indicators.keys().cloned().collect();

        if !composing {
            for marker in doc.all_marks() {
                doc.clear_mark(marker);
            }
            self.indicators.clear();
            self.pending = None;
        }

        for thread in threads {
            if !thread.resolved {
                let color = if expanded == Some(&thread.id) {
                    Some(self.palette.active.clone())
                } else {
                    None
                };
                self.create_indicator(
                    doc,
                    thread.indicator.as_ref(),
                    &thread.id,
                    MarkKind::Highlight,
                    color.as_deref(),
                );
            } else if was_tracked.contains(&thread.id) {
                self.create_indicator(doc, thread.indicator.as_ref(), &thread.id, MarkKind::Clear, None);
                // A resolved thread without a text range still loses its marker
                if let Some(marker) = self.indicators.remove(&thread.id) {
                    doc.clear_mark(marker);
                }
            }
        }

        let stale: Vec<ThreadId> = self
            .indicators
            .keys()
            .filter(|id| !threads.iter().any(|t| &t.id == *id && !t.resolved))
            .cloned()
            .collect();
        for id in stale {
            if let Some(marker) = self.indicators.remove(&id) {
                doc.clear_mark(marker);
            }
        }

        debug!(target: "marginalia::indicator", "Tracking {} indicators", self.indicators.len());
    }

    /// Clear every thread's range, drop all tracked markers, then clear whatever
    /// marks are still left in the document.
    pub fn clear_all_indicators(&mut self, doc: &mut D, threads: &[Thread]) {
        for thread in threads {
            self.create_indicator(doc, thread.indicator.as_ref(), &thread.id, MarkKind::Clear, None);
        }
        for (_, marker) in std::mem::take(&mut self.indicators) {
            doc.clear_mark(marker);
        }
        if let Some((_, marker)) = self.pending.take() {
            doc.clear_mark(marker);
        }
        for marker in doc.all_marks() {
            doc.clear_mark(marker);
        }
    }

    /// The first tracked thread whose live range contains `position`.
    pub fn get_annotation_from_position(&self, doc: &D, position: Position) -> Option<ThreadId> {
        self.indicators
            .iter()
            .find(|(_, marker)| {
                doc.find_mark(marker)
                    .map_or(false, |range| range.normalized().contains(position))
            })
            .map(|(id, _)| id.clone())
    }

    /// The thread to focus after the cursor entered a highlight, if any. The
    /// already expanded thread is never returned.
    pub fn focus_target(&self, doc: &D, expanded: Option<&ThreadId>) -> Option<ThreadId> {
        let hit = self.get_annotation_from_position(doc, doc.cursor_position())?;
        if expanded == Some(&hit) {
            return None;
        }
        Some(hit)
    }

    /// Live ranges of all tracked markers. Markers the document lost are skipped.
    pub fn current_ranges(&self, doc: &D) -> BTreeMap<ThreadId, Range> {
        self.indicators
            .iter()
            .filter_map(|(id, marker)| doc.find_mark(marker).map(|range| (id.clone(), range)))
            .collect()
    }

    /// A text indicator for the current selection. A zero-width selection
    /// covers its whole line.
    pub fn selection_indicator(&self, doc: &D) -> Indicator {
        let selection = doc.selection();
        let range = if selection.is_empty() {
            let line = selection.start.line;
            let length = doc.line(line).map_or(0, |text| text.chars().count() as u32);
            Range::new(Position::new(line, 0), Position::new(line, length))
        } else {
            selection.normalized()
        };
        Indicator::text(range, context_for(doc, range, self.context_limit))
    }

    /// Underline `range` as the anchor of a thread still being written.
    pub fn preview(&mut self, doc: &mut D, range: Range, thread_id: &ThreadId) {
        self.clear_preview(doc);
        let range = range.normalized();
        let style = MarkStyle::Underline {
            color: self.palette.pending.clone(),
        };
        let marker = doc.mark_text(range.start, range.end, &style);
        self.pending = Some((thread_id.clone(), marker));
    }

    pub fn clear_preview(&mut self, doc: &mut D) {
        if let Some((_, marker)) = self.pending.take() {
            doc.clear_mark(marker);
        }
    }

    pub fn pending_id(&self) -> Option<&ThreadId> {
        self.pending.as_ref().map(|(id, _)| id)
    }

    /// Forget every tracked marker without touching any document. Used when
    /// the document the markers belong to is gone.
    pub fn reset(&mut self) {
        self.indicators.clear();
        self.pending = None;
    }
}

/// Text covered by `range`, truncated to `limit` characters. Lines are joined
/// with `\n`; columns count characters.
pub fn context_for<D: Document>(doc: &D, range: Range, limit: usize) -> String {
    let (start, end) = if range.start <= range.end {
        (range.start, range.end)
    } else {
        (range.end, range.start)
    };

    let mut parts = Vec::new();
    for n in start.line..=end.line {
        let Some(text) = doc.line(n) else { break };
        let chars: Vec<char> = text.chars().collect();
        let from = if n == start.line { start.column as usize } else { 0 };
        let to = if n == end.line {
            (end.column as usize).min(chars.len())
        } else {
            chars.len()
        };
        let from = from.min(to);
        parts.push(chars[from..to].iter().collect::<String>());
    }

    parts.join("\n").chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::memory::{MarkOp, MemDocument};
    use super::*;
    use crate::model::{Comment, Person};
    use chrono::Utc;

    fn pos(line: u32, column: u32) -> Position {
        Position::new(line, column)
    }

    fn indicator(from: Position, to: Position) -> Indicator {
        Indicator::text(Range::new(from, to), "")
    }

    fn thread(id: &str, indicator: Option<Indicator>, resolved: bool) -> Thread {
        let mut thread = Thread::new(
            ThreadId::from(id),
            "a.py",
            Comment::new("x".into(), Person::named("Ann"), Utc::now()),
            indicator,
        );
        thread.resolved = resolved;
        thread
    }

    fn doc() -> MemDocument {
        MemDocument::new("line zero\nline one\nline two is longer\nline three\n")
    }

    fn engine() -> IndicatorEngine<MemDocument> {
        IndicatorEngine::default()
    }

    #[test]
    fn highlight_hit_test() {
        let mut doc = doc();
        let mut engine = engine();
        let id = ThreadId::from("anno/0");
        engine.create_indicator(
            &mut doc,
            Some(&indicator(pos(2, 0), pos(2, 10))),
            &id,
            MarkKind::Highlight,
            None,
        );

        assert_eq!(engine.get_annotation_from_position(&doc, pos(2, 5)), Some(id.clone()));
        assert_eq!(engine.get_annotation_from_position(&doc, pos(2, 10)), Some(id));
        assert_eq!(engine.get_annotation_from_position(&doc, pos(3, 0)), None);
    }

    #[test]
    fn backward_selection_marks_the_same_range() {
        let mut forward_doc = doc();
        let mut backward_doc = doc();
        let mut engine = engine();
        let id = ThreadId::from("anno/0");

        engine.create_indicator(
            &mut forward_doc,
            Some(&indicator(pos(1, 2), pos(2, 6))),
            &id,
            MarkKind::Highlight,
            None,
        );
        engine.create_indicator(
            &mut backward_doc,
            Some(&indicator(pos(2, 6), pos(1, 2))),
            &id,
            MarkKind::Highlight,
            None,
        );

        assert_eq!(forward_doc.history(), backward_doc.history());
    }

    #[test]
    fn missing_or_notebook_indicator_is_ignored() {
        let mut doc = doc();
        let mut engine = engine();
        let id = ThreadId::from("anno/0");
        engine.create_indicator(&mut doc, None, &id, MarkKind::Highlight, None);

        let cell = Indicator::NotebookCell {
            index: "3".into(),
            cell: crate::position::CellKind::Input,
        };
        engine.create_indicator(&mut doc, Some(&cell), &id, MarkKind::Highlight, None);

        assert!(doc.history().is_empty());
        assert!(!engine.is_tracking(&id));
    }

    #[test]
    fn clear_kind_is_released_immediately() {
        let mut doc = doc();
        let mut engine = engine();
        let id = ThreadId::from("anno/0");
        engine.create_indicator(
            &mut doc,
            Some(&indicator(pos(0, 0), pos(0, 4))),
            &id,
            MarkKind::Clear,
            None,
        );

        assert_eq!(doc.mark_count(), 0);
        assert!(matches!(
            doc.history(),
            [MarkOp::Mark { style: MarkStyle::Inert, .. }, MarkOp::Clear { .. }]
        ));
        assert!(!engine.is_tracking(&id));
    }

    #[test]
    fn remarking_a_thread_replaces_its_marker() {
        let mut doc = doc();
        let mut engine = engine();
        let id = ThreadId::from("anno/0");
        let ind = indicator(pos(0, 0), pos(0, 4));
        engine.create_indicator(&mut doc, Some(&ind), &id, MarkKind::Highlight, None);
        engine.create_indicator(&mut doc, Some(&ind), &id, MarkKind::Highlight, Some("red"));

        assert_eq!(doc.mark_count(), 1);
        let marker = doc.all_marks()[0];
        assert_eq!(
            doc.style_of(&marker),
            Some(&MarkStyle::Highlight { color: "red".into() })
        );
    }

    #[test]
    fn put_indicators_colors_expanded_thread() {
        let mut doc = doc();
        let mut engine = engine();
        let threads = vec![
            thread("anno/0", Some(indicator(pos(0, 0), pos(0, 4))), false),
            thread("anno/1", Some(indicator(pos(1, 0), pos(1, 4))), false),
        ];
        let expanded = ThreadId::from("anno/1");
        engine.put_indicators(&mut doc, &threads, Some(&expanded), false);

        let styles: Vec<_> = doc
            .all_marks()
            .iter()
            .filter_map(|m| doc.style_of(m).cloned())
            .collect();
        assert_eq!(
            styles,
            vec![
                MarkStyle::Highlight { color: "yellow".into() },
                MarkStyle::Highlight { color: "orange".into() },
            ]
        );
    }

    #[test]
    fn put_indicators_clears_resolved_thread() {
        let mut doc = doc();
        let mut engine = engine();
        let ind = Some(indicator(pos(0, 0), pos(0, 4)));
        let id = ThreadId::from("anno/0");

        engine.put_indicators(&mut doc, &[thread("anno/0", ind.clone(), false)], None, false);
        assert!(engine.is_tracking(&id));
        doc.clear_history();

        engine.put_indicators(&mut doc, &[thread("anno/0", ind, true)], None, false);

        assert!(!engine.is_tracking(&id));
        assert_eq!(doc.mark_count(), 0);
        assert!(doc
            .history()
            .iter()
            .any(|op| matches!(op, MarkOp::Mark { style: MarkStyle::Inert, .. })));
    }

    #[test]
    fn put_indicators_removes_foreign_marks_unless_composing() {
        let mut doc = doc();
        let mut engine = engine();
        doc.mark_text(pos(3, 0), pos(3, 2), &MarkStyle::Inert);

        engine.put_indicators(&mut doc, &[], None, true);
        assert_eq!(doc.mark_count(), 1);

        engine.put_indicators(&mut doc, &[], None, false);
        assert_eq!(doc.mark_count(), 0);
    }

    #[test]
    fn composing_keeps_preview_and_prunes_deleted_threads() {
        let mut doc = doc();
        let mut engine = engine();
        let ind = Some(indicator(pos(0, 0), pos(0, 4)));
        engine.put_indicators(&mut doc, &[thread("anno/0", ind, false)], None, false);
        engine.preview(&mut doc, Range::new(pos(2, 0), pos(2, 4)), &ThreadId::from("anno/1"));

        // anno/0 was deleted while composing
        engine.put_indicators(&mut doc, &[], None, true);

        assert!(!engine.is_tracking(&ThreadId::from("anno/0")));
        assert_eq!(engine.pending_id(), Some(&ThreadId::from("anno/1")));
        assert_eq!(doc.mark_count(), 1);
    }

    #[test]
    fn reset_forgets_markers_without_touching_document() {
        let mut doc = doc();
        let mut engine = engine();
        let ind = Some(indicator(pos(0, 0), pos(0, 4)));
        engine.put_indicators(&mut doc, &[thread("anno/0", ind, false)], None, false);
        engine.preview(&mut doc, Range::new(pos(1, 0), pos(1, 2)), &ThreadId::from("anno/1"));
        doc.clear_history();

        engine.reset();

        assert_eq!(engine.tracked_ids().count(), 0);
        assert!(engine.pending_id().is_none());
        assert!(doc.history().is_empty());
        assert_eq!(doc.mark_count(), 2);
    }

    #[test]
    fn clear_all_leaves_no_marks() {
        let mut doc = doc();
        let mut engine = engine();
        let threads = vec![
            thread("anno/0", Some(indicator(pos(0, 0), pos(0, 4))), false),
            thread("anno/1", None, false),
        ];
        engine.put_indicators(&mut doc, &threads, None, false);
        engine.preview(&mut doc, Range::new(pos(1, 0), pos(1, 2)), &ThreadId::from("anno/2"));
        doc.mark_text(pos(3, 0), pos(3, 1), &MarkStyle::Inert);

        engine.clear_all_indicators(&mut doc, &threads);

        assert_eq!(doc.mark_count(), 0);
        assert_eq!(engine.tracked_ids().count(), 0);
        assert!(engine.pending_id().is_none());
    }

    #[test]
    fn hit_test_follows_reflowed_marker() {
        let mut doc = doc();
        let mut engine = engine();
        let id = ThreadId::from("anno/0");
        engine.create_indicator(
            &mut doc,
            Some(&indicator(pos(1, 0), pos(1, 8))),
            &id,
            MarkKind::Highlight,
            None,
        );

        doc.insert_lines(0, 2);

        assert_eq!(engine.get_annotation_from_position(&doc, pos(1, 3)), None);
        assert_eq!(engine.get_annotation_from_position(&doc, pos(3, 3)), Some(id.clone()));
        assert_eq!(
            engine.current_ranges(&doc).get(&id),
            Some(&Range::new(pos(3, 0), pos(3, 8)))
        );
    }

    #[test]
    fn overlapping_ranges_resolve_by_id_order() {
        let mut doc = doc();
        let mut engine = engine();
        let ind = indicator(pos(0, 0), pos(0, 9));
        engine.create_indicator(&mut doc, Some(&ind), &ThreadId::from("anno/2"), MarkKind::Highlight, None);
        engine.create_indicator(&mut doc, Some(&ind), &ThreadId::from("anno/10"), MarkKind::Highlight, None);

        assert_eq!(
            engine.get_annotation_from_position(&doc, pos(0, 1)),
            Some(ThreadId::from("anno/10"))
        );
    }

    #[test]
    fn focus_target_skips_expanded_thread() {
        let mut doc = doc();
        let mut engine = engine();
        let id = ThreadId::from("anno/0");
        engine.create_indicator(
            &mut doc,
            Some(&indicator(pos(0, 0), pos(0, 4))),
            &id,
            MarkKind::Highlight,
            None,
        );

        assert!(doc.enter(pos(0, 2)));
        assert_eq!(engine.focus_target(&doc, None), Some(id.clone()));
        assert_eq!(engine.focus_target(&doc, Some(&id)), None);

        doc.set_cursor(pos(2, 0));
        assert_eq!(engine.focus_target(&doc, None), None);
    }

    #[test]
    fn zero_width_selection_covers_line() {
        let mut doc = doc();
        doc.set_cursor(pos(2, 4));
        let ind = engine().selection_indicator(&doc);

        assert_eq!(ind.text_range(), Some(Range::new(pos(2, 0), pos(2, 18))));
        match ind {
            Indicator::Text { initial, current } => {
                assert_eq!(initial, current);
                assert_eq!(current.context, "line two is longer");
            }
            other => panic!("expected text indicator, got {:?}", other),
        }
    }

    #[test]
    fn context_spans_lines_and_truncates() {
        let doc = doc();
        let range = Range::new(pos(0, 5), pos(1, 4));
        assert_eq!(context_for(&doc, range, 80), "zero\nline");
        assert_eq!(context_for(&doc, range, 3), "zer");
        // Reversed ranges read the same text
        assert_eq!(context_for(&doc, Range::new(pos(1, 4), pos(0, 5)), 80), "zero\nline");
    }
}
