use std::collections::BTreeMap;

use super::document::{Document, EnterAction, MarkStyle, MarkerEvent};
use crate::position::{Position, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkId(u64);

/// A marker operation, recorded in the order the document received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOp {
    Mark {
        id: MarkId,
        range: Range,
        style: MarkStyle,
    },
    Clear {
        id: MarkId,
    },
}

#[derive(Debug, Clone)]
struct MemMark {
    range: Range,
    style: MarkStyle,
    listeners: Vec<(MarkerEvent, EnterAction)>,
}

/// In-memory [`Document`] for tests and headless hosts.
///
/// Holds lines of text, a selection, a cursor and a mark table. Every mark and
/// clear is appended to [`MemDocument::history`].
#[derive(Debug, Clone, Default)]
pub struct MemDocument {
    lines: Vec<String>,
    selection: Range,
    cursor: Position,
    marks: BTreeMap<MarkId, MemMark>,
    next_mark: u64,
    history: Vec<MarkOp>,
}

impl MemDocument {
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            ..Default::default()
        }
    }

    pub fn select(&mut self, from: Position, to: Position) {
        self.selection = Range::new(from, to);
        self.cursor = to;
    }

    pub fn set_cursor(&mut self, position: Position) {
        self.cursor = position;
        self.selection = Range::new(position, position);
    }

    /// Move the cursor to `position` and report whether a marker asking for
    /// [`EnterAction::FocusOwner`] was entered.
    pub fn enter(&mut self, position: Position) -> bool {
        self.set_cursor(position);
        self.marks.values().any(|mark| {
            mark.range.contains(position)
                && mark
                    .listeners
                    .iter()
                    .any(|l| *l == (MarkerEvent::BeforeCursorEnter, EnterAction::FocusOwner))
        })
    }

    /// Insert `count` empty lines before line `at`. Marks at or below `at` move
    /// down with the text.
    pub fn insert_lines(&mut self, at: u32, count: u32) {
        let index = (at as usize).min(self.lines.len());
        for _ in 0..count {
            self.lines.insert(index, String::new());
        }
        let shift = |p: &mut Position| {
            if p.line >= at {
                p.line += count;
            }
        };
        for mark in self.marks.values_mut() {
            shift(&mut mark.range.start);
            shift(&mut mark.range.end);
        }
    }

    pub fn history(&self) -> &[MarkOp] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn mark_count(&self) -> usize {
        self.marks.len()
    }

    pub fn style_of(&self, marker: &MarkId) -> Option<&MarkStyle> {
        self.marks.get(marker).map(|m| &m.style)
    }
}

impl Document for MemDocument {
    type Marker = MarkId;

    fn selection(&self) -> Range {
        self.selection
    }

    fn cursor_position(&self) -> Position {
        self.cursor
    }

    fn line(&self, n: u32) -> Option<String> {
        self.lines.get(n as usize).cloned()
    }

    fn mark_text(&mut self, from: Position, to: Position, style: &MarkStyle) -> MarkId {
        let id = MarkId(self.next_mark);
        self.next_mark += 1;
        let range = Range::new(from, to);
        self.marks.insert(
            id,
            MemMark {
                range,
                style: style.clone(),
                listeners: Vec::new(),
            },
        );
        self.history.push(MarkOp::Mark {
            id,
            range,
            style: style.clone(),
        });
        id
    }

    fn find_mark(&self, marker: &MarkId) -> Option<Range> {
        self.marks.get(marker).map(|m| m.range)
    }

    fn on_mark_event(&mut self, marker: &MarkId, event: MarkerEvent, action: EnterAction) {
        if let Some(mark) = self.marks.get_mut(marker) {
            mark.listeners.push((event, action));
        }
    }

    fn clear_mark(&mut self, marker: MarkId) {
        if self.marks.remove(&marker).is_some() {
            self.history.push(MarkOp::Clear { id: marker });
        }
    }

    fn all_marks(&self) -> Vec<MarkId> {
        self.marks.keys().copied().collect()
    }
}
