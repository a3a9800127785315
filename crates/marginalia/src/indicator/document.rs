//! The document capability the indicator engine renders into.
//!
//! A host editor implements [`Document`] over its own marker/decoration API.
//! Marker handles are plain values of the associated `Marker` type; the engine
//! is their only holder and gives them back through [`Document::clear_mark`],
//! after which the document may forget them.

use std::fmt::Debug;

use crate::position::{Position, Range};

/// Visual style of a marked range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkStyle {
    /// Background tint, used for live thread highlights.
    Highlight { color: String },
    /// Underline, used while a new thread is being composed.
    Underline { color: String },
    /// No visible decoration. Installed and released to reset a range.
    Inert,
}

impl MarkStyle {
    /// Inline CSS for hosts whose markers take a `css` option.
    pub fn css(&self) -> String {
        match self {
            MarkStyle::Highlight { color } => format!("background-color: {};", color),
            MarkStyle::Underline { color } => format!("border-bottom: 2px solid {};", color),
            MarkStyle::Inert => "background-color: transparent; border-bottom: 0;".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerEvent {
    /// The cursor is about to move into the marked range.
    BeforeCursorEnter,
}

/// What the host does when a marker event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnterAction {
    /// Ask the controller to focus the thread under the cursor
    /// (see [`SyncController::cursor_entered`](crate::controller::SyncController::cursor_entered)).
    FocusOwner,
    Ignore,
}

pub trait Document {
    type Marker: Clone + Eq + Debug;

    fn selection(&self) -> Range;

    fn cursor_position(&self) -> Position;

    /// Text of line `n`, or `None` past the end of the document.
    fn line(&self, n: u32) -> Option<String>;

    fn mark_text(&mut self, from: Position, to: Position, style: &MarkStyle) -> Self::Marker;

    /// Current extent of a marker, which moves with the text. `None` once the
    /// marker has been cleared or its range deleted.
    fn find_mark(&self, marker: &Self::Marker) -> Option<Range>;

    fn on_mark_event(&mut self, marker: &Self::Marker, event: MarkerEvent, action: EnterAction);

    /// Remove a marker. Clearing an unknown marker is a no-op.
    fn clear_mark(&mut self, marker: Self::Marker);

    /// Every marker in the document, including ones this crate did not create.
    fn all_marks(&self) -> Vec<Self::Marker>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_for_each_style() {
        let highlight = MarkStyle::Highlight {
            color: "yellow".into(),
        };
        assert_eq!(highlight.css(), "background-color: yellow;");

        let underline = MarkStyle::Underline {
            color: "orange".into(),
        };
        assert_eq!(underline.css(), "border-bottom: 2px solid orange;");

        assert!(MarkStyle::Inert.css().contains("transparent"));
    }
}
