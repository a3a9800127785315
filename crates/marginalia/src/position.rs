//! # Positions, Ranges and Indicators
//!
//! A [`Position`] is a `(line, column)` pair, both zero-based. A [`Range`] is two
//! positions, and an [`AnchorRange`] is a range plus the text snippet it covered
//! when it was recorded.
//!
//! [`Indicator`] is the persisted anchor of a thread. It is a tagged union with an
//! explicit `kind` discriminant:
//!
//! | `kind` | Shape | Rendered by the indicator engine |
//! |--------|-------|----------------------------------|
//! | `text` | `initial` + `current` anchor ranges | yes |
//! | `notebook-cell` | cell `index` + `type` (`input`/`output`) | no, passed through |
//! | `notebook-text` | `initial` + `current` anchor ranges | no, passed through |
//!
//! `initial` is fixed when the thread is created. `current` is what gets rendered
//! and is refreshed by the caller ([`Indicator::with_current`]); nothing in this
//! crate rebases it on text edits.
//!
//! ## Legacy Shapes
//!
//! Stores written before the discriminant existed carry untagged indicators.
//! Deserialization accepts them:
//! - `{initial, current}` → `text`
//! - `{index, type}` → `notebook-cell`
//! - `{start, end[, context]}` → `text` with `initial == current`

use serde::{Deserialize, Deserializer, Serialize};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Canonicalizes a range regardless of selection direction.
    ///
    /// Lines and columns are ordered independently: the start takes the smaller
    /// line and the smaller column, the end takes the larger of each.
    pub fn normalized(&self) -> Range {
        Range {
            start: Position {
                line: self.start.line.min(self.end.line),
                column: self.start.column.min(self.end.column),
            },
            end: Position {
                line: self.start.line.max(self.end.line),
                column: self.start.column.max(self.end.column),
            },
        }
    }

    /// Inclusive containment, tested on each axis independently.
    ///
    /// This is not a linear-offset test: a position on a middle line of a
    /// multi-line range is only inside if its column also falls between the
    /// start and end columns.
    pub fn contains(&self, position: Position) -> bool {
        position.line >= self.start.line
            && position.line <= self.end.line
            && position.column >= self.start.column
            && position.column <= self.end.column
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRange {
    pub start: Position,
    pub end: Position,
    /// Text the range covered when it was recorded.
    #[serde(default)]
    pub context: String,
}

impl AnchorRange {
    pub fn new(range: Range, context: impl Into<String>) -> Self {
        Self {
            start: range.start,
            end: range.end,
            context: context.into(),
        }
    }

    pub fn range(&self) -> Range {
        Range::new(self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Indicator {
    Text {
        initial: AnchorRange,
        current: AnchorRange,
    },
    NotebookCell {
        index: String,
        #[serde(rename = "type")]
        cell: CellKind,
    },
    NotebookText {
        initial: AnchorRange,
        current: AnchorRange,
    },
}

impl Indicator {
    /// A fresh text indicator; `initial` and `current` start out identical.
    pub fn text(range: Range, context: impl Into<String>) -> Self {
        let anchor = AnchorRange::new(range, context);
        Indicator::Text {
            initial: anchor.clone(),
            current: anchor,
        }
    }

    /// The range to render, for text indicators only.
    pub fn text_range(&self) -> Option<Range> {
        match self {
            Indicator::Text { current, .. } => Some(current.range()),
            Indicator::NotebookCell { .. } | Indicator::NotebookText { .. } => None,
        }
    }

    /// Returns a copy with `current` moved to `range`. `initial` is preserved.
    /// When `context` is `None` the previous snippet is kept.
    /// Notebook cell indicators carry no range and are returned unchanged.
    pub fn with_current(&self, range: Range, context: Option<String>) -> Indicator {
        let refresh = |current: &AnchorRange| AnchorRange {
            start: range.start,
            end: range.end,
            context: context.clone().unwrap_or_else(|| current.context.clone()),
        };
        match self {
            Indicator::Text { initial, current } => Indicator::Text {
                initial: initial.clone(),
                current: refresh(current),
            },
            Indicator::NotebookText { initial, current } => Indicator::NotebookText {
                initial: initial.clone(),
                current: refresh(current),
            },
            Indicator::NotebookCell { .. } => self.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
enum IndicatorKind {
    Text,
    NotebookCell,
    NotebookText,
}

// Accepts both the tagged form and the untagged legacy shapes.
impl<'de> Deserialize<'de> for Indicator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let helper = IndicatorHelper::deserialize(deserializer)?;

        let is_cell = match helper.kind {
            Some(IndicatorKind::NotebookCell) => true,
            Some(_) => false,
            None => helper.index.is_some() && helper.initial.is_none(),
        };

        if is_cell {
            let index = match helper.index {
                Some(serde_json::Value::String(s)) => s,
                Some(serde_json::Value::Number(n)) => n.to_string(),
                _ => return Err(D::Error::custom("notebook cell indicator needs an index")),
            };
            let cell = helper
                .cell
                .ok_or_else(|| D::Error::custom("notebook cell indicator needs a type"))?;
            return Ok(Indicator::NotebookCell { index, cell });
        }

        let notebook_text = matches!(helper.kind, Some(IndicatorKind::NotebookText));
        let (initial, current) = helper
            .anchor_pair()
            .ok_or_else(|| D::Error::custom("unrecognized indicator shape"))?;

        if notebook_text {
            Ok(Indicator::NotebookText { initial, current })
        } else {
            Ok(Indicator::Text { initial, current })
        }
    }
}

#[derive(Deserialize)]
struct IndicatorHelper {
    #[serde(default)]
    kind: Option<IndicatorKind>,
    #[serde(default)]
    initial: Option<AnchorRange>,
    #[serde(default)]
    current: Option<AnchorRange>,
    #[serde(default)]
    index: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    cell: Option<CellKind>,
    #[serde(default)]
    start: Option<Position>,
    #[serde(default)]
    end: Option<Position>,
    #[serde(default)]
    context: Option<String>,
}

impl IndicatorHelper {
    fn anchor_pair(self) -> Option<(AnchorRange, AnchorRange)> {
        match (self.initial, self.current) {
            (Some(initial), Some(current)) => Some((initial, current)),
            (Some(only), None) | (None, Some(only)) => Some((only.clone(), only)),
            (None, None) => {
                let anchor = AnchorRange {
                    start: self.start?,
                    end: self.end?,
                    context: self.context.unwrap_or_default(),
                };
                Some((anchor.clone(), anchor))
            }
        }
    }
}
