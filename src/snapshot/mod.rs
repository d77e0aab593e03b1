//! The snapshot data model: rich text lines, cursor, and the point-in-time
//! capture of a terminal screen plus scrollback addressing.
//!
//! See [`delta`] for the diff/patch codec built on top of [`Snapshot`].

pub mod delta;

use serde::{Deserialize, Serialize};

/// A palette color: either an indexed palette entry (0-255) or an explicit
/// RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Color {
    /// Palette index.
    Indexed(u8),
    /// Explicit RGB.
    Rgb(u8, u8, u8),
}

/// SGR-style attributes carried by a styled run of text.
///
/// `overline` is modeled for forward compatibility but is always `false`
/// with the current `alacritty_terminal`-backed emulator (see
/// `terminal::emulator`), which has no flag for it. `dim` and
/// `strikethrough` are tracked and can be `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attrs {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub inverse: bool,
    pub overline: bool,
}

impl Attrs {
    /// True if every field is at its default (no styling at all).
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Attrs::default()
    }
}

/// One run of text within a styled line.
///
/// A `Plain` segment carries no attributes at all (distinct from `Styled`
/// with default attrs only in that `Plain` never round-trips through a
/// `Styled { attrs: Attrs::default() }` comparison as equal - the two are
/// different enum variants and therefore structurally distinct, by design).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    Plain(String),
    Styled { text: String, attrs: Attrs },
}

impl Segment {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Segment::Plain(s) => s,
            Segment::Styled { text, .. } => text,
        }
    }
}

/// A rich-text line: either the plain-string fast path, or an ordered list
/// of styled segments.
///
/// The plain-string shorthand is structurally distinct from a one-element
/// segment array carrying the same text: `RichLine::Plain("x".into())` must
/// never equal `RichLine::Segments(vec![Segment::Plain("x".into())])`. Since
/// these are different enum variants, `#[derive(PartialEq)]` gives us this
/// for free - do not collapse the representation in a custom `PartialEq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RichLine {
    Plain(String),
    Segments(Vec<Segment>),
}

impl RichLine {
    #[must_use]
    pub fn empty() -> Self {
        RichLine::Plain(String::new())
    }

    /// Plain-text content, discarding styling.
    #[must_use]
    pub fn plain_text(&self) -> String {
        match self {
            RichLine::Plain(s) => s.clone(),
            RichLine::Segments(segs) => segs.iter().map(Segment::text).collect(),
        }
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.plain_text().trim_end().is_empty()
    }
}

/// Cursor position and visibility.
///
/// `x` is 0-based column. `y` is measured from the *end* of `lines`: `0` is
/// the last line, `1` the second-to-last, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub x: u32,
    pub y: u32,
    pub visible: bool,
}

impl Cursor {
    #[must_use]
    pub fn hidden() -> Self {
        Cursor { x: 0, y: 0, visible: false }
    }
}

/// A point-in-time capture of screen plus cursor plus scrollback
/// addressing.
///
/// See spec §3 for the full invariant list. `timestamp` is excluded from
/// equality comparisons - use [`Snapshot::equal_ignoring_timestamp`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Oldest (scrollback) to newest. Trailing blanks are stripped except
    /// up through a visible cursor line.
    pub lines: Vec<RichLine>,
    pub cursor: Cursor,
    pub cols: u16,
    pub rows: u16,
    /// Whether the alternate screen buffer is active.
    pub alternate: bool,
    /// Absolute index of `lines[0]` in the virtual line buffer. `None`
    /// means tracking was lost this snapshot: positions are internally
    /// meaningful but must not be compared against earlier snapshots.
    pub lines_offset: Option<u64>,
    /// Milliseconds since epoch at capture.
    pub timestamp: i64,
}

impl Snapshot {
    /// Structural equality ignoring `timestamp`, per spec §3/§8.
    #[must_use]
    pub fn equal_ignoring_timestamp(&self, other: &Snapshot) -> bool {
        self.lines == other.lines
            && self.cursor == other.cursor
            && self.cols == other.cols
            && self.rows == other.rows
            && self.alternate == other.alternate
            && self.lines_offset == other.lines_offset
    }

    /// Absolute index (within this snapshot's own addressing - `lines_offset`
    /// treated as 0 if `None`) of the line the cursor sits on, if visible.
    #[must_use]
    pub fn cursor_line_index(&self) -> Option<u64> {
        if !self.cursor.visible || self.lines.is_empty() {
            return None;
        }
        let local = (self.lines.len() as u64)
            .checked_sub(1)?
            .checked_sub(u64::from(self.cursor.y))?;
        Some(self.lines_offset.unwrap_or(0) + local)
    }

    /// The absolute index one past the last line (`lines_offset + lines.len()`).
    #[must_use]
    pub fn end(&self) -> u64 {
        self.lines_offset.unwrap_or(0) + self.lines.len() as u64
    }

    /// Lines in `[start, end)` absolute coordinates, clamped to what this
    /// snapshot actually retains. Used by scenes to collect message/block
    /// content (spec §4.9's `collect_lines`).
    #[must_use]
    pub fn collect_lines(&self, start: u64, end: u64) -> Vec<RichLine> {
        let base = self.lines_offset.unwrap_or(0);
        let lo = start.saturating_sub(base).min(self.lines.len() as u64) as usize;
        let hi = end.saturating_sub(base).min(self.lines.len() as u64) as usize;
        if lo >= hi {
            return Vec::new();
        }
        self.lines[lo..hi].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_line_unequal_to_single_segment_array() {
        let plain = RichLine::Plain("x".to_string());
        let segs = RichLine::Segments(vec![Segment::Plain("x".to_string())]);
        assert_ne!(plain, segs);
    }

    #[test]
    fn equality_ignores_timestamp() {
        let base = Snapshot {
            lines: vec![RichLine::Plain("hi".into())],
            cursor: Cursor { x: 0, y: 0, visible: true },
            cols: 80,
            rows: 24,
            alternate: false,
            lines_offset: Some(0),
            timestamp: 1,
        };
        let mut other = base.clone();
        other.timestamp = 999;
        assert!(base.equal_ignoring_timestamp(&other));
    }

    #[test]
    fn cursor_line_index_respects_end_addressing() {
        let snap = Snapshot {
            lines: vec![
                RichLine::Plain("a".into()),
                RichLine::Plain("b".into()),
                RichLine::Plain("c".into()),
            ],
            cursor: Cursor { x: 0, y: 1, visible: true },
            cols: 80,
            rows: 24,
            alternate: false,
            lines_offset: Some(10),
            timestamp: 0,
        };
        // y=1 -> second-to-last line -> local index 1 -> absolute 10+1=11
        assert_eq!(snap.cursor_line_index(), Some(11));
    }

    #[test]
    fn collect_lines_clamps_to_retained_range() {
        let snap = Snapshot {
            lines: vec![RichLine::Plain("a".into()), RichLine::Plain("b".into())],
            cursor: Cursor::hidden(),
            cols: 80,
            rows: 24,
            alternate: false,
            lines_offset: Some(5),
            timestamp: 0,
        };
        assert_eq!(snap.collect_lines(0, 100).len(), 2);
        assert_eq!(snap.collect_lines(5, 6), vec![RichLine::Plain("a".into())]);
    }
}
