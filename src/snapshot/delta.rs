//! Snapshot-to-snapshot delta codec (spec §4.4).
//!
//! [`compute_diff`] expresses the transition `prev -> curr` compactly;
//! [`apply_diff`] reconstructs `curr` from `prev` plus the delta. The two
//! are inverses whenever `compute_diff` returns `Some`.

use serde::{Deserialize, Serialize};

use super::{Cursor, RichLine, Snapshot};

/// A compact description of the transition from one snapshot to the next.
/// Every field is optional; absence means "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDelta {
    /// Non-negative number of leading lines dropped.
    pub shift: Option<u64>,
    /// Sparse `(index, content)` pairs, indices after applying `shift`.
    /// `content = None` truncates `lines` at that index and discards the
    /// rest; only the first such entry is meaningful.
    pub lines: Option<Vec<(u64, Option<RichLine>)>>,
    pub cursor: Option<Cursor>,
    pub cols: Option<u16>,
    pub rows: Option<u16>,
    pub alternate: Option<bool>,
}

impl SnapshotDelta {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shift.is_none()
            && self.lines.is_none()
            && self.cursor.is_none()
            && self.cols.is_none()
            && self.rows.is_none()
            && self.alternate.is_none()
    }
}

/// Compute the delta from `prev` to `curr`, or `None` if a keyframe is
/// required (tracking was lost, or the shift would be negative).
#[must_use]
pub fn compute_diff(prev: &Snapshot, curr: &Snapshot) -> Option<SnapshotDelta> {
    let curr_offset = curr.lines_offset?;
    let prev_offset = prev.lines_offset.unwrap_or(0);
    if curr_offset < prev_offset {
        return None;
    }
    let shift = curr_offset - prev_offset;
    let shift_usize = usize::try_from(shift).unwrap_or(usize::MAX);

    let shifted_prev: &[RichLine] = if shift_usize >= prev.lines.len() {
        &[]
    } else {
        &prev.lines[shift_usize..]
    };

    let mut lines = Vec::new();
    for (i, curr_line) in curr.lines.iter().enumerate() {
        let differs = match shifted_prev.get(i) {
            Some(prev_line) => prev_line != curr_line,
            None => true,
        };
        if differs {
            lines.push((i as u64, Some(curr_line.clone())));
        }
    }
    if curr.lines.len() < shifted_prev.len() {
        lines.push((curr.lines.len() as u64, None));
    }

    let mut delta = SnapshotDelta {
        shift: if shift != 0 { Some(shift) } else { None },
        lines: if lines.is_empty() { None } else { Some(lines) },
        cursor: (prev.cursor != curr.cursor).then_some(curr.cursor),
        cols: (prev.cols != curr.cols).then_some(curr.cols),
        rows: (prev.rows != curr.rows).then_some(curr.rows),
        alternate: (prev.alternate != curr.alternate).then_some(curr.alternate),
    };
    if delta.is_empty() {
        // Still a valid (empty) delta - the shift-by-zero, nothing-changed case.
        delta.shift = None;
    }
    Some(delta)
}

/// Reconstruct the snapshot that `compute_diff(base, _)` produced `delta`
/// for, stamping it with `timestamp`.
#[must_use]
pub fn apply_diff(base: &Snapshot, delta: &SnapshotDelta, timestamp: i64) -> Snapshot {
    let shift = delta.shift.unwrap_or(0);
    let shift_usize = usize::try_from(shift).unwrap_or(usize::MAX);
    let mut lines: Vec<RichLine> = if shift_usize >= base.lines.len() {
        Vec::new()
    } else {
        base.lines[shift_usize..].to_vec()
    };

    if let Some(entries) = &delta.lines {
        for (index, content) in entries {
            let index = usize::try_from(*index).unwrap_or(usize::MAX);
            match content {
                None => {
                    lines.truncate(index);
                    break;
                }
                Some(line) => {
                    while lines.len() <= index {
                        lines.push(RichLine::empty());
                    }
                    lines[index] = line.clone();
                }
            }
        }
    }

    Snapshot {
        lines,
        cursor: delta.cursor.unwrap_or(base.cursor),
        cols: delta.cols.unwrap_or(base.cols),
        rows: delta.rows.unwrap_or(base.rows),
        alternate: delta.alternate.unwrap_or(base.alternate),
        lines_offset: Some(base.lines_offset.unwrap_or(0) + shift),
        timestamp,
    }
}
