//! Dump file reader: builds an in-memory index over keyframe/delta frame
//! envelopes and reconstructs any snapshot by binary-searching the index,
//! then replaying deltas forward from the nearest preceding keyframe (spec
//! §4.7). Frame payloads are decoded lazily by [`Frame`] itself - building
//! the index only touches each frame's envelope (type + timestamp).

use super::frame::{DumpHeader, Frame, FrameDecoder};
use crate::error::DumpError;
use crate::snapshot::delta::{apply_diff, SnapshotDelta};
use crate::snapshot::Snapshot;

/// What changed between a delta frame's base and the snapshot it produces.
/// `None` for keyframe entries, which have no prior base to describe a
/// change against.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaSummary {
    /// Absolute line indices touched by this delta (after applying `shift`).
    pub changed_lines: Vec<u64>,
    /// Leading lines dropped from the base snapshot.
    pub scrolled_lines: u64,
    pub cursor_moved: bool,
}

impl DeltaSummary {
    fn from_delta(delta: &SnapshotDelta) -> Self {
        Self {
            changed_lines: delta
                .lines
                .as_ref()
                .map(|entries| entries.iter().map(|(i, _)| *i).collect())
                .unwrap_or_default(),
            scrolled_lines: delta.shift.unwrap_or(0),
            cursor_moved: delta.cursor.is_some(),
        }
    }
}

/// `stats()`'s answer: frame counts and the timestamp span covered.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpStats {
    pub keyframes: usize,
    pub deltas: usize,
    pub duration: Option<DumpDuration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpDuration {
    pub start: i64,
    pub end: i64,
}

pub struct DumpReader {
    header: DumpHeader,
    /// Keyframe/delta frame envelopes, in file order. Never contains a
    /// `Frame::Header`.
    entries: Vec<Frame>,
}

impl DumpReader {
    pub fn open(bytes: &[u8]) -> Result<Self, DumpError> {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(bytes)?;
        let mut iter = frames.into_iter();
        let Some(header_frame @ Frame::Header { .. }) = iter.next() else {
            return Err(DumpError::MissingHeader);
        };
        let header = header_frame.as_header()?.clone();

        let mut entries = Vec::new();
        let mut seen_keyframe = false;
        for frame in iter {
            match &frame {
                Frame::Header { .. } => {
                    return Err(DumpError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "duplicate header frame",
                    )));
                }
                Frame::Keyframe { .. } => {
                    seen_keyframe = true;
                    entries.push(frame);
                }
                Frame::Delta { .. } => {
                    if !seen_keyframe {
                        return Err(DumpError::DeltaBeforeKeyframe);
                    }
                    entries.push(frame);
                }
            }
        }
        Ok(Self { header, entries })
    }

    #[must_use]
    pub fn header(&self) -> &DumpHeader {
        &self.header
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> DumpStats {
        let keyframes = self.entries.iter().filter(|e| matches!(e, Frame::Keyframe { .. })).count();
        let deltas = self.entries.len() - keyframes;
        let duration = match (self.entries.first(), self.entries.last()) {
            (Some(first), Some(last)) => {
                Some(DumpDuration { start: first.timestamp(), end: last.timestamp() })
            }
            _ => None,
        };
        DumpStats { keyframes, deltas, duration }
    }

    /// Every `(snapshot, delta_summary)` pair from `from` (inclusive)
    /// onward, or all of them if `from` is `None`. Replay starts at the
    /// nearest preceding keyframe and walks forward so later snapshots
    /// reconstruct correctly even when `from` lands mid-delta-chain.
    #[must_use]
    pub fn snapshots(&self, from: Option<i64>) -> Snapshots<'_> {
        let first_idx = match from {
            None => 0,
            Some(ts) => self.entries.partition_point(|e| e.timestamp() < ts),
        };
        let start = if self.entries.is_empty() || first_idx >= self.entries.len() {
            self.entries.len()
        } else {
            let mut k = first_idx;
            while !matches!(self.entries[k], Frame::Keyframe { .. }) {
                k -= 1;
            }
            k
        };
        Snapshots { reader: self, idx: start, first_idx, current: None }
    }

    /// The snapshot as of the latest entry at or before `timestamp`, or
    /// `None` if every entry postdates it.
    pub fn snapshot_nearest_to(&self, timestamp: i64) -> Result<Option<Snapshot>, DumpError> {
        let idx = self.entries.partition_point(|e| e.timestamp() <= timestamp);
        if idx == 0 {
            return Ok(None);
        }
        self.reconstruct(idx - 1).map(Some)
    }

    fn reconstruct(&self, i: usize) -> Result<Snapshot, DumpError> {
        let mut k = i;
        while !matches!(self.entries[k], Frame::Keyframe { .. }) {
            k -= 1;
        }
        let mut current = self.entries[k].as_keyframe()?.clone();
        for entry in &self.entries[k + 1..=i] {
            current = apply_diff(&current, entry.as_delta()?, entry.timestamp());
        }
        Ok(current)
    }
}

/// Lazy forward replay produced by [`DumpReader::snapshots`]. Each item
/// decodes (and caches) exactly the frame payload it needs.
pub struct Snapshots<'a> {
    reader: &'a DumpReader,
    idx: usize,
    first_idx: usize,
    current: Option<Snapshot>,
}

impl Iterator for Snapshots<'_> {
    type Item = Result<(Snapshot, Option<DeltaSummary>), DumpError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.idx >= self.reader.entries.len() {
                return None;
            }
            let frame = &self.reader.entries[self.idx];
            let (snapshot, summary) = match frame {
                Frame::Keyframe { .. } => match frame.as_keyframe() {
                    Ok(snap) => (snap.clone(), None),
                    Err(e) => return Some(Err(e)),
                },
                Frame::Delta { .. } => {
                    let base = self.current.as_ref().expect("delta always follows a base");
                    let delta = match frame.as_delta() {
                        Ok(d) => d,
                        Err(e) => return Some(Err(e)),
                    };
                    let snap = apply_diff(base, delta, frame.timestamp());
                    (snap, Some(DeltaSummary::from_delta(delta)))
                }
                Frame::Header { .. } => unreachable!("index never stores header frames"),
            };
            self.current = Some(snapshot.clone());
            let should_yield = self.idx >= self.first_idx;
            self.idx += 1;
            if should_yield {
                return Some(Ok((snapshot, summary)));
            }
        }
    }
}
