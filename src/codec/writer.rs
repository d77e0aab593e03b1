//! Dump file writer: adaptive keyframe/delta policy (spec §4.6).
//!
//! A fresh keyframe is written whenever: this is the first snapshot,
//! tracking was lost (`compute_diff` returns `None`), the time since the
//! last keyframe exceeds `keyframe_interval_ms`, or the cumulative delta
//! bytes written since the last keyframe exceed `keyframe_size_ratio *
//! last_keyframe_size`. Otherwise a delta is written and the cumulative
//! counter grows by its encoded size.

use std::io::Write;

use super::frame::{DumpHeader, Frame};
use crate::error::DumpError;
use crate::snapshot::delta::compute_diff;
use crate::snapshot::Snapshot;

pub const DEFAULT_KEYFRAME_INTERVAL_MS: i64 = 5_000;
pub const DEFAULT_KEYFRAME_SIZE_RATIO: usize = 2;

pub struct DumpWriter<W: Write> {
    out: W,
    keyframe_interval_ms: i64,
    keyframe_size_ratio: usize,
    last_keyframe: Option<Snapshot>,
    last_keyframe_at: Option<i64>,
    /// Encoded byte size of the most recently written keyframe.
    last_keyframe_size: usize,
    /// Encoded bytes written down the delta path since that keyframe.
    cumulative_delta_bytes: usize,
}

impl<W: Write> DumpWriter<W> {
    pub fn new(mut out: W, header: DumpHeader) -> Result<Self, DumpError> {
        out.write_all(&Frame::header(header.started_at, header).encode_to_vec())?;
        Ok(Self {
            out,
            keyframe_interval_ms: DEFAULT_KEYFRAME_INTERVAL_MS,
            keyframe_size_ratio: DEFAULT_KEYFRAME_SIZE_RATIO,
            last_keyframe: None,
            last_keyframe_at: None,
            last_keyframe_size: 0,
            cumulative_delta_bytes: 0,
        })
    }

    #[must_use]
    pub fn with_policy(mut self, keyframe_interval_ms: i64, keyframe_size_ratio: usize) -> Self {
        self.keyframe_interval_ms = keyframe_interval_ms;
        self.keyframe_size_ratio = keyframe_size_ratio.max(1);
        self
    }

    pub fn write_snapshot(&mut self, snap: &Snapshot) -> Result<(), DumpError> {
        let delta = self.last_keyframe.as_ref().and_then(|kf| compute_diff(kf, snap));
        let stale = self
            .last_keyframe_at
            .is_some_and(|at| snap.timestamp.saturating_sub(at) >= self.keyframe_interval_ms);
        let oversized = self.cumulative_delta_bytes
            > self.keyframe_size_ratio.saturating_mul(self.last_keyframe_size);

        let write_keyframe = delta.is_none() || stale || oversized;

        if write_keyframe {
            let frame = Frame::keyframe(snap.timestamp, snap.clone());
            let bytes = frame.encode_to_vec();
            self.out.write_all(&bytes)?;
            self.last_keyframe = Some(snap.clone());
            self.last_keyframe_at = Some(snap.timestamp);
            self.last_keyframe_size = bytes.len();
            self.cumulative_delta_bytes = 0;
        } else {
            let d = delta.expect("delta path implies Some");
            let frame = Frame::delta(snap.timestamp, d);
            let bytes = frame.encode_to_vec();
            self.out.write_all(&bytes)?;
            self.cumulative_delta_bytes += bytes.len();
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), DumpError> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::snapshot::{Cursor, RichLine};

    fn snap(text: &str, ts: i64) -> Snapshot {
        Snapshot {
            lines: vec![RichLine::Plain(text.to_string())],
            cursor: Cursor { x: 0, y: 0, visible: true },
            cols: 80,
            rows: 24,
            alternate: false,
            lines_offset: Some(0),
            timestamp: ts,
        }
    }

    #[test]
    fn first_snapshot_is_always_a_keyframe() {
        let mut buf = Vec::new();
        let mut writer = DumpWriter::new(
            &mut buf,
            DumpHeader { cols: 80, rows: 24, scrollback_limit: 100, started_at: 0 },
        )
        .unwrap();
        writer.write_snapshot(&snap("a", 0)).unwrap();

        let mut decoder = super::super::frame::FrameDecoder::new();
        let frames = decoder.feed(&buf).unwrap();
        assert!(matches!(frames[1], Frame::Keyframe { .. }));
    }

    #[test]
    fn small_unchanged_follow_up_is_a_delta() {
        let mut buf = Vec::new();
        let mut writer = DumpWriter::new(
            &mut buf,
            DumpHeader { cols: 80, rows: 24, scrollback_limit: 100, started_at: 0 },
        )
        .unwrap();
        writer.write_snapshot(&snap("a", 0)).unwrap();
        writer.write_snapshot(&snap("a", 10)).unwrap();

        let mut decoder = super::super::frame::FrameDecoder::new();
        let frames = decoder.feed(&buf).unwrap();
        assert!(matches!(frames[2], Frame::Delta { .. }));
    }

    #[test]
    fn stale_keyframe_interval_forces_a_new_keyframe() {
        let mut buf = Vec::new();
        let mut writer = DumpWriter::new(
            &mut buf,
            DumpHeader { cols: 80, rows: 24, scrollback_limit: 100, started_at: 0 },
        )
        .unwrap()
        .with_policy(1_000, 2);
        writer.write_snapshot(&snap("a", 0)).unwrap();
        writer.write_snapshot(&snap("a", 5_000)).unwrap();

        let mut decoder = super::super::frame::FrameDecoder::new();
        let frames = decoder.feed(&buf).unwrap();
        assert!(matches!(frames[2], Frame::Keyframe { .. }));
    }

    #[test]
    fn cumulative_delta_bytes_past_ratio_forces_a_new_keyframe() {
        // The keyframe is minimal; the first delta is a complete rewrite to
        // a long line, so its encoded size alone dwarfs `last_keyframe_size`.
        // That delta is still written as a delta (the cumulative counter is
        // 0 going *into* it), but it pushes the counter past the ratio
        // threshold, so the *next* write - even though its own change is
        // tiny - must be promoted to a keyframe. Comparing only the current
        // delta's size against a freshly re-encoded keyframe (the old,
        // buggy policy) would miss this: that tiny third write's delta is
        // nowhere near keyframe-sized on its own.
        let mut buf = Vec::new();
        let mut writer = DumpWriter::new(
            &mut buf,
            DumpHeader { cols: 80, rows: 24, scrollback_limit: 100, started_at: 0 },
        )
        .unwrap()
        .with_policy(i64::MAX, 1);
        let long_line = "x".repeat(500);
        writer.write_snapshot(&snap("a", 0)).unwrap();
        writer.write_snapshot(&snap(&long_line, 10)).unwrap();
        writer.write_snapshot(&snap(&long_line, 20)).unwrap();

        let mut decoder = super::super::frame::FrameDecoder::new();
        let frames = decoder.feed(&buf).unwrap();
        assert!(matches!(frames[1], Frame::Keyframe { .. }));
        assert!(matches!(frames[2], Frame::Delta { .. }));
        assert!(matches!(frames[3], Frame::Keyframe { .. }));
    }
}
