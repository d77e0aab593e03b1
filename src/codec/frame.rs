//! Wire format for `.dump` files (spec §4.5).
//!
//! ```text
//! [1-byte type] [8-byte BE f64 timestamp] [4-byte BE u32 length] [payload: length bytes, JSON]
//! ```
//!
//! The envelope (type + timestamp + length) is the eager part of decoding;
//! every frame's payload is decoded lazily and cached on first access (spec
//! §9: "do not eagerly decode entire dumps"). This is why every variant
//! below carries its payload as raw [`Bytes`] plus a [`OnceLock`] rather than
//! an already-decoded value.
//!
//! The envelope shape is modeled on this codebase's own `socket/framing.rs`
//! (length-prefixed, type-tagged, incrementally reassembled), adapted to the
//! spec's fixed 13-byte header (type + timestamp + length) instead of
//! `socket/framing.rs`'s `[u32 length][u8 type]` IPC framing, since a dump
//! file's frames must each carry their own timestamp (spec §3).
//!
//! Frame types:
//! - `0x01`: header - written exactly once, first
//! - `0x02`: keyframe - a complete `Snapshot` (payload omits `timestamp`;
//!   it lives in the envelope - spec §3 "keyframe { snapshot without timestamp }")
//! - `0x03`: delta - a `SnapshotDelta` (payload omits `timestamp` for the
//!   same reason - spec §3 "delta { SnapshotDelta }")

use std::sync::OnceLock;

use bytes::Bytes;

use crate::error::DumpError;
use crate::snapshot::delta::SnapshotDelta;
use crate::snapshot::{Cursor, RichLine, Snapshot};

const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;
const ENVELOPE_LEN: usize = 1 + 8 + 4;

pub mod frame_type {
    pub const HEADER: u8 = 0x01;
    pub const KEYFRAME: u8 = 0x02;
    pub const DELTA: u8 = 0x03;
}

/// Written once at the start of a dump file; carries the static terminal
/// configuration the replayed snapshots share.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DumpHeader {
    pub cols: u16,
    pub rows: u16,
    pub scrollback_limit: u64,
    /// Milliseconds since epoch when recording began.
    pub started_at: i64,
}

/// Shape of a `Snapshot` as it sits on disk - `timestamp` is excluded since
/// it's carried by the envelope instead (spec §3).
#[derive(serde::Serialize, serde::Deserialize)]
struct SnapshotWire {
    lines: Vec<RichLine>,
    cursor: Cursor,
    cols: u16,
    rows: u16,
    alternate: bool,
    lines_offset: Option<u64>,
}

impl From<&Snapshot> for SnapshotWire {
    fn from(s: &Snapshot) -> Self {
        Self {
            lines: s.lines.clone(),
            cursor: s.cursor,
            cols: s.cols,
            rows: s.rows,
            alternate: s.alternate,
            lines_offset: s.lines_offset,
        }
    }
}

impl SnapshotWire {
    fn into_snapshot(self, timestamp: i64) -> Snapshot {
        Snapshot {
            lines: self.lines,
            cursor: self.cursor,
            cols: self.cols,
            rows: self.rows,
            alternate: self.alternate,
            lines_offset: self.lines_offset,
            timestamp,
        }
    }
}

/// A decoded frame envelope, with its payload decoded lazily and cached on
/// first access via the `header()`/`keyframe()`/`delta()` accessors below.
pub enum Frame {
    Header { timestamp: i64, payload: Bytes, cache: OnceLock<DumpHeader> },
    Keyframe { timestamp: i64, payload: Bytes, cache: OnceLock<Snapshot> },
    Delta { timestamp: i64, payload: Bytes, cache: OnceLock<SnapshotDelta> },
}

impl Frame {
    #[must_use]
    pub fn header(timestamp: i64, header: DumpHeader) -> Self {
        let payload = Bytes::from(serde_json::to_vec(&header).expect("header encodes"));
        let cache = OnceLock::new();
        let _ = cache.set(header);
        Self::Header { timestamp, payload, cache }
    }

    #[must_use]
    pub fn keyframe(timestamp: i64, snapshot: Snapshot) -> Self {
        let payload = Bytes::from(
            serde_json::to_vec(&SnapshotWire::from(&snapshot)).expect("snapshot encodes"),
        );
        let cache = OnceLock::new();
        let _ = cache.set(snapshot);
        Self::Keyframe { timestamp, payload, cache }
    }

    #[must_use]
    pub fn delta(timestamp: i64, delta: SnapshotDelta) -> Self {
        let payload = Bytes::from(serde_json::to_vec(&delta).expect("delta encodes"));
        let cache = OnceLock::new();
        let _ = cache.set(delta);
        Self::Delta { timestamp, payload, cache }
    }

    #[must_use]
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Header { timestamp, .. }
            | Self::Keyframe { timestamp, .. }
            | Self::Delta { timestamp, .. } => *timestamp,
        }
    }

    /// Decode (and cache) the header payload. Fails, without poisoning the
    /// cache, if called on a non-header frame or on malformed JSON.
    pub fn as_header(&self) -> Result<&DumpHeader, DumpError> {
        let Self::Header { payload, cache, .. } = self else {
            return Err(DumpError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "not a header frame",
            )));
        };
        decode_cached(cache, payload)
    }

    /// Decode (and cache) the keyframe payload, stamping it with this
    /// frame's envelope timestamp.
    pub fn as_keyframe(&self) -> Result<&Snapshot, DumpError> {
        let Self::Keyframe { payload, cache, timestamp } = self else {
            return Err(DumpError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "not a keyframe frame",
            )));
        };
        if cache.get().is_none() {
            let wire: SnapshotWire = serde_json::from_slice(payload)?;
            let _ = cache.set(wire.into_snapshot(*timestamp));
        }
        Ok(cache.get().expect("just populated"))
    }

    /// Decode (and cache) the delta payload.
    pub fn as_delta(&self) -> Result<&SnapshotDelta, DumpError> {
        let Self::Delta { payload, cache, .. } = self else {
            return Err(DumpError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "not a delta frame",
            )));
        };
        decode_cached(cache, payload)
    }

    fn encode(&self) -> Vec<u8> {
        let (tag, payload): (u8, &Bytes) = match self {
            Self::Header { payload, .. } => (frame_type::HEADER, payload),
            Self::Keyframe { payload, .. } => (frame_type::KEYFRAME, payload),
            Self::Delta { payload, .. } => (frame_type::DELTA, payload),
        };
        let mut buf = Vec::with_capacity(ENVELOPE_LEN + payload.len());
        buf.push(tag);
        buf.extend_from_slice(&(self.timestamp() as f64).to_be_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[must_use]
    pub fn encode_to_vec(&self) -> Vec<u8> {
        self.encode()
    }
}

fn decode_cached<'a, T: serde::de::DeserializeOwned>(
    cache: &'a OnceLock<T>,
    payload: &Bytes,
) -> Result<&'a T, DumpError> {
    if cache.get().is_none() {
        let value: T = serde_json::from_slice(payload)?;
        let _ = cache.set(value);
    }
    Ok(cache.get().expect("just populated"))
}

impl Clone for Frame {
    fn clone(&self) -> Self {
        match self {
            Self::Header { timestamp, payload, cache } => Self::Header {
                timestamp: *timestamp,
                payload: payload.clone(),
                cache: clone_cache(cache),
            },
            Self::Keyframe { timestamp, payload, cache } => Self::Keyframe {
                timestamp: *timestamp,
                payload: payload.clone(),
                cache: clone_cache(cache),
            },
            Self::Delta { timestamp, payload, cache } => Self::Delta {
                timestamp: *timestamp,
                payload: payload.clone(),
                cache: clone_cache(cache),
            },
        }
    }
}

fn clone_cache<T: Clone>(cache: &OnceLock<T>) -> OnceLock<T> {
    let fresh = OnceLock::new();
    if let Some(v) = cache.get() {
        let _ = fresh.set(v.clone());
    }
    fresh
}

impl PartialEq for Frame {
    /// Compares envelopes, not decode caches - two frames built from the
    /// same bytes are equal regardless of whether either has been decoded
    /// yet.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Header { timestamp: t1, payload: p1, .. },
                Self::Header { timestamp: t2, payload: p2, .. },
            ) => t1 == t2 && p1 == p2,
            (
                Self::Keyframe { timestamp: t1, payload: p1, .. },
                Self::Keyframe { timestamp: t2, payload: p2, .. },
            ) => t1 == t2 && p1 == p2,
            (
                Self::Delta { timestamp: t1, payload: p1, .. },
                Self::Delta { timestamp: t2, payload: p2, .. },
            ) => t1 == t2 && p1 == p2,
            _ => false,
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Header { timestamp, .. } => {
                f.debug_struct("Frame::Header").field("timestamp", timestamp).finish()
            }
            Self::Keyframe { timestamp, .. } => {
                f.debug_struct("Frame::Keyframe").field("timestamp", timestamp).finish()
            }
            Self::Delta { timestamp, .. } => {
                f.debug_struct("Frame::Delta").field("timestamp", timestamp).finish()
            }
        }
    }
}

/// `None` for an unknown frame type tag - per spec, those are skipped
/// rather than treated as a fatal error (a forward-compatibility hook for
/// future frame kinds an older reader shouldn't choke on).
fn decode_envelope(tag: u8, timestamp: i64, payload: Bytes) -> Option<Frame> {
    match tag {
        frame_type::HEADER => Some(Frame::Header { timestamp, payload, cache: OnceLock::new() }),
        frame_type::KEYFRAME => {
            Some(Frame::Keyframe { timestamp, payload, cache: OnceLock::new() })
        }
        frame_type::DELTA => Some(Frame::Delta { timestamp, payload, cache: OnceLock::new() }),
        _unknown => None,
    }
}

/// Incremental frame decoder - feed raw bytes, extract complete frame
/// envelopes. Payload decoding happens later, lazily, via the frame's own
/// accessors.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Frame>, DumpError> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();
        loop {
            if self.buf.len() < ENVELOPE_LEN {
                break;
            }
            let tag = self.buf[0];
            let timestamp = f64::from_be_bytes(self.buf[1..9].try_into().unwrap()) as i64;
            let length = u32::from_be_bytes(self.buf[9..13].try_into().unwrap());
            if length > MAX_FRAME_SIZE {
                return Err(DumpError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("invalid dump frame length {length}"),
                )));
            }
            let total = ENVELOPE_LEN + length as usize;
            if self.buf.len() < total {
                break;
            }
            let payload = Bytes::copy_from_slice(&self.buf[ENVELOPE_LEN..total]);
            if let Some(frame) = decode_envelope(tag, timestamp, payload) {
                frames.push(frame);
            }
            self.buf.drain(..total);
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Cursor;

    fn sample_snapshot() -> Snapshot {
        Snapshot {
            lines: vec![crate::snapshot::RichLine::Plain("hi".into())],
            cursor: Cursor { x: 0, y: 0, visible: true },
            cols: 80,
            rows: 24,
            alternate: false,
            lines_offset: Some(0),
            timestamp: 5,
        }
    }

    #[test]
    fn header_round_trips() {
        let frame = Frame::header(
            0,
            DumpHeader { cols: 80, rows: 24, scrollback_limit: 1000, started_at: 0 },
        );
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&frame.encode_to_vec()).unwrap();
        assert_eq!(frames, vec![frame]);
        assert_eq!(frames[0].as_header().unwrap().cols, 80);
    }

    #[test]
    fn keyframe_round_trips() {
        let frame = Frame::keyframe(5, sample_snapshot());
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&frame.encode_to_vec()).unwrap();
        assert_eq!(frames, vec![frame]);
        assert_eq!(frames[0].as_keyframe().unwrap(), &sample_snapshot());
    }

    #[test]
    fn keyframe_payload_omits_timestamp_field() {
        let frame = Frame::keyframe(1234, sample_snapshot());
        let encoded = frame.encode_to_vec();
        let payload = &encoded[ENVELOPE_LEN..];
        let value: serde_json::Value = serde_json::from_slice(payload).unwrap();
        assert!(value.get("timestamp").is_none());
    }

    #[test]
    fn unknown_type_is_skipped_not_fatal() {
        let payload = b"x";
        let mut buf = Vec::new();
        buf.push(0xaa);
        buf.extend_from_slice(&0.0f64.to_be_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(payload);
        buf.extend_from_slice(
            &Frame::header(
                0,
                DumpHeader { cols: 80, rows: 24, scrollback_limit: 100, started_at: 0 },
            )
            .encode_to_vec(),
        );

        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&buf).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], Frame::Header { .. }));
    }

    #[test]
    fn byte_at_a_time_reassembly() {
        let frame = Frame::keyframe(5, sample_snapshot());
        let encoded = frame.encode_to_vec();
        let mut decoder = FrameDecoder::new();
        for (i, byte) in encoded.iter().enumerate() {
            let frames = decoder.feed(&[*byte]).unwrap();
            if i < encoded.len() - 1 {
                assert!(frames.is_empty());
            } else {
                assert_eq!(frames, vec![frame.clone()]);
            }
        }
    }
}
