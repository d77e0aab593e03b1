//! Library error kinds (spec §7).
//!
//! Each enum implements `Display`/`Error` by hand, the same way this
//! codebase's `channel::ChannelError` does, rather than reaching for
//! `thiserror`: the variant sets are small and stable and call sites mostly
//! match on them directly. `anyhow::Result` is reserved for the CLI/record
//! engine boundary where errors are just surfaced to a human.

use std::fmt;

/// Malformed dump file: missing header, unknown frame tag at the structural
/// level, or a delta frame preceding any keyframe.
#[derive(Debug)]
pub enum DumpError {
    MissingHeader,
    DeltaBeforeKeyframe,
    Io(std::io::Error),
    Payload(serde_json::Error),
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "dump file does not start with a header frame"),
            Self::DeltaBeforeKeyframe => write!(f, "delta frame precedes any keyframe"),
            Self::Io(e) => write!(f, "dump I/O error: {e}"),
            Self::Payload(e) => write!(f, "dump payload decode error: {e}"),
        }
    }
}

impl std::error::Error for DumpError {}

impl From<std::io::Error> for DumpError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for DumpError {
    fn from(e: serde_json::Error) -> Self {
        Self::Payload(e)
    }
}

/// Errors surfaced by the external PTY collaborator (spec §6).
#[derive(Debug)]
pub enum PtyError {
    Spawn(String),
    Io(std::io::Error),
}

impl fmt::Display for PtyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(msg) => write!(f, "failed to spawn PTY child: {msg}"),
            Self::Io(e) => write!(f, "PTY I/O error: {e}"),
        }
    }
}

impl std::error::Error for PtyError {}

impl From<std::io::Error> for PtyError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors surfaced by the record engine's `wait` steps (spec §4.11/§7).
#[derive(Debug)]
pub enum RecordError {
    /// A `wait` step exceeded its deadline.
    Timeout { description: String, timeout_ms: u64 },
    Pty(PtyError),
    Dump(DumpError),
    /// Malformed record script (missing command, unparsable wait condition).
    InvalidScript(String),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { description, timeout_ms } => {
                write!(f, "wait for {description} timed out after {timeout_ms}ms")
            }
            Self::Pty(e) => write!(f, "{e}"),
            Self::Dump(e) => write!(f, "{e}"),
            Self::InvalidScript(msg) => write!(f, "invalid record script: {msg}"),
        }
    }
}

impl std::error::Error for RecordError {}

impl From<PtyError> for RecordError {
    fn from(e: PtyError) -> Self {
        Self::Pty(e)
    }
}

impl From<DumpError> for RecordError {
    fn from(e: DumpError) -> Self {
        Self::Dump(e)
    }
}

/// Errors surfaced while loading the scene/channel configuration surface
/// (spec §4.12/§7). File discovery and hot-reload are the host
/// application's concern; this only covers reading and parsing one file.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    UnknownExtension(String),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::UnknownExtension(ext) => {
                write!(f, "unrecognized config file extension: {ext}")
            }
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
