//! The channel contract (spec §6): an external output sink receiving
//! `{snapshot, events}` frames and optionally pushing structured input back
//! in. Modeled as an `async_trait`, the same shape this codebase's own
//! `Channel` trait takes, with `ChannelError` hand-rolled rather than
//! derived with `thiserror` for the same reason as [`crate::error`].

pub mod logging;
pub mod recording;

use std::sync::Arc;

use async_trait::async_trait;

use crate::scene::{SceneEvent, SceneInput};
use crate::snapshot::Snapshot;

pub use logging::LoggingChannel;
pub use recording::RecordingChannel;

/// Callback a channel uses to push structured input back into the system
/// (spec §4.10's `send(input)`).
pub type SendFn = Arc<dyn Fn(SceneInput) + Send + Sync>;

/// One broadcast unit: a snapshot plus whatever events the composite scene
/// produced for it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub snapshot: Snapshot,
    pub events: Vec<SceneEvent>,
}

#[derive(Debug)]
pub enum ChannelError {
    StartFailed(String),
    ReceiveFailed(String),
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartFailed(msg) => write!(f, "channel failed to start: {msg}"),
            Self::ReceiveFailed(msg) => write!(f, "channel failed to receive a frame: {msg}"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// An output sink. Implementors must treat `receive` as best-effort: the
/// Gateway logs and continues on a `ReceiveFailed`/dropped frame rather
/// than letting one channel's failure stall the others (spec §7,
/// `CallbackFailure`).
#[async_trait]
pub trait Channel: Send + Sync {
    /// Called once when the channel is wired in. `send` lets the channel
    /// push structured input back into the system at any later point.
    async fn start(&mut self, send: SendFn) -> Result<(), ChannelError>;

    /// Must be idempotent - `replace_channels` may call it on a channel
    /// that never started successfully.
    async fn stop(&mut self);

    async fn receive(&self, frame: &Frame) -> Result<(), ChannelError>;
}
