//! A channel that persists every frame's snapshot to a dump file.

use std::io::Write;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Channel, ChannelError, Frame, SendFn};
use crate::codec::DumpWriter;

pub struct RecordingChannel<W: Write + Send> {
    writer: Mutex<DumpWriter<W>>,
}

impl<W: Write + Send> RecordingChannel<W> {
    #[must_use]
    pub fn new(writer: DumpWriter<W>) -> Self {
        Self { writer: Mutex::new(writer) }
    }
}

#[async_trait]
impl<W: Write + Send> Channel for RecordingChannel<W> {
    async fn start(&mut self, _send: SendFn) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn stop(&mut self) {
        if let Err(e) = self.writer.lock().await.flush() {
            log::warn!("failed to flush dump writer on stop: {e}");
        }
    }

    async fn receive(&self, frame: &Frame) -> Result<(), ChannelError> {
        self.writer
            .lock()
            .await
            .write_snapshot(&frame.snapshot)
            .map_err(|e| ChannelError::ReceiveFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DumpHeader;
    use crate::scene::SceneInput;
    use crate::snapshot::{Cursor, RichLine, Snapshot};

    #[tokio::test]
    async fn receive_appends_a_snapshot() {
        let buf: Vec<u8> = Vec::new();
        let writer = DumpWriter::new(
            buf,
            DumpHeader { cols: 80, rows: 24, scrollback_limit: 100, started_at: 0 },
        )
        .unwrap();
        let mut channel = RecordingChannel::new(writer);
        let send: SendFn = std::sync::Arc::new(|_input: SceneInput| {});
        channel.start(send).await.unwrap();

        let snap = Snapshot {
            lines: vec![RichLine::Plain("hi".into())],
            cursor: Cursor { x: 0, y: 0, visible: true },
            cols: 80,
            rows: 24,
            alternate: false,
            lines_offset: Some(0),
            timestamp: 0,
        };
        channel.receive(&Frame { snapshot: snap, events: Vec::new() }).await.unwrap();
        channel.stop().await;
    }
}
