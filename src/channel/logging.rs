//! A trivial channel that logs every event at info level. Useful as a
//! smoke-test sink and as a template for writing a real one.

use async_trait::async_trait;

use super::{Channel, ChannelError, Frame, SendFn};

#[derive(Default)]
pub struct LoggingChannel;

#[async_trait]
impl Channel for LoggingChannel {
    async fn start(&mut self, _send: SendFn) -> Result<(), ChannelError> {
        log::info!("logging channel started");
        Ok(())
    }

    async fn stop(&mut self) {
        log::info!("logging channel stopped");
    }

    async fn receive(&self, frame: &Frame) -> Result<(), ChannelError> {
        for event in &frame.events {
            log::info!("scene event: {event:?}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{SceneEvent, SceneInput};
    use crate::snapshot::{Cursor, RichLine, Snapshot};

    #[tokio::test]
    async fn receive_does_not_fail_on_empty_events() {
        let mut channel = LoggingChannel;
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
        let frame = Frame {
            snapshot: snap,
            events: vec![SceneEvent::InputChanged { active: true, text: String::new() }],
        };
        channel.receive(&frame).await.unwrap();
        channel.stop().await;
    }
}
