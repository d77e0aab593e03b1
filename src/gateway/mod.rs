//! Gateway (spec §4.10): wires the composite scene and the channel set
//! together, derives `scene_state_changed` across snapshots, and routes
//! channel-originated input back to the PTY.

use crate::channel::{Channel, ChannelError, Frame, SendFn};
use crate::scene::composite::CompositeScene;
use crate::scene::{Scene, SceneEvent, SceneInput};
use crate::snapshot::Snapshot;

pub struct Gateway {
    composite: Option<CompositeScene>,
    channels: Vec<Box<dyn Channel>>,
    last_snapshot: Option<Snapshot>,
    pty_write: Box<dyn Fn(&[u8]) + Send + Sync>,
}

impl Gateway {
    #[must_use]
    pub fn new(pty_write: Box<dyn Fn(&[u8]) + Send + Sync>) -> Self {
        Self { composite: None, channels: Vec::new(), last_snapshot: None, pty_write }
    }

    fn composite_state(&self) -> Option<String> {
        self.composite.as_ref().and_then(Scene::state)
    }

    /// Full flow from spec §4.10's `update`.
    pub async fn update(&mut self, snapshot: Snapshot) {
        let prev_state = self.composite_state();
        let mut events = match &mut self.composite {
            Some(composite) => composite.process(&snapshot).events,
            None => Vec::new(),
        };
        let new_state = self.composite_state();
        if new_state != prev_state {
            events.push(SceneEvent::SceneStateChanged { state: new_state });
        }
        self.last_snapshot = Some(snapshot.clone());
        self.broadcast(Frame { snapshot, events }).await;
    }

    /// Discard the composite. If it had an active state and a prior
    /// snapshot exists, tell channels the state dropped to `null` before
    /// moving on.
    pub async fn replace_scenes(&mut self, scenes: Vec<Box<dyn Scene>>) {
        let prev_state = self.composite_state();
        self.composite = if scenes.is_empty() { None } else { Some(CompositeScene::new(scenes)) };
        if let (Some(_), Some(snapshot)) = (prev_state, self.last_snapshot.clone()) {
            self.broadcast(Frame {
                snapshot,
                events: vec![SceneEvent::SceneStateChanged { state: None }],
            })
            .await;
        }
    }

    /// Stop the current channels, then start the replacements in order.
    /// Rolls back (stopping anything already started) on the first
    /// failure, leaving the gateway with an empty channel set either way.
    ///
    /// Takes `&mut self`, which is this implementation's answer to the
    /// open question of whether concurrent `replace_channels` calls should
    /// be serialized: a caller juggling concurrent reconfiguration should
    /// hold the gateway behind its own mutex, same as any other `&mut`
    /// API.
    pub async fn replace_channels(
        &mut self,
        send: SendFn,
        channels: Vec<Box<dyn Channel>>,
    ) -> Result<(), ChannelError> {
        for channel in &mut self.channels {
            channel.stop().await;
        }
        self.channels.clear();

        let mut started: Vec<Box<dyn Channel>> = Vec::new();
        for mut channel in channels {
            match channel.start(send.clone()).await {
                Ok(()) => started.push(channel),
                Err(e) => {
                    for mut started_channel in started {
                        started_channel.stop().await;
                    }
                    return Err(e);
                }
            }
        }
        self.channels = started;
        Ok(())
    }

    /// Channel-originated input: ask the active scene to encode it; if it
    /// declines, fall back to `content + "\r"` for `text` input only.
    pub fn send(&mut self, input: SceneInput) {
        let input = input.sanitize();
        let bytes = self.composite.as_mut().and_then(|c| c.encode_input(&input)).or_else(|| {
            match &input {
                SceneInput::Text { content } => Some(format!("{content}\r").into_bytes()),
                SceneInput::Select { .. } => None,
            }
        });
        if let Some(bytes) = bytes {
            (self.pty_write)(&bytes);
        }
    }

    async fn broadcast(&self, frame: Frame) {
        for channel in &self.channels {
            if let Err(e) = channel.receive(&frame).await {
                log::warn!("channel dropped a frame: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LoggingChannel;
    use crate::scene::{ContinueResult, SceneEvent};
    use crate::snapshot::{Cursor, RichLine};
    use std::sync::{Arc, Mutex};

    fn snap(ts: i64) -> Snapshot {
        Snapshot {
            lines: vec![RichLine::Plain("$ ".into())],
            cursor: Cursor { x: 0, y: 0, visible: true },
            cols: 80,
            rows: 24,
            alternate: false,
            lines_offset: Some(0),
            timestamp: ts,
        }
    }

    struct AlwaysDetect;
    impl Scene for AlwaysDetect {
        fn priority(&self) -> i32 {
            0
        }
        fn state(&self) -> Option<String> {
            Some("on".into())
        }
        fn detect(&mut self, _s: &Snapshot) -> Option<Vec<SceneEvent>> {
            Some(Vec::new())
        }
        fn continue_scene(&mut self, _s: &Snapshot) -> Option<ContinueResult> {
            Some(ContinueResult { events: Vec::new(), firm: true })
        }
    }

    #[tokio::test]
    async fn state_change_is_appended_on_first_detect() {
        let written = Arc::new(Mutex::new(Vec::<u8>::new()));
        let written2 = written.clone();
        let mut gateway = Gateway::new(Box::new(move |bytes: &[u8]| {
            written2.lock().unwrap().extend_from_slice(bytes);
        }));
        gateway.replace_scenes(vec![Box::new(AlwaysDetect)]).await;
        gateway
            .replace_channels(Arc::new(|_| {}), vec![Box::new(LoggingChannel) as Box<dyn Channel>])
            .await
            .unwrap();

        gateway.update(snap(0)).await;
        assert_eq!(gateway.composite_state(), Some("on".into()));
    }

    #[test]
    fn send_falls_back_to_cr_terminated_text_when_no_scene_claims_it() {
        let written = Arc::new(Mutex::new(Vec::<u8>::new()));
        let written2 = written.clone();
        let mut gateway = Gateway::new(Box::new(move |bytes: &[u8]| {
            written2.lock().unwrap().extend_from_slice(bytes);
        }));
        gateway.send(SceneInput::Text { content: "ls".into() });
        assert_eq!(&written.lock().unwrap()[..], b"ls\r");
    }

    #[test]
    fn send_drops_unclaimed_select_input() {
        let written = Arc::new(Mutex::new(Vec::<u8>::new()));
        let written2 = written.clone();
        let mut gateway = Gateway::new(Box::new(move |bytes: &[u8]| {
            written2.lock().unwrap().extend_from_slice(bytes);
        }));
        gateway.send(SceneInput::Select { index: 0 });
        assert!(written.lock().unwrap().is_empty());
    }
}
