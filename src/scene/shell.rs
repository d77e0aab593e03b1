//! Reference shell scene (spec §4.9): a concrete state machine exercising
//! every snapshot helper, used both as a working scene and as the
//! worked example for anyone writing their own.

use regex::Regex;

use super::{ContinueResult, MessageStyle, Scene, SceneEvent};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy)]
enum State {
    /// The prompt is visible on the cursor line (and, if `prompt_prefix`
    /// is set, the line above it matches too). Positions are absolute.
    Idle { prompt_start: u64, prompt_end: u64 },
    /// The prompt has moved on; output since `emitted_up_to` is being
    /// surfaced as `message_created { style: "text" }`.
    Running { emitted_up_to: u64 },
}

pub struct ShellScene {
    prompt: Regex,
    prompt_prefix: Option<Regex>,
    state: Option<State>,
    priority: i32,
}

impl ShellScene {
    pub fn new(prompt: &str, prompt_prefix: Option<&str>) -> Result<Self, regex::Error> {
        Ok(Self {
            prompt: Regex::new(prompt)?,
            prompt_prefix: prompt_prefix.map(Regex::new).transpose()?,
            state: None,
            priority: 100,
        })
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn line_text_at(&self, snapshot: &Snapshot, idx: u64) -> Option<String> {
        snapshot.collect_lines(idx, idx + 1).into_iter().next().map(|l| l.plain_text())
    }

    /// Does the prompt match on the cursor line (and, if configured, the
    /// prefix line above it)? Returns `(prompt_start, prompt_end,
    /// text_after_prompt)`.
    fn match_prompt(&self, snapshot: &Snapshot) -> Option<(u64, u64, String)> {
        let cursor_idx = snapshot.cursor_line_index()?;
        let line = self.line_text_at(snapshot, cursor_idx)?;
        let m = self.prompt.find(&line)?;
        if let Some(prefix) = &self.prompt_prefix {
            if cursor_idx == 0 {
                return None;
            }
            let above = self.line_text_at(snapshot, cursor_idx - 1)?;
            if !prefix.is_match(&above) {
                return None;
            }
        }
        let prompt_start = if self.prompt_prefix.is_some() { cursor_idx - 1 } else { cursor_idx };
        Some((prompt_start, cursor_idx, line[m.end()..].to_string()))
    }

    fn continue_idle(&mut self, snapshot: &Snapshot, prompt_start: u64, prompt_end: u64) -> ContinueResult {
        if let Some(line) = self.line_text_at(snapshot, prompt_end) {
            if let Some(m) = self.prompt.find(&line) {
                self.state = Some(State::Idle { prompt_start, prompt_end });
                return ContinueResult {
                    events: vec![SceneEvent::InputChanged { active: true, text: line[m.end()..].to_string() }],
                    firm: true,
                };
            }
        }
        let mut events = vec![SceneEvent::InputChanged { active: false, text: String::new() }];
        if prompt_start >= snapshot.lines_offset.unwrap_or(0) {
            let content = snapshot.collect_lines(prompt_start, prompt_end + 1);
            events.push(SceneEvent::MessageCreated { style: MessageStyle::Block, content, echo: Some(true) });
        }
        self.state = Some(State::Running { emitted_up_to: prompt_end + 1 });
        ContinueResult { events, firm: true }
    }

    fn continue_running(&mut self, snapshot: &Snapshot, mut emitted_up_to: u64) -> ContinueResult {
        let new_prompt = self.match_prompt(snapshot);
        let boundary = new_prompt.as_ref().map_or_else(|| snapshot.end(), |(start, ..)| *start);

        emitted_up_to = emitted_up_to.max(snapshot.lines_offset.unwrap_or(0));

        let mut events = Vec::new();
        if emitted_up_to < boundary {
            let content = snapshot.collect_lines(emitted_up_to, boundary);
            events.push(SceneEvent::MessageCreated { style: MessageStyle::Text, content, echo: None });
            emitted_up_to = boundary;
        }

        match new_prompt {
            Some((prompt_start, prompt_end, text_after)) => {
                events.push(SceneEvent::InputChanged { active: true, text: text_after });
                self.state = Some(State::Idle { prompt_start, prompt_end });
            }
            None => {
                self.state = Some(State::Running { emitted_up_to });
            }
        }
        ContinueResult { events, firm: true }
    }
}

impl Scene for ShellScene {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn state(&self) -> Option<String> {
        match self.state {
            Some(State::Idle { .. }) => Some("shell(idle)".into()),
            Some(State::Running { .. }) => Some("shell(running)".into()),
            None => None,
        }
    }

    fn detect(&mut self, snapshot: &Snapshot) -> Option<Vec<SceneEvent>> {
        if snapshot.alternate {
            return None;
        }
        let (prompt_start, prompt_end, text_after) = self.match_prompt(snapshot)?;
        self.state = Some(State::Idle { prompt_start, prompt_end });
        Some(vec![SceneEvent::InputChanged { active: true, text: text_after }])
    }

    fn continue_scene(&mut self, snapshot: &Snapshot) -> Option<ContinueResult> {
        let state = self.state?;

        if snapshot.alternate {
            // Preserve state, yield to whatever else might claim this
            // snapshot (e.g. a pager scene).
            return Some(ContinueResult { events: Vec::new(), firm: false });
        }

        let required_end = match state {
            State::Idle { prompt_end, .. } => prompt_end + 1,
            State::Running { emitted_up_to } => emitted_up_to,
        };
        if snapshot.lines_offset.is_none() || snapshot.end() < required_end {
            self.state = None;
            return self.detect(snapshot).map(|events| ContinueResult { events, firm: true });
        }

        Some(match state {
            State::Idle { prompt_start, prompt_end } => self.continue_idle(snapshot, prompt_start, prompt_end),
            State::Running { emitted_up_to } => self.continue_running(snapshot, emitted_up_to),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Cursor, RichLine};

    fn plain_lines(lines: &[&str]) -> Vec<RichLine> {
        lines.iter().map(|l| RichLine::Plain((*l).to_string())).collect()
    }

    fn snap(lines: &[&str], cursor_y: u32, alternate: bool) -> Snapshot {
        Snapshot {
            lines: plain_lines(lines),
            cursor: Cursor { x: 0, y: cursor_y, visible: true },
            cols: 80,
            rows: 24,
            alternate,
            lines_offset: Some(0),
            timestamp: 0,
        }
    }

    #[test]
    fn simple_command_scenario() {
        let mut scene = ShellScene::new(r"^\$", None).unwrap();

        let idle = scene.detect(&snap(&["$ "], 0, false)).unwrap();
        assert_eq!(idle, vec![SceneEvent::InputChanged { active: true, text: " ".into() }]);

        let typing = scene.continue_scene(&snap(&["$ echo hello"], 0, false)).unwrap();
        assert!(typing.firm);
        assert_eq!(
            typing.events,
            vec![SceneEvent::InputChanged { active: true, text: " echo hello".into() }]
        );

        let transitioned = scene.continue_scene(&snap(&["$ echo hello", "hello", ""], 2, false)).unwrap();
        assert!(transitioned.events.contains(&SceneEvent::InputChanged { active: false, text: String::new() }));
        assert!(transitioned
            .events
            .iter()
            .any(|e| matches!(e, SceneEvent::MessageCreated { style: MessageStyle::Block, .. })));

        let prompt_again = scene.continue_scene(&snap(&["$ echo hello", "hello", "$ "], 2, false)).unwrap();
        assert!(prompt_again.events.iter().any(|e| matches!(e, SceneEvent::MessageCreated { style: MessageStyle::Text, .. })));
        assert!(prompt_again.events.iter().any(|e| matches!(e, SceneEvent::InputChanged { active: true, .. })));
        assert_eq!(scene.state(), Some("shell(idle)".into()));
    }

    #[test]
    fn alternate_screen_yields_tentatively_and_preserves_state() {
        let mut scene = ShellScene::new(r"^\$", None).unwrap();
        scene.detect(&snap(&["$ "], 0, false)).unwrap();

        let alt = scene.continue_scene(&snap(&["pager content"], 0, true)).unwrap();
        assert!(!alt.firm);
        assert!(alt.events.is_empty());
        assert_eq!(scene.state(), Some("shell(idle)".into()));
    }

    #[test]
    fn scrollback_overflow_does_not_reemit_scrolled_out_lines() {
        let mut scene = ShellScene::new(r"^\$", None).unwrap();
        scene.detect(&snap(&["$ seq 1 20"], 0, false)).unwrap();

        let mut running_snap = snap(&["$ seq 1 20", "1", "2", "3"], 3, false);
        let first = scene.continue_scene(&running_snap).unwrap();
        assert!(first.events.iter().any(|e| matches!(e, SceneEvent::MessageCreated { .. })));

        // Scrollback trimmed: lines_offset jumps forward past what we'd
        // already emitted.
        running_snap = Snapshot {
            lines: plain_lines(&["2", "3", "4", "5"]),
            cursor: Cursor { x: 0, y: 3, visible: true },
            lines_offset: Some(5),
            ..running_snap
        };
        let second = scene.continue_scene(&running_snap).unwrap();
        assert!(second.firm);
    }
}
