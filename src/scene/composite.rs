//! The composite scene orchestrator (spec §4.8): priority selection,
//! firm/tentative continuation, and the preemption scan.

use super::{ContinueResult, Scene, SceneEvent, SceneInput};
use crate::snapshot::Snapshot;

pub struct CompositeScene {
    scenes: Vec<Box<dyn Scene>>,
    active: Option<usize>,
    priority: i32,
}

impl CompositeScene {
    /// `scenes` is sorted by ascending priority once, here.
    #[must_use]
    pub fn new(mut scenes: Vec<Box<dyn Scene>>) -> Self {
        scenes.sort_by_key(Scene::priority);
        Self { scenes, active: None, priority: 0 }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Top-level entry point: the full steps 1-5 from spec §4.8.
    pub fn process(&mut self, snapshot: &Snapshot) -> ContinueResult {
        if self.active.is_some() {
            if let Some(result) = self.continue_scene(snapshot) {
                return result;
            }
            // `continue_scene` cleared `active` on release; fall through to
            // the clean-detect scan below, same snapshot.
        }
        match self.detect(snapshot) {
            Some(events) => ContinueResult { events, firm: true },
            None => ContinueResult { events: Vec::new(), firm: false },
        }
    }

    pub fn encode_input(&mut self, input: &SceneInput) -> Option<Vec<u8>> {
        let idx = self.active?;
        self.scenes[idx].encode_input(input)
    }

    fn preempt(&mut self, current: usize, snapshot: &Snapshot) -> Option<(usize, Vec<SceneEvent>)> {
        for (i, scene) in self.scenes.iter_mut().enumerate() {
            if i == current {
                continue;
            }
            if let Some(events) = scene.detect(snapshot) {
                return Some((i, events));
            }
        }
        None
    }
}

impl Scene for CompositeScene {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn state(&self) -> Option<String> {
        self.active.and_then(|i| self.scenes[i].state())
    }

    /// Clean-detect scan (step 5): the first scene, in priority order,
    /// whose `detect` matches becomes active. A no-op (returns `None`)
    /// while a scene is already active - callers drive continuation via
    /// `continue_scene` instead.
    fn detect(&mut self, snapshot: &Snapshot) -> Option<Vec<SceneEvent>> {
        if self.active.is_some() {
            return None;
        }
        for (i, scene) in self.scenes.iter_mut().enumerate() {
            if let Some(events) = scene.detect(snapshot) {
                self.active = Some(i);
                return Some(events);
            }
        }
        None
    }

    /// Steps 1-4: continue the active scene, run the preemption scan on a
    /// tentative result, and clear `active` on release.
    fn continue_scene(&mut self, snapshot: &Snapshot) -> Option<ContinueResult> {
        let idx = self.active?;
        match self.scenes[idx].continue_scene(snapshot) {
            None => {
                self.active = None;
                None
            }
            Some(result) if result.firm => Some(result),
            Some(result) => match self.preempt(idx, snapshot) {
                Some((new_idx, events)) => {
                    self.active = Some(new_idx);
                    Some(ContinueResult { events, firm: true })
                }
                None => Some(result),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Cursor, RichLine};

    fn snap(first_line: &str) -> Snapshot {
        Snapshot {
            lines: vec![RichLine::Plain(first_line.to_string())],
            cursor: Cursor { x: 0, y: 0, visible: true },
            cols: 80,
            rows: 24,
            alternate: false,
            lines_offset: Some(0),
            timestamp: 0,
        }
    }

    /// Accepts every snapshot tentatively; never releases.
    struct AlwaysTentative;
    impl Scene for AlwaysTentative {
        fn priority(&self) -> i32 {
            10
        }
        fn state(&self) -> Option<String> {
            Some("always_tentative".into())
        }
        fn detect(&mut self, _snapshot: &Snapshot) -> Option<Vec<SceneEvent>> {
            Some(Vec::new())
        }
        fn continue_scene(&mut self, _snapshot: &Snapshot) -> Option<ContinueResult> {
            Some(ContinueResult { events: Vec::new(), firm: false })
        }
    }

    /// Detects any snapshot whose first line starts with `~`.
    struct TildeScene;
    impl Scene for TildeScene {
        fn priority(&self) -> i32 {
            0
        }
        fn state(&self) -> Option<String> {
            Some("tilde".into())
        }
        fn detect(&mut self, snapshot: &Snapshot) -> Option<Vec<SceneEvent>> {
            let starts = snapshot.lines.first().is_some_and(|l| l.plain_text().starts_with('~'));
            starts.then(Vec::new)
        }
        fn continue_scene(&mut self, _snapshot: &Snapshot) -> Option<ContinueResult> {
            None
        }
    }

    #[test]
    fn preemption_replaces_tentative_active_scene() {
        let mut composite =
            CompositeScene::new(vec![Box::new(AlwaysTentative), Box::new(TildeScene)]);

        let first = composite.process(&snap("anything"));
        assert!(!first.firm);
        assert_eq!(composite.state(), Some("always_tentative".into()));

        let second = composite.process(&snap("~vim"));
        assert!(second.firm);
        assert_eq!(composite.state(), Some("tilde".into()));
    }

    #[test]
    fn clean_detect_picks_lowest_priority_match() {
        let mut composite =
            CompositeScene::new(vec![Box::new(AlwaysTentative), Box::new(TildeScene)]);
        let result = composite.process(&snap("~vim"));
        assert!(result.firm);
        assert_eq!(composite.state(), Some("tilde".into()));
    }
}
