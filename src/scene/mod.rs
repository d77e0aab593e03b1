//! Scene classification: the `detect`/`continue`/`encode_input` contract
//! (spec §4.8), the event taxonomy (spec §3), and structured channel input.

pub mod composite;
pub mod shell;

use serde::{Deserialize, Serialize};

use crate::snapshot::{RichLine, Snapshot};

/// An `{label, description?}` choice offered by a question or permission
/// prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Option_ {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Semantic events a scene (or the Gateway) can emit, tagged by `type` on
/// the wire. Variant shape follows spec §3 exactly; `scene_state_changed`
/// is the one variant only the Gateway ever produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SceneEvent {
    IndicatorChanged { active: bool, text: String },
    MessageCreated { style: MessageStyle, content: Vec<RichLine>, #[serde(skip_serializing_if = "Option::is_none")] echo: Option<bool> },
    LastMessageUpdated { style: MessageStyle, content: Option<Vec<RichLine>>, #[serde(skip_serializing_if = "Option::is_none")] echo: Option<bool> },
    InputChanged { active: bool, text: String },
    QuestionCreated {
        #[serde(skip_serializing_if = "Option::is_none")]
        header: Option<String>,
        question: String,
        options: Vec<Option_>,
        #[serde(skip_serializing_if = "Option::is_none")]
        selected: Option<usize>,
    },
    LastQuestionUpdated {
        #[serde(skip_serializing_if = "Option::is_none")]
        header: Option<String>,
        question: String,
        options: Vec<Option_>,
        #[serde(skip_serializing_if = "Option::is_none")]
        selected: Option<usize>,
    },
    PermissionRequired {
        command: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        options: Vec<Option_>,
        #[serde(skip_serializing_if = "Option::is_none")]
        selected: Option<usize>,
    },
    /// Emitted only by the Gateway on a composite state transition - never
    /// constructed by an individual scene.
    SceneStateChanged { state: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStyle {
    Text,
    Block,
}

/// Structured input from a channel, destined for the active scene (or the
/// Gateway's PTY fallback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SceneInput {
    Text { content: String },
    Select { index: usize },
}

impl SceneInput {
    /// C0 control bytes are stripped from `text` input except tab and
    /// newline; CR is stripped too since the Gateway appends its own when
    /// it falls back to writing `content + "\r"` (spec §3/§4.10).
    #[must_use]
    pub fn sanitize(self) -> Self {
        match self {
            SceneInput::Text { content } => SceneInput::Text {
                content: content
                    .chars()
                    .filter(|&c| c == '\t' || c == '\n' || !c.is_control())
                    .collect(),
            },
            other => other,
        }
    }
}

/// Result of a stateful `continue` check (spec §4.8).
#[derive(Debug, Clone, PartialEq)]
pub struct ContinueResult {
    pub events: Vec<SceneEvent>,
    pub firm: bool,
}

/// A classifier mapping snapshots to semantic events via a small state
/// machine. Implementors own their state for the process lifetime (or
/// until replaced via `Gateway::replace_scenes`).
pub trait Scene: Send {
    /// Lower values are tried first in both the clean-detect scan and the
    /// preemption scan.
    fn priority(&self) -> i32;

    /// Diagnostic label, `None` while inactive.
    fn state(&self) -> Option<String>;

    /// Stateless check against a cold snapshot. `None` means no match.
    fn detect(&mut self, snapshot: &Snapshot) -> Option<Vec<SceneEvent>>;

    /// Stateful check while this scene is active. `None` releases the
    /// scene (the composite clears `active` and may re-detect).
    fn continue_scene(&mut self, snapshot: &Snapshot) -> Option<ContinueResult>;

    /// Translate structured input into PTY bytes. `None` declines (the
    /// scene has nothing meaningful to say about this input).
    fn encode_input(&mut self, _input: &SceneInput) -> Option<Vec<u8>> {
        None
    }
}
