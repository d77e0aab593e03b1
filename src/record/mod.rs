//! Record engine (spec §4.11): drives a scripted procedure against a
//! headless PTY and writes the resulting snapshots to a dump file with
//! deterministic timestamps.

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::codec::DumpWriter;
use crate::error::RecordError;
use crate::pty;
use crate::terminal::VirtualTerminal;

fn default_cols() -> u16 {
    80
}
fn default_rows() -> u16 {
    24
}
fn default_scrollback() -> usize {
    24
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_poll_ms() -> u64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct RecordScript {
    pub command: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_cols")]
    pub cols: u16,
    #[serde(default = "default_rows")]
    pub rows: u16,
    #[serde(default = "default_scrollback")]
    pub scrollback: usize,
    pub steps: Vec<Step>,
}

#[derive(Debug)]
pub enum Step {
    Input(String),
    Wait(WaitStep),
    Snapshot,
}

#[derive(Debug)]
pub struct WaitStep {
    pub condition: WaitCondition,
    pub timeout_ms: u64,
    pub poll_ms: u64,
}

#[derive(Debug)]
pub enum WaitCondition {
    Content(Regex),
    Stable(u64),
    Cursor { visible: bool },
}

/// Raw, directly-deserializable shape of a step, before it is validated and
/// its regex/condition compiled. Matches the three shapes a step can take in
/// the YAML/JSON document: the literal string `"snapshot"`, `{input: ...}`,
/// or `{wait: ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum StepRaw {
    Literal(String),
    Input { input: String },
    Wait { wait: WaitDef },
}

#[derive(Deserialize)]
struct WaitDef {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    stable: Option<u64>,
    #[serde(default)]
    cursor: Option<CursorWaitDef>,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default = "default_poll_ms")]
    poll_ms: u64,
}

#[derive(Deserialize)]
struct CursorWaitDef {
    visible: bool,
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        match StepRaw::deserialize(deserializer)? {
            StepRaw::Literal(s) if s == "snapshot" => Ok(Step::Snapshot),
            StepRaw::Literal(s) => {
                Err(D::Error::custom(format!("unknown step literal {s:?}, expected \"snapshot\"")))
            }
            StepRaw::Input { input } => Ok(Step::Input(input)),
            StepRaw::Wait { wait } => {
                let condition = match (wait.content, wait.stable, wait.cursor) {
                    (Some(pattern), None, None) => WaitCondition::Content(
                        Regex::new(&pattern).map_err(D::Error::custom)?,
                    ),
                    (None, Some(ms), None) => WaitCondition::Stable(ms),
                    (None, None, Some(c)) => WaitCondition::Cursor { visible: c.visible },
                    _ => {
                        return Err(D::Error::custom(
                            "wait step must set exactly one of content/stable/cursor",
                        ))
                    }
                };
                Ok(Step::Wait(WaitStep {
                    condition,
                    timeout_ms: wait.timeout_ms,
                    poll_ms: wait.poll_ms,
                }))
            }
        }
    }
}

fn joined_text(snap: &crate::snapshot::Snapshot) -> String {
    snap.lines.iter().map(|l| l.plain_text()).collect::<Vec<_>>().join("\n")
}

fn drain_incoming(rx: &mut mpsc::UnboundedReceiver<Vec<u8>>, vt: &mut VirtualTerminal) {
    while let Ok(bytes) = rx.try_recv() {
        vt.write(&bytes);
    }
}

async fn wait_for(
    vt: &mut VirtualTerminal,
    rx: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    step: &WaitStep,
) -> Result<(), RecordError> {
    let start = tokio::time::Instant::now();
    let mut stable_since: Option<tokio::time::Instant> = None;
    let mut last_text: Option<String> = None;

    loop {
        drain_incoming(rx, vt);
        let now_ms = chrono::Utc::now().timestamp_millis();
        let snap = vt.capture_now(now_ms);

        let satisfied = match &step.condition {
            WaitCondition::Content(re) => re.is_match(&joined_text(&snap)),
            WaitCondition::Cursor { visible } => snap.cursor.visible == *visible,
            WaitCondition::Stable(stable_ms) => {
                let text = joined_text(&snap);
                if last_text.as_deref() == Some(text.as_str()) {
                    match stable_since {
                        Some(since) if since.elapsed() >= Duration::from_millis(*stable_ms) => {
                            true
                        }
                        Some(_) => false,
                        None => {
                            stable_since = Some(tokio::time::Instant::now());
                            false
                        }
                    }
                } else {
                    last_text = Some(text);
                    stable_since = Some(tokio::time::Instant::now());
                    false
                }
            }
        };

        if satisfied {
            return Ok(());
        }
        if start.elapsed() >= Duration::from_millis(step.timeout_ms) {
            return Err(RecordError::Timeout {
                description: format!("{:?}", step.condition),
                timeout_ms: step.timeout_ms,
            });
        }
        tokio::time::sleep(Duration::from_millis(step.poll_ms)).await;
    }
}

/// Run `script` against a freshly spawned headless PTY, writing every
/// `"snapshot"` step's capture to `writer`. Returns the number of snapshots
/// written.
pub async fn run(
    script: &RecordScript,
    writer: &mut DumpWriter<impl Write>,
) -> Result<usize, RecordError> {
    if script.command.is_empty() {
        return Err(RecordError::InvalidScript("command must not be empty".into()));
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let mut vt = VirtualTerminal::new(script.cols, script.rows, script.scrollback, 100, 300);
    let session =
        pty::spawn(&script.command, &script.env, script.cols, script.rows, false, move |bytes| {
            let _ = tx.send(bytes.to_vec());
        })?;
    // Guarantees the child is killed and its reader thread joined on every
    // exit path, including a `?` bailing out of the loop below - `Drop`
    // alone only kills, it doesn't join.
    let mut session = scopeguard::guard(session, |mut session| {
        let _ = session.kill();
        let _ = session.wait();
    });

    let mut count = 0usize;
    for (index, step) in script.steps.iter().enumerate() {
        drain_incoming(&mut rx, &mut vt);
        match step {
            Step::Input(text) => {
                session.write(text.as_bytes())?;
            }
            Step::Wait(wait) => {
                wait_for(&mut vt, &mut rx, wait).await?;
            }
            Step::Snapshot => {
                drain_incoming(&mut rx, &mut vt);
                let mut snap = vt.capture_now(chrono::Utc::now().timestamp_millis());
                snap.timestamp = 1000 * index as i64;
                writer.write_snapshot(&snap)?;
                count += 1;
            }
        }
    }

    let mut session = scopeguard::ScopeGuard::into_inner(session);
    session.kill()?;
    let _ = session.wait();
    writer.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_step_shapes_from_yaml() {
        let yaml = "\
command: [echo, hi]
steps:
  - input: ls
  - wait:
      content: prompt$
  - snapshot
  - wait:
      stable: 200
      timeout_ms: 5000
  - wait:
      cursor:
        visible: true
";
        let script: RecordScript = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(script.command, vec!["echo", "hi"]);
        assert_eq!(script.steps.len(), 5);
        assert!(matches!(script.steps[0], Step::Input(_)));
        assert!(matches!(script.steps[1], Step::Wait(_)));
        assert!(matches!(script.steps[2], Step::Snapshot));
    }

    #[test]
    fn defaults_fill_in_missing_fields() {
        let yaml = "command: [sh]\nsteps: []\n";
        let script: RecordScript = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(script.cols, 80);
        assert_eq!(script.rows, 24);
        assert_eq!(script.scrollback, 24);
        assert!(script.env.is_empty());
    }

    #[test]
    fn wait_step_rejects_ambiguous_condition() {
        let yaml = "command: [sh]\nsteps:\n  - wait:\n      content: x\n      stable: 10\n";
        let result: Result<RecordScript, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }
}
