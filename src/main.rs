//! `scenewatch` binary: wires the library's PTY collaborator, virtual
//! terminal, scene/channel configuration, and Gateway together behind
//! three subcommands - `watch` (live), `record` (scripted capture), and
//! `replay` (dump inspection).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::sync::Mutex;

use scenewatch::channel::SendFn;
use scenewatch::codec::{DumpHeader, DumpReader, DumpWriter};
use scenewatch::config::{self, ConfigEntry};
use scenewatch::gateway::Gateway;
use scenewatch::scene::shell::ShellScene;
use scenewatch::scene::{Scene, SceneInput};
use scenewatch::terminal::{Command as TerminalCommand, VirtualTerminal};
use scenewatch::{pty, record, Channel, LoggingChannel, RecordingChannel, RecordScript};

#[derive(Parser)]
#[command(name = "scenewatch")]
#[command(version)]
#[command(about = "Wraps a PTY-driven command and exposes its screen as scene events")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command under a headless PTY, classify its output through the
    /// configured scenes, and broadcast frames to the configured channels.
    Watch {
        /// The command and its arguments.
        #[arg(required = true)]
        command: Vec<String>,
        /// Path to a scene/channel configuration document (JSON or YAML).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Append every snapshot to a dump file in addition to any channels
        /// named in `--config`.
        #[arg(long)]
        dump: Option<PathBuf>,
        #[arg(long, default_value_t = 80)]
        cols: u16,
        #[arg(long, default_value_t = 24)]
        rows: u16,
        #[arg(long, default_value_t = 1000)]
        scrollback: usize,
    },
    /// Drive a recorded script against a headless PTY and write a dump file.
    Record {
        /// Path to the record script (JSON or YAML).
        script: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Inspect a dump file: print every snapshot as JSON, or just the one
    /// nearest a given timestamp.
    Replay {
        dump: PathBuf,
        #[arg(long)]
        at_ms: Option<i64>,
        /// Print `{ keyframes, deltas, duration }` instead of the snapshots.
        #[arg(long)]
        stats: bool,
    },
}

#[derive(Deserialize)]
struct ShellOptions {
    prompt: String,
    #[serde(default)]
    prompt_prefix: Option<String>,
    #[serde(default)]
    priority: Option<i32>,
}

#[derive(Deserialize)]
struct RecordingOptions {
    path: PathBuf,
}

fn build_scene(entry: &ConfigEntry) -> Result<Box<dyn Scene>> {
    match entry.kind.as_str() {
        "shell" => {
            let opts: ShellOptions = serde_json::from_value(entry.options.clone())
                .context("invalid options for shell scene")?;
            let mut scene = ShellScene::new(&opts.prompt, opts.prompt_prefix.as_deref())
                .context("invalid shell prompt regex")?;
            if let Some(priority) = opts.priority {
                scene = scene.with_priority(priority);
            }
            Ok(Box::new(scene))
        }
        other => bail!("unknown scene type: {other}"),
    }
}

fn build_channel(entry: &ConfigEntry, cols: u16, rows: u16, scrollback: usize) -> Result<Box<dyn Channel>> {
    match entry.kind.as_str() {
        "logging" => Ok(Box::new(LoggingChannel)),
        "recording" => {
            let opts: RecordingOptions = serde_json::from_value(entry.options.clone())
                .context("invalid options for recording channel")?;
            let file = std::fs::File::create(&opts.path)
                .with_context(|| format!("creating dump file at {}", opts.path.display()))?;
            let writer = DumpWriter::new(
                file,
                DumpHeader { cols, rows, scrollback_limit: scrollback as u64, started_at: now_ms() },
            )?;
            Ok(Box::new(RecordingChannel::new(writer)))
        }
        other => bail!("unknown channel type: {other}"),
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

async fn run_watch(
    command: Vec<String>,
    config_path: Option<PathBuf>,
    dump: Option<PathBuf>,
    cols: u16,
    rows: u16,
    scrollback: usize,
) -> Result<()> {
    let config = match &config_path {
        Some(path) => config::load(path)?,
        None => config::Config::default(),
    };

    let mut scenes = Vec::new();
    for entry in &config.scenes {
        scenes.push(build_scene(entry)?);
    }
    let mut channels = Vec::new();
    for entry in &config.channels {
        channels.push(build_channel(entry, cols, rows, scrollback)?);
    }
    if let Some(path) = dump {
        let file = std::fs::File::create(&path)
            .with_context(|| format!("creating dump file at {}", path.display()))?;
        let writer = DumpWriter::new(
            file,
            DumpHeader {
                cols,
                rows,
                scrollback_limit: scrollback as u64,
                started_at: now_ms(),
            },
        )?;
        channels.push(Box::new(RecordingChannel::new(writer)) as Box<dyn Channel>);
    }

    let (write_tx, mut write_rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();
    let (cmd_tx, cmd_rx) = tokio::sync::mpsc::unbounded_channel::<TerminalCommand>();

    let cmd_tx_for_pty = cmd_tx.clone();
    let mut session = pty::spawn(&command, &HashMap::new(), cols, rows, false, move |bytes| {
        let _ = cmd_tx_for_pty.send(TerminalCommand::Write(bytes.to_vec()));
    })?;

    tokio::spawn(async move {
        while let Some(bytes) = write_rx.recv().await {
            if let Err(e) = session.write(&bytes) {
                log::warn!("PTY write failed: {e}");
            }
        }
    });

    let gateway = Arc::new(Mutex::new(Gateway::new(Box::new({
        let write_tx = write_tx.clone();
        move |bytes: &[u8]| {
            let _ = write_tx.send(bytes.to_vec());
        }
    }))));

    let gateway_for_send = gateway.clone();
    let send: SendFn = Arc::new(move |input: SceneInput| {
        let gateway = gateway_for_send.clone();
        tokio::spawn(async move {
            gateway.lock().await.send(input);
        });
    });

    {
        let mut guard = gateway.lock().await;
        if !scenes.is_empty() {
            guard.replace_scenes(scenes).await;
        }
        guard.replace_channels(send, channels).await.map_err(|e| anyhow::anyhow!("{e}"))?;
    }

    let vt = VirtualTerminal::new(cols, rows, scrollback, 100, 300);
    vt.run(cmd_rx, move |snap, _prev| {
        let gateway = gateway.clone();
        async move {
            gateway.lock().await.update(snap).await;
        }
    })
    .await;

    Ok(())
}

async fn run_record(script_path: PathBuf, out: PathBuf) -> Result<()> {
    let text = std::fs::read_to_string(&script_path)
        .with_context(|| format!("reading record script {}", script_path.display()))?;
    let script: RecordScript = match script_path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&text)?,
        _ => serde_yaml::from_str(&text)?,
    };

    let file = std::fs::File::create(&out)
        .with_context(|| format!("creating dump file at {}", out.display()))?;
    let mut writer = DumpWriter::new(
        file,
        DumpHeader {
            cols: script.cols,
            rows: script.rows,
            scrollback_limit: script.scrollback as u64,
            started_at: 0,
        },
    )?;

    let count = record::run(&script, &mut writer).await?;
    println!("wrote {count} snapshot(s) to {}", out.display());
    Ok(())
}

fn run_replay(dump: PathBuf, at_ms: Option<i64>, stats: bool) -> Result<()> {
    let bytes = std::fs::read(&dump)
        .with_context(|| format!("reading dump file {}", dump.display()))?;
    let reader = DumpReader::open(&bytes)?;

    if stats {
        let stats = reader.stats();
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({
            "keyframes": stats.keyframes,
            "deltas": stats.deltas,
            "duration": stats.duration.map(|d| serde_json::json!({"start": d.start, "end": d.end})),
        }))?);
        return Ok(());
    }

    match at_ms {
        Some(ts) => {
            let snap = reader
                .snapshot_nearest_to(ts)?
                .context("no snapshot recorded at or before that timestamp")?;
            println!("{}", serde_json::to_string_pretty(&snap)?);
        }
        None => {
            for item in reader.snapshots(None) {
                let (snap, delta_summary) = item?;
                println!(
                    "{}",
                    serde_json::to_string(&serde_json::json!({
                        "snapshot": snap,
                        "delta_summary": delta_summary.map(|d| serde_json::json!({
                            "changed_lines": d.changed_lines,
                            "scrolled_lines": d.scrolled_lines,
                            "cursor_moved": d.cursor_moved,
                        })),
                    }))?
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Watch { command, config, dump, cols, rows, scrollback } => {
            run_watch(command, config, dump, cols, rows, scrollback).await
        }
        Commands::Record { script, out } => run_record(script, out).await,
        Commands::Replay { dump, at_ms, stats } => run_replay(dump, at_ms, stats),
    }
}
