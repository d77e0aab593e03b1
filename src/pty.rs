//! External PTY collaborator (spec §6): spawns a command under a
//! pseudo-terminal and bridges its output to a callback.
//!
//! Grounded on this codebase's own PTY reader-thread pattern
//! (`agent::spawn::spawn_cli_reader_thread`): a blocking `read` loop runs
//! on a dedicated OS thread (the one place in this crate that is not a
//! tokio task - reading a PTY master is an inherently blocking syscall)
//! and forwards bytes to the caller's callback.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::thread;

use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};

use crate::error::PtyError;

pub struct PtySession {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    reader_thread: Option<thread::JoinHandle<()>>,
}

/// Spawn `command` under a PTY of `cols`x`rows`, invoking `on_data` with
/// each chunk of output read from the child. If `passthrough` is set, the
/// local terminal's stdin/stdout are wired bidirectionally in addition to
/// `on_data`; in headless mode only the callback fires.
pub fn spawn(
    command: &[String],
    env: &HashMap<String, String>,
    cols: u16,
    rows: u16,
    passthrough: bool,
    mut on_data: impl FnMut(&[u8]) + Send + 'static,
) -> Result<PtySession, PtyError> {
    if command.is_empty() {
        return Err(PtyError::Spawn("command must have at least one argument".into()));
    }

    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })
        .map_err(|e| PtyError::Spawn(e.to_string()))?;

    let mut cmd = CommandBuilder::new(&command[0]);
    for arg in &command[1..] {
        cmd.arg(arg);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }

    let child = pair.slave.spawn_command(cmd).map_err(|e| PtyError::Spawn(e.to_string()))?;
    drop(pair.slave);

    let mut reader = pair.master.try_clone_reader()?;
    let writer = pair.master.take_writer()?;

    let reader_thread = thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if passthrough {
                        let _ = std::io::stdout().write_all(&buf[..n]);
                        let _ = std::io::stdout().flush();
                    }
                    on_data(&buf[..n]);
                }
                Err(e) => {
                    log::warn!("PTY read error: {e}");
                    break;
                }
            }
        }
    });

    Ok(PtySession { master: pair.master, writer, child, reader_thread: Some(reader_thread) })
}

impl PtySession {
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), PtyError> {
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.master
            .resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| PtyError::Spawn(e.to_string()))
    }

    pub fn kill(&mut self) -> Result<(), PtyError> {
        self.child.kill().map_err(|e| PtyError::Spawn(e.to_string()))
    }

    /// Non-blocking: `None` while still running, `Some(code)` once exited.
    pub fn exited(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(i32::try_from(status.exit_code()).unwrap_or(-1)),
            _ => None,
        }
    }

    /// Block until the child exits and the reader thread drains.
    pub fn wait(&mut self) -> Result<(), PtyError> {
        let _ = self.child.wait();
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}
