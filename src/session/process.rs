//! Process spawning behind a small trait seam.
//!
//! The manager never talks to `portable-pty` directly: it asks a
//! [`ProcessSpawner`] for a [`ProcessHandle`] and hands over callbacks for
//! output and exit. [`PtySpawner`] is the real implementation; tests plug in a
//! scripted one.

use anyhow::{Context, Result};
use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::thread;

/// Everything needed to start a process in a terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    pub cols: u16,
    pub rows: u16,
}

/// Receives decoded output, in order.
pub type DataCallback = Box<dyn FnMut(String) + Send>;
/// Receives the exit code once all output has been delivered.
pub type ExitCallback = Box<dyn FnOnce(i32) + Send>;

/// Callbacks a spawner must drive for one process.
///
/// Contract: `on_data` is called from a single thread in output order, and
/// `on_exit` is called exactly once, after the last `on_data`. Both may fire
/// before [`ProcessSpawner::spawn`] returns.
pub struct ProcessCallbacks {
    pub on_data: DataCallback,
    pub on_exit: ExitCallback,
}

/// Control surface of a running process.
pub trait ProcessHandle: Send {
    fn write(&mut self, data: &[u8]) -> Result<()>;
    fn resize(&mut self, cols: u16, rows: u16) -> Result<()>;
    /// Forcefully terminate. Returns once the signal is sent, not when the process is gone.
    fn kill(&mut self) -> Result<()>;
    fn pid(&self) -> Option<u32>;
}

/// Starts processes.
pub trait ProcessSpawner: Send + Sync {
    fn spawn(
        &self,
        request: SpawnRequest,
        callbacks: ProcessCallbacks,
    ) -> Result<Box<dyn ProcessHandle>>;
}

/// Spawns processes in a native pseudo-terminal.
///
/// Each process gets one blocking reader thread that decodes output, drives
/// `on_data`, then reaps the child and calls `on_exit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PtySpawner;

impl PtySpawner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessSpawner for PtySpawner {
    fn spawn(
        &self,
        request: SpawnRequest,
        callbacks: ProcessCallbacks,
    ) -> Result<Box<dyn ProcessHandle>> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: request.rows,
                cols: request.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to open PTY")?;

        let mut cmd = CommandBuilder::new(&request.command);
        cmd.args(&request.args);
        cmd.cwd(&request.cwd);
        for (key, value) in &request.env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .with_context(|| format!("Failed to spawn {} in PTY", request.command))?;
        // Only the child keeps the slave open, so the reader sees EOF when it exits
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .context("Failed to clone PTY reader")?;
        let writer = pair
            .master
            .take_writer()
            .context("Failed to take PTY writer")?;
        let killer = child.clone_killer();
        let pid = child.process_id();

        thread::Builder::new()
            .name(format!("pty-reader-{}", pid.unwrap_or_default()))
            .spawn(move || read_until_exit(reader, child, callbacks))
            .context("Failed to start PTY reader thread")?;

        tracing::debug!(command = %request.command, ?pid, "spawned pty process");

        Ok(Box::new(PtyProcess {
            master: pair.master,
            writer,
            killer,
            pid,
        }))
    }
}

fn read_until_exit(
    mut reader: Box<dyn Read + Send>,
    mut child: Box<dyn Child + Send + Sync>,
    callbacks: ProcessCallbacks,
) {
    let ProcessCallbacks {
        mut on_data,
        on_exit,
    } = callbacks;
    let mut decoder = Utf8Decoder::default();
    let mut buf = [0u8; 8192];

    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let text = decoder.decode(&buf[..n]);
                if !text.is_empty() {
                    on_data(text);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            // EIO once the child side is closed
            Err(_) => break,
        }
    }

    let tail = decoder.finish();
    if !tail.is_empty() {
        on_data(tail);
    }

    let exit_code = match child.wait() {
        Ok(status) => i32::try_from(status.exit_code()).unwrap_or(i32::MAX),
        Err(e) => {
            tracing::warn!(error = %e, "failed to reap pty child");
            -1
        }
    };
    on_exit(exit_code);
}

struct PtyProcess {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    pid: Option<u32>,
}

impl ProcessHandle for PtyProcess {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to resize PTY")
    }

    fn kill(&mut self) -> Result<()> {
        // SIGKILL the whole process group: agent CLIs leave helper processes
        // behind on SIGHUP/SIGTERM
        #[cfg(unix)]
        {
            if let Some(pid) = self.pid.and_then(|p| i32::try_from(p).ok()) {
                let rc = unsafe { libc::kill(-pid, libc::SIGKILL) };
                if rc == 0 {
                    return Ok(());
                }
                let rc = unsafe { libc::kill(pid, libc::SIGKILL) };
                if rc == 0 {
                    return Ok(());
                }
            }
        }

        self.killer.kill().context("Failed to kill process")
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

/// Incremental UTF-8 decoder that carries incomplete trailing bytes.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode as much as possible; invalid bytes become U+FFFD.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = rest.to_vec();
        out
    }

    /// Flush whatever is left at end of stream.
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }
}
