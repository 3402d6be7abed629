//! Run command implementation
//!
//! Runs one session in the foreground: output goes to stdout, each line read
//! from stdin is sent to the session followed by Enter, and state changes are
//! logged. Ctrl+C kills the session.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use termdeck::{ProviderKind, SessionState};
use termdeck::client::{ClientSync, SessionUpdate, forward_events};
use termdeck::config::Config;
use termdeck::session::{CreateOptions, PtySpawner, SessionManager};

/// Options for `termdeck run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub provider: ProviderKind,
    pub resume: Option<String>,
    pub mode: Option<String>,
    pub prompt: Option<String>,
    pub shell: Option<String>,
    pub extra_args: Vec<String>,
}

/// Run a session until its process exits. Returns the exit code.
pub async fn run_command(work_dir: &Path, config: Config, options: RunOptions) -> Result<i32> {
    let cwd = work_dir
        .canonicalize()
        .with_context(|| format!("Invalid working directory: {}", work_dir.display()))?;

    let (tx, rx) = mpsc::unbounded_channel();
    let manager = SessionManager::new(config, Arc::new(PtySpawner::new()), tx);

    let sync = Arc::new(Mutex::new(ClientSync::new()));
    let session_id = uuid::Uuid::new_v4().to_string();
    let mut subscription = sync
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .subscribe(&session_id);
    tokio::spawn(forward_events(rx, sync.clone()));

    let mut create = CreateOptions::new(cwd, options.provider);
    create.existing_conversation_id = options.resume;
    create.resuming = create.existing_conversation_id.is_some();
    if options.provider == ProviderKind::Claude && !create.resuming {
        // Claude accepts a caller-chosen id for a fresh conversation
        create.conversation_id = Some(uuid::Uuid::new_v4().to_string());
    }
    create.mode = options.mode;
    create.initial_prompt = options.prompt;
    create.shell = options.shell;
    create.extra_args = options.extra_args;
    if let Some((cols, rows)) = terminal_size() {
        create.cols = cols;
        create.rows = rows;
    }
    let conversation_id = create.conversation_id.clone();

    manager.create(&session_id, create)?;
    info!(
        "[termdeck] Started {} session {}{}",
        options.provider,
        session_id,
        conversation_id
            .map(|id| format!(" (conversation {id})"))
            .unwrap_or_default()
    );

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut stdout = std::io::stdout();
    let mut exit_code = 0;

    loop {
        tokio::select! {
            update = subscription.receiver.recv() => {
                let Some(update) = update else { break };
                match update {
                    SessionUpdate::Data { data, .. } => {
                        stdout.write_all(data.as_bytes())?;
                        stdout.flush()?;
                    }
                    SessionUpdate::StateChange { new_state, .. } => {
                        info!("[termdeck] Session is {}", new_state);
                        // Read now: the session is gone once it exits
                        if new_state == SessionState::Error {
                            if let Some(error) = manager.session_error(&session_id) {
                                warn!("[termdeck] {}", error);
                            }
                        }
                    }
                    SessionUpdate::Prompt(prompt) => {
                        let options: Vec<String> = prompt
                            .options
                            .iter()
                            .map(|o| format!("{} [{}]", o.label, o.input))
                            .collect();
                        info!("[termdeck] Prompt: {} ({})", prompt.message, options.join(", "));
                    }
                    SessionUpdate::SessionInvalid => {
                        warn!("[termdeck] The conversation to resume does not exist");
                    }
                    SessionUpdate::SessionDetected { conversation_id } => {
                        info!("[termdeck] Conversation id: {}", conversation_id);
                    }
                    SessionUpdate::QuickRunReady { .. } => {}
                    SessionUpdate::Exit { exit_code: code } => {
                        exit_code = code;
                        break;
                    }
                }
            }
            line = stdin.next_line(), if stdin_open => {
                match line? {
                    Some(line) => {
                        if !manager.write(&session_id, &format!("{line}\r")) {
                            warn!("[termdeck] Session is gone, input dropped");
                        }
                    }
                    None => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("[termdeck] Interrupted, killing session");
                manager.kill(&session_id);
            }
        }
    }

    manager.kill_all();
    manager.stop_idle_checker();

    Ok(exit_code)
}

/// Current terminal size from the environment, if the shell exports it.
fn terminal_size() -> Option<(u16, u16)> {
    let cols = std::env::var("COLUMNS").ok()?.parse().ok()?;
    let rows = std::env::var("LINES").ok()?.parse().ok()?;
    Some((cols, rows))
}
