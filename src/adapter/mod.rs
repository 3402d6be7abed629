//! Provider adapters.
//!
//! An adapter knows two things about one CLI provider: how to launch it, and
//! how to read its output. Reading produces three kinds of signal:
//!
//! - **activity** ([`Activity`]) - is the CLI working or waiting for the user
//! - **errors** ([`AdapterError`]) - known fatal or resume-invalidating messages
//! - **prompts** ([`PromptInfo`]) - interactive confirmations the UI can answer
//!
//! Adapters never touch the session table. Each spawn gets a fresh adapter from
//! [`adapter_for`], so any buffering an adapter does is scoped to one process.

mod claude;
mod codex;
mod gemini;
mod shell;
pub(crate) mod text;

pub use claude::ClaudeAdapter;
pub use codex::CodexAdapter;
pub use gemini::GeminiAdapter;
pub use shell::ShellAdapter;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{Activity, AdapterError, PromptInfo, ProviderKind};

/// Caller-supplied inputs for building a spawn command.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    /// Working directory of the process
    pub cwd: PathBuf,
    /// Id to assign to a fresh conversation, when the CLI supports it
    pub conversation_id: Option<String>,
    /// Id of a stored conversation to continue
    pub existing_conversation_id: Option<String>,
    /// Whether the caller is resuming rather than starting fresh
    pub resuming: bool,
    /// Shell to run (or to launch the CLI through); `$SHELL` when unset
    pub shell: Option<String>,
    /// Prompt to hand to the CLI on start
    pub initial_prompt: Option<String>,
    /// Extra CLI arguments, appended after the adapter's own
    pub extra_args: Vec<String>,
    /// Provider-specific permission/approval mode
    pub mode: Option<String>,
    /// Binary override from config
    pub binary: Option<String>,
}

impl SpawnOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            ..Default::default()
        }
    }

    /// The conversation to resume, if any.
    ///
    /// An explicit existing id always means resume. Otherwise the fresh
    /// `conversation_id` is resumed only when `resuming` is set.
    pub fn resume_id(&self) -> Option<&str> {
        match (&self.existing_conversation_id, self.resuming) {
            (Some(id), _) => Some(id.as_str()),
            (None, true) => self.conversation_id.as_deref(),
            (None, false) => None,
        }
    }
}

/// How to launch a provider process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpawnConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    /// Typed into the terminal (followed by Enter) once the process is up
    pub post_spawn_command: Option<String>,
}

/// Provider-specific strategy for spawning a CLI and interpreting its output.
pub trait Adapter: Send {
    /// The provider this adapter handles.
    fn kind(&self) -> ProviderKind;

    /// Build the launch command, deciding between a fresh start and a resume.
    fn build_spawn_config(&self, options: &SpawnOptions) -> SpawnConfig;

    /// Derive an activity signal from a raw output chunk.
    ///
    /// Returns `None` when nothing changed relative to `current`.
    fn detect_activity(&mut self, chunk: &str, current: Activity) -> Option<Activity>;

    /// Recognize a known error message. Messages split across chunks are
    /// reported once the last piece arrives.
    fn detect_error(&mut self, chunk: &str) -> Option<AdapterError>;

    /// Recognize an interactive prompt, at most once per appearance.
    fn detect_prompt(&mut self, chunk: &str) -> Option<PromptInfo>;

    /// Idle timeout override; the manager default applies when `None`.
    fn idle_timeout(&self) -> Option<Duration> {
        None
    }

    /// Command the user types to make the CLI print its conversation id.
    fn session_query_command(&self) -> Option<&'static str> {
        None
    }
}

/// Create a fresh adapter for a provider.
pub fn adapter_for(kind: ProviderKind) -> Box<dyn Adapter> {
    match kind {
        ProviderKind::Shell => Box::new(ShellAdapter::new()),
        ProviderKind::Claude => Box::new(ClaudeAdapter::new()),
        ProviderKind::Codex => Box::new(CodexAdapter::new()),
        ProviderKind::Gemini => Box::new(GeminiAdapter::new()),
    }
}

/// The shell to use: explicit choice, then `$SHELL`, then a platform default.
pub(crate) fn resolve_shell(shell: Option<&str>) -> String {
    if let Some(shell) = shell.filter(|s| !s.trim().is_empty()) {
        return shell.to_string();
    }
    if cfg!(windows) {
        return "powershell.exe".to_string();
    }
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            if cfg!(target_os = "macos") {
                "/bin/zsh".to_string()
            } else {
                "/bin/bash".to_string()
            }
        })
}

/// Launch `program args...` through the user's login shell.
///
/// Running through `-l -c` picks up the PATH from the user's shell profile;
/// `exec` replaces the shell so the CLI owns the PTY (and the pid we kill).
pub(crate) fn login_shell_command(
    shell: Option<&str>,
    program: &str,
    args: &[String],
) -> (String, Vec<String>) {
    if cfg!(windows) {
        let mut cmd_args = vec!["/C".to_string(), program.to_string()];
        cmd_args.extend(args.iter().cloned());
        return ("cmd.exe".to_string(), cmd_args);
    }

    let mut parts = vec!["exec".to_string(), text::shell_escape(program)];
    parts.extend(args.iter().map(|a| text::shell_escape(a)));
    (
        resolve_shell(shell),
        vec!["-l".to_string(), "-c".to_string(), parts.join(" ")],
    )
}

/// Build a login-shell spawn config for an agent CLI.
///
/// `args` is the complete CLI argument list, extra args included.
pub(crate) fn agent_spawn_config(
    kind: ProviderKind,
    options: &SpawnOptions,
    args: Vec<String>,
) -> SpawnConfig {
    let program = options
        .binary
        .clone()
        .or_else(|| kind.default_binary().map(str::to_string))
        .unwrap_or_else(|| kind.as_str().to_string());

    let (command, args) = login_shell_command(options.shell.as_deref(), &program, &args);
    SpawnConfig {
        command,
        args,
        env: HashMap::new(),
        post_spawn_command: None,
    }
}
