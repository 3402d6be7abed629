//! Provider kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The CLI a session runs.
///
/// This is a closed set: every kind is bound to exactly one adapter through
/// [`adapter_for`](crate::adapter::adapter_for).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Plain interactive shell
    #[default]
    Shell,
    /// Claude Code CLI
    Claude,
    /// OpenAI Codex CLI
    Codex,
    /// Google Gemini CLI
    Gemini,
}

impl ProviderKind {
    /// All provider kinds, in display order.
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Shell,
        ProviderKind::Claude,
        ProviderKind::Codex,
        ProviderKind::Gemini,
    ];

    /// Lowercase name used in config files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Shell => "shell",
            ProviderKind::Claude => "claude",
            ProviderKind::Codex => "codex",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Binary launched when the config does not override it.
    ///
    /// Returns `None` for the shell, which is resolved from `$SHELL` at spawn time.
    pub fn default_binary(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Shell => None,
            ProviderKind::Claude => Some("claude"),
            ProviderKind::Codex => Some("codex"),
            ProviderKind::Gemini => Some("gemini"),
        }
    }

    /// Whether this provider is an AI agent CLI (as opposed to a plain shell).
    pub fn is_agent(&self) -> bool {
        !matches!(self, ProviderKind::Shell)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shell" | "terminal" => Ok(ProviderKind::Shell),
            "claude" => Ok(ProviderKind::Claude),
            "codex" => Ok(ProviderKind::Codex),
            "gemini" => Ok(ProviderKind::Gemini),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}
