//! Session state and activity signals.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse lifecycle state of a session, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Process spawned, CLI not known to be ready yet
    Starting,
    /// The CLI is actively working
    Running,
    /// The CLI is idle and waiting for the user
    Attention,
    /// A fatal pattern was detected in the output (latched)
    Error,
    /// The process exited (terminal)
    Dead,
}

impl SessionState {
    /// Whether the session is idle and waiting on the user.
    pub fn is_awaiting_input(&self) -> bool {
        matches!(self, SessionState::Attention)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Starting => write!(f, "starting"),
            SessionState::Running => write!(f, "running"),
            SessionState::Attention => write!(f, "attention"),
            SessionState::Error => write!(f, "error"),
            SessionState::Dead => write!(f, "dead"),
        }
    }
}

/// Fine-grained signal an adapter derives from raw output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Working,
    Attention,
    #[default]
    Unknown,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activity::Working => write!(f, "working"),
            Activity::Attention => write!(f, "attention"),
            Activity::Unknown => write!(f, "unknown"),
        }
    }
}
