use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PromptInfo, SessionState};

/// Sequence number of a buffered output chunk.
///
/// Signed so that [`NO_SEQ`] can stand for "nothing yet" on the wire.
pub type Seq = i64;

/// Sequence number meaning "before the first chunk".
pub const NO_SEQ: Seq = -1;

/// An event emitted by the session manager to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Filtered output, already stored in the session's ring buffer under `seq`
    Data {
        session_id: String,
        data: String,
        seq: Seq,
    },
    /// The process exited; the session no longer exists
    Exit { session_id: String, exit_code: i32 },
    /// The session's coarse state changed
    StateChange {
        session_id: String,
        new_state: SessionState,
        /// `None` for the initial `starting` announcement
        old_state: Option<SessionState>,
    },
    /// The CLI reported that the conversation it was asked to resume does not exist
    SessionInvalid { session_id: String },
    /// A conversation id was extracted from a status-query reply
    SessionDetected {
        session_id: String,
        conversation_id: String,
    },
    /// The CLI is showing an interactive prompt
    Prompt {
        session_id: String,
        prompt: PromptInfo,
    },
}

impl SessionEvent {
    /// The session this event belongs to.
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::Data { session_id, .. }
            | SessionEvent::Exit { session_id, .. }
            | SessionEvent::StateChange { session_id, .. }
            | SessionEvent::SessionInvalid { session_id }
            | SessionEvent::SessionDetected { session_id, .. }
            | SessionEvent::Prompt { session_id, .. } => session_id,
        }
    }

    /// Short name of the event kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Data { .. } => "data",
            SessionEvent::Exit { .. } => "exit",
            SessionEvent::StateChange { .. } => "state_change",
            SessionEvent::SessionInvalid { .. } => "session_invalid",
            SessionEvent::SessionDetected { .. } => "session_detected",
            SessionEvent::Prompt { .. } => "prompt",
        }
    }
}

/// Summary row returned by `list_sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    /// Wall-clock time of the most recent output (spawn time if none yet)
    pub last_output_time: DateTime<Utc>,
    pub state: SessionState,
}
