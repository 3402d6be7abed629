use std::path::PathBuf;

use crate::domain::ProviderKind;

/// Errors returned by [`SessionManager::create`](super::SessionManager::create).
///
/// Operations on unknown sessions are not errors; they return `false`/`None`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("working directory does not exist: {}", .0.display())]
    InvalidCwd(PathBuf),

    #[error("failed to spawn {provider} session {session_id}: {reason}")]
    Spawn {
        session_id: String,
        provider: ProviderKind,
        reason: String,
    },
}
