//! Errors recognized in provider output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Known failure patterns an adapter can recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdapterErrorKind {
    /// The CLI could not find the conversation it was asked to resume
    SessionNotFound,
    /// The CLI binary is not installed or not on PATH
    BinaryNotFound,
    /// The CLI refused to start because credentials are missing or invalid
    AuthRequired,
}

impl AdapterErrorKind {
    /// Fatal errors move the session into the `error` state.
    ///
    /// `SessionNotFound` is not fatal: the CLI keeps running, the caller just
    /// has to discard its stored resume id.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AdapterErrorKind::SessionNotFound)
    }
}

impl fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterErrorKind::SessionNotFound => write!(f, "SESSION_NOT_FOUND"),
            AdapterErrorKind::BinaryNotFound => write!(f, "BINARY_NOT_FOUND"),
            AdapterErrorKind::AuthRequired => write!(f, "AUTH_REQUIRED"),
        }
    }
}

/// A typed error detected in a session's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    /// The output line that matched
    pub message: String,
}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
