//! Core domain types for termdeck

mod error;
mod event;
mod prompt;
mod provider;
mod state;

pub use error::{AdapterError, AdapterErrorKind};
pub use event::{NO_SEQ, Seq, SessionEvent, SessionInfo};
pub use prompt::{PromptInfo, PromptKind, PromptOption};
pub use provider::{ProviderKind, UnknownProvider};
pub use state::{Activity, SessionState};
