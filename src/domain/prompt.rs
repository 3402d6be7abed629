//! Structured interactive prompts detected in provider output.

use serde::{Deserialize, Serialize};

/// The shape of an interactive prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// A yes/no confirmation
    YesNo,
    /// A numbered menu of choices
    Choice,
}

/// One answer the user can pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOption {
    /// Label shown by the CLI (e.g. "Yes, and don't ask again")
    pub label: String,
    /// Keystrokes that select this option
    pub input: String,
}

impl PromptOption {
    pub fn new(label: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            input: input.into(),
        }
    }
}

/// A provider-specific prompt surfaced to the UI as a structured affordance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptInfo {
    pub kind: PromptKind,
    /// The question text, without decoration
    pub message: String,
    pub options: Vec<PromptOption>,
}

impl PromptInfo {
    /// A yes/no prompt answered with `y` / `n`.
    pub fn yes_no(message: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::YesNo,
            message: message.into(),
            options: vec![PromptOption::new("Yes", "y"), PromptOption::new("No", "n")],
        }
    }

    /// A numbered menu prompt.
    pub fn choice(message: impl Into<String>, options: Vec<PromptOption>) -> Self {
        Self {
            kind: PromptKind::Choice,
            message: message.into(),
            options,
        }
    }
}
