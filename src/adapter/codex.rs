//! OpenAI Codex CLI adapter

use super::text::{ActivityDetector, ActivityPatterns, ErrorDetector, PromptDetector};
use super::{Adapter, SpawnConfig, SpawnOptions, agent_spawn_config};
use crate::domain::{Activity, AdapterError, AdapterErrorKind, PromptInfo, ProviderKind};

const PATTERNS: ActivityPatterns = ActivityPatterns {
    working: &["esc to interrupt"],
    attention: &["⏎ send", "to get started, describe a task"],
};

const ERRORS: &[(&str, AdapterErrorKind)] = &[
    ("no saved session found", AdapterErrorKind::SessionNotFound),
    ("no rollout found for", AdapterErrorKind::SessionNotFound),
    ("command not found: codex", AdapterErrorKind::BinaryNotFound),
    ("codex: command not found", AdapterErrorKind::BinaryNotFound),
    ("not logged in", AdapterErrorKind::AuthRequired),
];

const QUESTIONS: &[&str] = &[
    "would you like to run the following command",
    "would you like to make the following edits",
    "allow command?",
];

pub struct CodexAdapter {
    activity: ActivityDetector,
    errors: ErrorDetector,
    prompts: PromptDetector,
}

impl CodexAdapter {
    pub fn new() -> Self {
        Self {
            activity: ActivityDetector::new(PATTERNS),
            errors: ErrorDetector::new(ERRORS),
            prompts: PromptDetector::new(QUESTIONS),
        }
    }
}

impl Default for CodexAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for CodexAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Codex
    }

    fn build_spawn_config(&self, options: &SpawnOptions) -> SpawnConfig {
        let mut args = Vec::new();

        // `codex resume <id>` is a subcommand, so it leads
        if let Some(id) = options.resume_id() {
            args.push("resume".to_string());
            args.push(id.to_string());
        }

        match options.mode.as_deref() {
            Some("full-auto") => args.push("--full-auto".to_string()),
            Some(mode) if !mode.is_empty() => {
                args.push("--ask-for-approval".to_string());
                args.push(mode.to_string());
            }
            _ => {}
        }

        args.extend(options.extra_args.iter().cloned());
        if let Some(prompt) = options.initial_prompt.as_deref().filter(|p| !p.is_empty()) {
            args.push(prompt.to_string());
        }

        agent_spawn_config(ProviderKind::Codex, options, args)
    }

    fn detect_activity(&mut self, chunk: &str, current: Activity) -> Option<Activity> {
        self.activity.detect(chunk, current)
    }

    fn detect_error(&mut self, chunk: &str) -> Option<AdapterError> {
        self.errors.detect(chunk)
    }

    fn detect_prompt(&mut self, chunk: &str) -> Option<PromptInfo> {
        self.prompts.detect(chunk)
    }

    fn session_query_command(&self) -> Option<&'static str> {
        Some("/status")
    }
}
