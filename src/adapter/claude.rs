//! Claude Code CLI adapter

use super::text::{ActivityDetector, ActivityPatterns, ErrorDetector, PromptDetector};
use super::{Adapter, SpawnConfig, SpawnOptions, agent_spawn_config};
use crate::domain::{Activity, AdapterError, AdapterErrorKind, PromptInfo, ProviderKind};

const PATTERNS: ActivityPatterns = ActivityPatterns {
    working: &["esc to interrupt", "ctrl+c to interrupt"],
    attention: &["? for shortcuts", "do you want to"],
};

const ERRORS: &[(&str, AdapterErrorKind)] = &[
    (
        "no conversation found with session id",
        AdapterErrorKind::SessionNotFound,
    ),
    ("command not found: claude", AdapterErrorKind::BinaryNotFound),
    ("claude: command not found", AdapterErrorKind::BinaryNotFound),
    ("invalid api key", AdapterErrorKind::AuthRequired),
    ("please run /login", AdapterErrorKind::AuthRequired),
];

const QUESTIONS: &[&str] = &["do you want to"];

pub struct ClaudeAdapter {
    activity: ActivityDetector,
    errors: ErrorDetector,
    prompts: PromptDetector,
}

impl ClaudeAdapter {
    pub fn new() -> Self {
        Self {
            activity: ActivityDetector::new(PATTERNS),
            errors: ErrorDetector::new(ERRORS),
            prompts: PromptDetector::new(QUESTIONS),
        }
    }
}

impl Default for ClaudeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for ClaudeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn build_spawn_config(&self, options: &SpawnOptions) -> SpawnConfig {
        let mut args = Vec::new();

        if let Some(id) = options.resume_id() {
            args.push("--resume".to_string());
            args.push(id.to_string());
        } else if let Some(id) = &options.conversation_id {
            args.push("--session-id".to_string());
            args.push(id.clone());
        }

        if let Some(mode) = options.mode.as_deref().filter(|m| !m.is_empty()) {
            args.push("--permission-mode".to_string());
            args.push(mode.to_string());
        }

        // Extra args go before the positional prompt
        args.extend(options.extra_args.iter().cloned());
        if let Some(prompt) = options.initial_prompt.as_deref().filter(|p| !p.is_empty()) {
            args.push(prompt.to_string());
        }

        agent_spawn_config(ProviderKind::Claude, options, args)
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
