//! Google Gemini CLI adapter

use std::time::Duration;

use super::text::{ActivityDetector, ActivityPatterns, ErrorDetector, PromptDetector};
use super::{Adapter, SpawnConfig, SpawnOptions, agent_spawn_config};
use crate::domain::{Activity, AdapterError, AdapterErrorKind, PromptInfo, ProviderKind};

const PATTERNS: ActivityPatterns = ActivityPatterns {
    working: &["esc to cancel"],
    attention: &["type your message"],
};

const ERRORS: &[(&str, AdapterErrorKind)] = &[
    ("no previous sessions found", AdapterErrorKind::SessionNotFound),
    ("invalid session identifier", AdapterErrorKind::SessionNotFound),
    ("command not found: gemini", AdapterErrorKind::BinaryNotFound),
    ("gemini: command not found", AdapterErrorKind::BinaryNotFound),
    (
        "gemini_api_key environment variable not found",
        AdapterErrorKind::AuthRequired,
    ),
];

const QUESTIONS: &[&str] = &["allow execution", "apply this change?"];

/// The Gemini spinner is not always redrawn while tools run, so fall back to
/// the idle checker sooner than for other agents.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GeminiAdapter {
    activity: ActivityDetector,
    errors: ErrorDetector,
    prompts: PromptDetector,
}

impl GeminiAdapter {
    pub fn new() -> Self {
        Self {
            activity: ActivityDetector::new(PATTERNS),
            errors: ErrorDetector::new(ERRORS),
            prompts: PromptDetector::new(QUESTIONS),
        }
    }
}

impl Default for GeminiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for GeminiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn build_spawn_config(&self, options: &SpawnOptions) -> SpawnConfig {
        let mut args = Vec::new();

        if let Some(id) = options.resume_id() {
            args.push("--resume".to_string());
            args.push(id.to_string());
        }

        match options.mode.as_deref() {
            Some("yolo") => args.push("--yolo".to_string()),
            Some(mode) if !mode.is_empty() => {
                args.push("--approval-mode".to_string());
                args.push(mode.to_string());
            }
            _ => {}
        }

        args.extend(options.extra_args.iter().cloned());
        if let Some(prompt) = options.initial_prompt.as_deref().filter(|p| !p.is_empty()) {
            args.push("--prompt-interactive".to_string());
            args.push(prompt.to_string());
        }

        agent_spawn_config(ProviderKind::Gemini, options, args)
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

    fn idle_timeout(&self) -> Option<Duration> {
        Some(IDLE_TIMEOUT)
    }
}
