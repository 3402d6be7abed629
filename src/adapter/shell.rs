//! Plain interactive shell.

use std::collections::HashMap;

use super::{Adapter, SpawnConfig, SpawnOptions, resolve_shell};
use crate::domain::{Activity, AdapterError, PromptInfo, ProviderKind};

/// Adapter for a plain shell.
///
/// A shell gives no reliable busy/idle markers, so this adapter reports
/// nothing and leaves liveness to the idle checker. Resume hints are ignored.
#[derive(Debug, Default)]
pub struct ShellAdapter;

impl ShellAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Adapter for ShellAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Shell
    }

    fn build_spawn_config(&self, options: &SpawnOptions) -> SpawnConfig {
        let command = options
            .binary
            .clone()
            .unwrap_or_else(|| resolve_shell(options.shell.as_deref()));

        let mut args = Vec::new();
        if cfg!(windows) && command.to_ascii_lowercase().contains("powershell") {
            args.push("-NoLogo".to_string());
        }
        args.extend(options.extra_args.iter().cloned());

        SpawnConfig {
            command,
            args,
            env: HashMap::new(),
            post_spawn_command: options
                .initial_prompt
                .clone()
                .filter(|p| !p.trim().is_empty()),
        }
    }

    fn detect_activity(&mut self, _chunk: &str, _current: Activity) -> Option<Activity> {
        None
    }

    fn detect_error(&mut self, _chunk: &str) -> Option<AdapterError> {
        None
    }

    fn detect_prompt(&mut self, _chunk: &str) -> Option<PromptInfo> {
        None
    }
}
