//! Per-provider overrides (`[provider.<name>]`)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Overrides for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Binary to run instead of the provider's default name
    #[serde(default)]
    pub binary: Option<String>,

    /// Arguments added before the caller's extra args on every spawn
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables for the spawned process
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Default permission/approval mode when the caller gives none
    #[serde(default)]
    pub mode: Option<String>,

    /// Idle timeout override for this provider
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
}

impl ProviderConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}
