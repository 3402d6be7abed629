//! Settings configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::session::DEFAULT_MAX_BYTES;

/// Host terminal background, passed to CLIs through `COLORFGBG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Dark,
    Light,
}

impl ColorScheme {
    /// `COLORFGBG` value: foreground;background in the 16-color palette.
    pub fn colorfgbg(&self) -> &'static str {
        match self {
            ColorScheme::Dark => "15;0",
            ColorScheme::Light => "0;15",
        }
    }
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Output history kept per session, in bytes
    #[serde(default = "default_buffer_max_bytes")]
    pub buffer_max_bytes: usize,

    /// How often the idle checker sweeps running sessions
    #[serde(default = "default_idle_check_interval_ms")]
    pub idle_check_interval_ms: u64,

    /// Silence after which a running session is considered waiting.
    /// Providers may override this in `[provider.<name>]`.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Debounce window for every state change except into `running`
    #[serde(default = "default_state_debounce_ms")]
    pub state_debounce_ms: u64,

    /// Time after spawn before a silent `starting` session becomes `attention`
    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u64,

    /// How long to look for a conversation id after a status query
    #[serde(default = "default_session_watch_timeout_ms")]
    pub session_watch_timeout_ms: u64,

    /// How long a skip-cache flag stays armed if nothing consumes it
    #[serde(default = "default_cache_skip_window_ms")]
    pub cache_skip_window_ms: u64,

    /// Background hint for spawned CLIs
    #[serde(default)]
    pub color_scheme: ColorScheme,
}

fn default_buffer_max_bytes() -> usize {
    DEFAULT_MAX_BYTES
}

fn default_idle_check_interval_ms() -> u64 {
    10_000
}

fn default_idle_timeout_ms() -> u64 {
    60_000
}

fn default_state_debounce_ms() -> u64 {
    100
}

fn default_startup_grace_ms() -> u64 {
    1_500
}

fn default_session_watch_timeout_ms() -> u64 {
    5_000
}

fn default_cache_skip_window_ms() -> u64 {
    2_000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            buffer_max_bytes: default_buffer_max_bytes(),
            idle_check_interval_ms: default_idle_check_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            state_debounce_ms: default_state_debounce_ms(),
            startup_grace_ms: default_startup_grace_ms(),
            session_watch_timeout_ms: default_session_watch_timeout_ms(),
            cache_skip_window_ms: default_cache_skip_window_ms(),
            color_scheme: ColorScheme::default(),
        }
    }
}

impl Settings {
    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_millis(self.idle_check_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn state_debounce(&self) -> Duration {
        Duration::from_millis(self.state_debounce_ms)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    pub fn session_watch_timeout(&self) -> Duration {
        Duration::from_millis(self.session_watch_timeout_ms)
    }

    pub fn cache_skip_window(&self) -> Duration {
        Duration::from_millis(self.cache_skip_window_ms)
    }
}
