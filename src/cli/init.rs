//! Init command implementation

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use termdeck::config::CONFIG_PATH;

/// Default configuration content for termdeck init
pub const DEFAULT_CONFIG: &str = r#"# termdeck configuration
# =====================
#
# All durations are in milliseconds.

# ============================================================================
# SETTINGS
# ============================================================================
#
#   buffer_max_bytes         - Output history kept per session (default: 5 MiB)
#   idle_check_interval_ms   - How often running sessions are checked for silence
#   idle_timeout_ms          - Silence after which a running session counts as waiting
#   state_debounce_ms        - Debounce for state changes (except into "running")
#   startup_grace_ms         - Time before a silent new session counts as waiting
#   session_watch_timeout_ms - How long to look for a conversation id after /status
#   cache_skip_window_ms     - Lifetime of an unconsumed skip-cache flag
#   color_scheme             - "dark" or "light", passed to CLIs as COLORFGBG

[settings]
buffer_max_bytes = 5242880
idle_check_interval_ms = 10000
idle_timeout_ms = 60000
state_debounce_ms = 100
startup_grace_ms = 1500
session_watch_timeout_ms = 5000
cache_skip_window_ms = 2000
color_scheme = "dark"

# ============================================================================
# PROVIDERS
# ============================================================================
#
# One optional section per provider: shell, claude, codex, gemini.
#
#   binary          - Executable to launch instead of the default name
#   args            - Arguments added to every launch
#   env             - Extra environment variables
#   mode            - Default permission/approval mode
#   idle_timeout_ms - Idle timeout for this provider only

[provider.claude]
args = []

[provider.codex]
args = []

[provider.gemini]
# Gemini's UI goes quiet quickly when done
idle_timeout_ms = 30000
"#;

/// Write a default config file.
///
/// Defaults to `.termdeck/config.toml` in the working directory.
pub fn init_command(work_dir: &Path, config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let config_path = config_path.unwrap_or_else(|| work_dir.join(CONFIG_PATH));

    if config_path.exists() && !force {
        bail!(
            "Configuration already exists: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    if let Some(parent) = config_path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    std::fs::write(&config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("Created: {}", config_path.display());

    Ok(())
}
