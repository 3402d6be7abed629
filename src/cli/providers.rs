//! Providers command implementation

use anyhow::Result;
use std::path::{Path, PathBuf};

use termdeck::ProviderKind;
use termdeck::config::Config;

/// List providers, the binary each one runs, and whether it is on PATH.
pub fn providers_command(config: &Config) -> Result<()> {
    println!("Providers:\n");

    for kind in ProviderKind::ALL {
        let overrides = config.provider(kind);
        let binary = overrides
            .binary
            .clone()
            .or_else(|| kind.default_binary().map(str::to_string));

        let Some(binary) = binary else {
            println!("  {:<8} (login shell)", kind.as_str());
            continue;
        };

        match find_executable(&binary) {
            Some(path) => println!("  {:<8} {} -> {}", kind.as_str(), binary, path.display()),
            None => println!("  {:<8} {} (not found on PATH)", kind.as_str(), binary),
        }

        if let Some(timeout) = overrides.idle_timeout() {
            println!("           idle timeout: {:?}", timeout);
        }
    }

    let unknown = config.unknown_providers();
    if !unknown.is_empty() {
        println!("\nIgnored config sections: {}", unknown.join(", "));
    }

    Ok(())
}

/// Resolve a binary name the way a shell would, without running it.
fn find_executable(binary: &str) -> Option<PathBuf> {
    let candidate = Path::new(binary);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|p| p.is_file())
}
