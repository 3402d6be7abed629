use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use termdeck::ProviderKind;
use termdeck::config::Config;

mod cli;

#[derive(Parser)]
#[command(name = "termdeck")]
#[command(about = "Supervise interactive coding-agent CLIs in pseudo-terminals")]
#[command(version)]
struct Cli {
    /// Working directory for sessions (defaults to current directory)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Path to the config file (defaults to .termdeck/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session in the foreground
    Run {
        /// Provider to launch: shell, claude, codex or gemini
        #[arg(long, default_value = "shell")]
        provider: ProviderKind,

        /// Conversation id to resume
        #[arg(long)]
        resume: Option<String>,

        /// Permission/approval mode passed to the CLI
        #[arg(long)]
        mode: Option<String>,

        /// Initial prompt
        #[arg(long)]
        prompt: Option<String>,

        /// Shell to use instead of $SHELL
        #[arg(long)]
        shell: Option<String>,

        /// Extra arguments passed through to the CLI
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Show configured providers and whether their binaries are installed
    Providers,

    /// Initialize a new .termdeck/config.toml configuration file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Determine the working directory
    let work_dir = cli.path.unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Commands::Init { force } => {
            cli::init::init_command(&work_dir, cli.config, force)?;
        }
        Commands::Providers => {
            let config = load_config(&work_dir, cli.config)?;
            cli::providers::providers_command(&config)?;
        }
        Commands::Run {
            provider,
            resume,
            mode,
            prompt,
            shell,
            args,
        } => {
            let config = load_config(&work_dir, cli.config)?;
            let options = cli::run::RunOptions {
                provider,
                resume,
                mode,
                prompt,
                shell,
                extra_args: args,
            };
            let code = cli::run::run_command(&work_dir, config, options).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
    }

    Ok(())
}

fn load_config(work_dir: &std::path::Path, config_path: Option<PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::from_file(&path),
        None => Config::from_dir(work_dir),
    }
}
