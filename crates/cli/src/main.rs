//! Sleuth CLI: the main entry point.
//!
//! Commands:
//! - `research`: Run a research session (interactive follow-ups by default)
//! - `knowledge`: Show the findings of the last session
//! - `config`: Show, validate or locate the configuration

use clap::{Parser, Subcommand};
use sleuth_config::AppConfig;
use std::path::PathBuf;

mod commands;
mod terminal;

#[derive(Parser)]
#[command(name = "sleuth", about = "Sleuth — autonomous research assistant", version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file to use instead of ~/.sleuth/config.toml
    #[arg(short, long, global = true, env = "SLEUTH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a query
    Research {
        /// The research query; asked for on stdin when omitted
        query: Option<String>,

        /// Run a single round and exit without asking for follow-ups
        #[arg(long)]
        once: bool,

        /// Do not print the model's reasoning channel
        #[arg(long)]
        hide_reasoning: bool,
    },

    /// Show the stored findings
    Knowledge {
        /// Print the findings as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (API key redacted)
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the path of the configuration file
    Path,
    /// Print a configuration file with every default filled in
    Default,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the research output
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    match cli.command {
        Commands::Research { query, once, hide_reasoning } => {
            let config = load_config(&config_path)?;
            commands::research::run(&config, query, once, !hide_reasoning).await?
        }
        Commands::Knowledge { json } => {
            let config = load_config(&config_path)?;
            commands::knowledge::show(&config, json).await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&config_path)?,
            ConfigAction::Validate => commands::config_cmd::validate(&config_path)?,
            ConfigAction::Path => commands::config_cmd::path(&config_path),
            ConfigAction::Default => commands::config_cmd::default_config(),
        },
    }

    Ok(())
}

fn load_config(path: &std::path::Path) -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load_with_env(path).map_err(|e| format!("Failed to load config: {e}").into())
}
