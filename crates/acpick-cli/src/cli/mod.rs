//! CLI entry and dispatch.

use std::path::PathBuf;

use acpick_core::{config, logging};
use anyhow::{Context, Result};
use clap::Parser;

mod commands;
mod scenario;

#[derive(Parser)]
#[command(name = "acpick")]
#[command(version)]
#[command(about = "Drive the account picker sign-in flow from scripted scenarios")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Replay a scenario against the picker and print what it shows
    Run {
        /// Scenario file (TOML)
        #[arg(value_name = "SCENARIO")]
        scenario: PathBuf,

        /// Override the launch mode (default, choose-account, seamless)
        #[arg(long)]
        mode: Option<String>,

        /// Preferred account id, or the sign-in target in seamless mode
        #[arg(long, value_name = "ID")]
        account: Option<String>,

        /// Require a device unlock before every sign-in attempt
        #[arg(long)]
        requires_unlock: bool,

        /// Print JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
        Commands::Run {
            scenario,
            mode,
            account,
            requires_unlock,
            json,
        } => {
            let config = config::Config::load().context("load config")?;
            let _log_guard = logging::init(&config.logging, cli.verbose)?;

            let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
            rt.block_on(commands::run::run(
                &config,
                commands::run::RunOptions {
                    scenario,
                    mode,
                    account,
                    requires_unlock,
                    json,
                },
            ))
        }
    }
}
