//! CLI for the fetchq scheduler.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use fetchq_core::config;

use commands::{run_completions, run_config, run_get, run_man};

/// Top-level CLI for fetchq.
#[derive(Debug, Parser)]
#[command(name = "fetchq")]
#[command(about = "fetchq: per-host queued fetches over libcurl", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch URLs and print every event as it is delivered.
    Get(GetArgs),

    /// Show the config file path and the effective configuration.
    Config,

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Print the man page (roff) to stdout.
    Man,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// URLs to fetch (http, https, ftp, file, ...).
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Referer sent with every request.
    #[arg(long, value_name = "URL")]
    pub referer: Option<String>,

    /// Report any non-2xx HTTP status as an error.
    #[arg(long = "only-2xx")]
    pub only_2xx: bool,

    /// POST this application/x-www-form-urlencoded body.
    #[arg(long, value_name = "STR", conflicts_with = "fields")]
    pub data: Option<String>,

    /// POST a multipart form field; repeatable.
    #[arg(long = "field", value_name = "NAME=VALUE")]
    pub fields: Vec<String>,

    /// Use the configured cookie jar.
    #[arg(long)]
    pub cookies: bool,

    /// Print one JSON object per event.
    #[arg(long)]
    pub json: bool,

    /// Print the SHA-256 of each finished body.
    #[arg(long)]
    pub sha256: bool,
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Get(args) => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_get(&cfg, &args)?;
            }
            CliCommand::Config => {
                let cfg = config::load_or_init()?;
                run_config(&cfg)?;
            }
            CliCommand::Completions { shell } => run_completions(shell)?,
            CliCommand::Man => run_man()?,
        }

        Ok(())
    }
}
