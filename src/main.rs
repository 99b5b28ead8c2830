//! # chatprep CLI
//!
//! The `chatprep` binary drives the data-preparation pipeline: scaffolding
//! the data tree, staging normalized chat and journal data, rendering
//! training files, and summarizing the results.
//!
//! ## Usage
//!
//! ```bash
//! chatprep --config ./config/chatprep.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chatprep init` | Create the data directory tree |
//! | `chatprep stage chat` | Group normalized chat files into staging blocks |
//! | `chatprep stage text` | Turn journal lines into staging records |
//! | `chatprep preview <file>` | Print the blocks one chat file would produce |
//! | `chatprep train` | Render staging files in the training format |
//! | `chatprep stats` | Summarize staging output |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `chatprep=info`).

use anyhow::Result;
use chatprep::config::{self, Config};
use chatprep::progress::ProgressMode;
use chatprep::{loader, scaffold, stage, stats, train};
use chatprep_core::format::TrainingFormat;
use chatprep_core::group::group_messages;
use chatprep_core::models::StagedChat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// chatprep — prepare chat logs and journals for persona fine-tuning.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/chatprep.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "chatprep",
    about = "chatprep — prepare chat logs and journal entries for persona fine-tuning",
    version,
    long_about = "chatprep groups normalized chat messages into alternating user/assistant \
    conversation blocks, splits them into train/valid staging files, and renders those \
    files in MLX chat or [INST] instruct training formats."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/chatprep.toml")]
    config: PathBuf,

    /// Progress output on stderr: `off`, `human`, or `json`.
    ///
    /// Defaults to `human` when stderr is a terminal, `off` otherwise.
    #[arg(long, global = true)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory tree.
    ///
    /// Creates `0-raw`, `1-normalized`, `2-staging` and `3-training` under
    /// the configured root. Runs without a config file; safe to repeat.
    Init {
        /// Data root (overrides `[paths].root`).
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Stage normalized data into train/valid JSONL files.
    ///
    /// Kind: `chat` (grouped conversation blocks) or `text` (journal lines).
    Stage {
        /// `chat` or `text`.
        kind: String,

        /// Input directory (defaults to `1-normalized/<kind>` under the root).
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output directory (defaults to `2-staging/<kind>` under the root).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Count blocks and records without writing files.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the conversation blocks one normalized chat file produces.
    Preview {
        /// Path to a normalized chat JSON file.
        file: PathBuf,
    },

    /// Render staging files into the training format.
    Train {
        /// Staging directory (defaults to `2-staging/chat`).
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output directory (defaults to `3-training`).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Override `[training].format`: `chat` or `instruct`.
        #[arg(long)]
        format: Option<String>,
    },

    /// Summarize staging output.
    Stats,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatprep=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    // Commands that don't require config
    if let Commands::Init { root } = &cli.command {
        let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
        let root = root.clone().unwrap_or(cfg.paths.root);
        scaffold::run_init(&root)?;
        return Ok(());
    }

    let mut cfg = config::load_config(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Init { .. } => unreachable!(),
        Commands::Stage {
            kind,
            input,
            output,
            dry_run,
        } => {
            let reporter = progress.reporter();
            stage::run_stage(&cfg, &kind, input, output, dry_run, reporter.as_ref())?;
        }
        Commands::Preview { file } => {
            let messages = loader::read_chat_file(&file)?;
            let report = group_messages(messages, &cfg.grouping.to_core()?);
            for block in report.blocks {
                println!("{}", serde_json::to_string(&StagedChat::from(block))?);
            }
            eprintln!(
                "discarded groups: {}, skipped openers: {}",
                report.discarded, report.skipped_openers
            );
        }
        Commands::Train {
            input,
            output,
            format,
        } => {
            if let Some(f) = format {
                cfg.training.format = f.parse::<TrainingFormat>()?;
            }
            train::run_train(&cfg, input, output)?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg)?;
        }
    }

    Ok(())
}
