//! Sandbox ledger CLI library

pub mod commands;

use anyhow::Result;
use ledger_core::{Ledger, LedgerConfig};
use std::path::PathBuf;

// Re-export CLI types for testing
pub use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Inspect and restore files tracked from execution sandboxes")]
#[command(version, author, long_about = None)]
pub struct Cli {
    /// Database file (overrides the configuration and LEDGER_HOME)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the latest version of every tracked path in a project
    Files(commands::FilesOptions),

    /// List every version of one path
    History(commands::HistoryOptions),

    /// Print the content of a path (latest version by default)
    Show(commands::ShowOptions),

    /// Print the stored diff that produced a version
    Diff(commands::DiffOptions),

    /// Write the latest version of every path into a local directory
    Restore(commands::RestoreOptions),
}

impl Cli {
    /// Build the effective configuration from `--config` and `--db`.
    pub fn ledger_config(&self) -> Result<LedgerConfig> {
        let mut config = match &self.config {
            Some(path) => LedgerConfig::load(path)?,
            None => LedgerConfig::default(),
        };
        if let Some(db) = &self.db {
            config.database_path = Some(db.clone());
        }
        Ok(config)
    }

    pub async fn run(self) -> Result<()> {
        let ledger = Ledger::open(self.ledger_config()?)?;
        let result = self.command.run(&ledger).await;
        ledger.close()?;
        result
    }
}

impl Commands {
    pub async fn run(self, ledger: &Ledger) -> Result<()> {
        match self {
            Commands::Files(opts) => commands::list_files(ledger, opts).await,
            Commands::History(opts) => commands::history(ledger, opts).await,
            Commands::Show(opts) => commands::show(ledger, opts).await,
            Commands::Diff(opts) => commands::diff(ledger, opts).await,
            Commands::Restore(opts) => commands::restore(ledger, opts).await,
        }
    }
}
