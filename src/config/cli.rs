use agquota_core::config::Settings;
use agquota_core::i18n::Language;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Antigravity quota monitor")]
pub struct Config {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Polling interval in seconds (at least 30)
    #[arg(short, long, global = true)]
    pub interval: Option<u64>,

    /// Display language (auto, en, ja)
    #[arg(short, long, global = true)]
    pub lang: Option<Language>,

    /// Print snapshots as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand (defaults to `watch`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Keep polling and print every update; Enter refreshes immediately
    Watch,
    /// Fetch quota once, print it and exit
    Status,
    /// Locate the language server and print its connection parameters
    Discover,
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Subcommand to run
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Watch)
    }

    /// Apply command line overrides on top of file settings.
    ///
    /// Called again on every config reload so flags keep precedence.
    pub fn merge_into(&self, settings: &mut Settings) {
        if let Some(secs) = self.interval {
            settings.polling_interval_ms = secs.saturating_mul(1000);
        }
        if let Some(lang) = self.lang {
            settings.language = lang;
        }
    }
}
