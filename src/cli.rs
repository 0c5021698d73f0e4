//! Command-line interface for bookvoice
//!
//! Provides argument parsing using clap derive macros.

use crate::config::{Config, ResumeStrategyKind};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Resumable text to verified speech
#[derive(Parser, Debug)]
#[command(name = "bookvoice", version, about = "Resumable text to verified speech")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log errors, no progress bar
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a timeout into seconds.
///
/// Accepts bare numbers (seconds) and anything `humantime` understands
/// (`90s`, `2m`, `1m30s`).
fn parse_timeout_secs(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_secs())
        .map_err(|e| e.to_string())
}

/// Resume strategy as spelled on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeStrategyArg {
    /// Ledger watermark only
    Log,
    /// Ledger reconciled with artifacts on disk and the upload marker
    LogAndDisk,
}

impl From<ResumeStrategyArg> for ResumeStrategyKind {
    fn from(arg: ResumeStrategyArg) -> Self {
        match arg {
            ResumeStrategyArg::Log => ResumeStrategyKind::Log,
            ResumeStrategyArg::LogAndDisk => ResumeStrategyKind::LogAndDisk,
        }
    }
}

/// Options of the `run` command that override the configuration
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Source document (.txt or .fb2)
    #[arg(value_name = "SOURCE")]
    pub source: Option<PathBuf>,

    /// Output directory
    #[arg(long, short = 'o', value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Starting voice (e.g., Alloy, Echo)
    #[arg(long, value_name = "VOICE")]
    pub voice: Option<String>,

    /// Starting style (e.g., Calm)
    #[arg(long, value_name = "STYLE")]
    pub style: Option<String>,

    /// Output sample rate in Hz
    #[arg(long, value_name = "HZ")]
    pub sample_rate: Option<u32>,

    /// Request timeout. Examples: 90, 90s, 2m
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout_secs)]
    pub timeout: Option<u64>,

    /// Keep every artifact on local disk even when store credentials are set
    #[arg(long)]
    pub no_offload: bool,

    /// How to find where to resume
    #[arg(long, value_enum, value_name = "STRATEGY")]
    pub resume_strategy: Option<ResumeStrategyArg>,
}

impl RunArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) -> crate::error::Result<()> {
        if let Some(source) = &self.source {
            config.source.path = Some(source.clone());
        }
        if let Some(output) = &self.output {
            config.output.dir = output.clone();
        }
        if let Some(voice) = &self.voice {
            config.synthesis.voice = voice.clone();
        }
        if let Some(style) = &self.style {
            config.synthesis.style = style.clone();
        }
        if let Some(hz) = self.sample_rate {
            config.audio.sample_rate = hz.try_into().map_err(|message| {
                crate::error::BookvoiceError::ConfigInvalidValue {
                    key: "audio.sample_rate".to_string(),
                    message,
                }
            })?;
        }
        if let Some(secs) = self.timeout {
            config.synthesis.request_timeout_secs = secs;
        }
        if let Some(strategy) = self.resume_strategy {
            config.resume.strategy = strategy.into();
        }
        Ok(())
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synthesize a document, resuming where the last run stopped
    Run(RunArgs),

    /// Show fragment count, resume watermarks and resident artifacts
    Status {
        /// Source document
        #[arg(value_name = "SOURCE")]
        source: Option<PathBuf>,
    },

    /// Segment a document without synthesizing anything
    Fragments {
        /// Source document
        #[arg(value_name = "SOURCE")]
        source: Option<PathBuf>,

        /// Print every fragment
        #[arg(long)]
        show: bool,
    },

    /// Merge resident audio artifacts into range files
    Merge {
        /// Fragments per range file
        #[arg(long, value_name = "N")]
        group_size: Option<usize>,
    },

    /// List voices and styles
    Voices,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Get a configuration value by key (e.g., audio.min_size_kb)
    Get {
        /// Dotted key path
        key: String,
    },
    /// Print the effective configuration as TOML
    Dump,
}
