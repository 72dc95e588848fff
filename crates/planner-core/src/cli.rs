use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::sources::SourceFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        let key = k.trim();
        if key.is_empty() {
            return Err(anyhow!("empty key in override: {s}"));
        }
        Ok(Self {
            key: key.to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "planner",
    version,
    about = "Year planner: Monday-first week grid with stacked event bars",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Config file to load instead of the default location.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(
        long = "set",
        value_name = "KEY=VALUE",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    #[command(subcommand)]
    pub command: Command,
}

/// Where the events come from. `--demo` wins over `--events`, which wins
/// over `events.file` from the config.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct EventArgs {
    /// JSON events document; `-` reads stdin.
    #[arg(long = "events", value_name = "PATH")]
    pub events: Option<PathBuf>,

    #[arg(long = "source", value_enum)]
    pub source: Option<SourceFormat>,

    /// Use the built-in February 2026 sample events.
    #[arg(long = "demo", conflicts_with = "events")]
    pub demo: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Draw the year grid.
    Grid {
        /// Calendar year; non-numeric input means the current year.
        #[arg(long = "year")]
        year: Option<String>,

        #[command(flatten)]
        source: EventArgs,

        /// Print the computed layout as JSON instead of drawing it.
        #[arg(long = "json")]
        json: bool,
    },
    /// List the weeks of a year with their month-start labels.
    Weeks {
        #[arg(long = "year")]
        year: Option<String>,
    },
    /// Show the layout of the week containing a date.
    Week {
        #[arg(long = "date", value_name = "YYYY-MM-DD")]
        date: String,

        #[command(flatten)]
        source: EventArgs,
    },
    /// List normalized events, optionally narrowed to a window.
    Events {
        #[command(flatten)]
        source: EventArgs,

        #[arg(long = "from", value_name = "RFC3339")]
        from: Option<String>,

        #[arg(long = "until", value_name = "RFC3339")]
        until: Option<String>,
    },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
