use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

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

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Header values and slot coordinates into a fresh output SVG.
    Layout,
    /// Forecast, alert and header values into a fresh output SVG.
    Weather,
    /// Upcoming events into the existing output SVG.
    Calendar,
    /// Open CalDAV todos into the existing output SVG.
    Todo,
    /// The month grid into the existing output SVG.
    Month,
    /// Everything in one pass with a single write.
    Render,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "inkdash",
    version,
    about = "Renders calendar, todo and weather data onto an e-ink SVG template"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Env-style configuration file (default: $INKDASH_CONFIG or ~/.inkdashrc).
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Override one configuration key; repeatable.
    #[arg(
        long = "set",
        value_name = "KEY=VALUE",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    /// Directory holding the templates and the output SVG.
    #[arg(long = "workdir", default_value = ".", global = true)]
    pub workdir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
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

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parses_subcommand_and_global_flags() {
        let cli = GlobalCli::try_parse_from([
            "inkdash",
            "render",
            "-vv",
            "--set",
            "TODO_COUNT=2",
            "--set",
            "LAYOUT_POLICY = even-spacing",
            "--workdir",
            "/tmp/screen",
        ])
        .expect("parse");

        assert_eq!(cli.command, Command::Render);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.workdir, PathBuf::from("/tmp/screen"));
        assert_eq!(
            cli.overrides[1],
            KeyVal {
                key: "LAYOUT_POLICY".to_string(),
                value: "even-spacing".to_string()
            }
        );
    }

    #[test]
    fn rejects_malformed_override() {
        assert!("NOVALUE".parse::<KeyVal>().is_err());
        assert!("=x".parse::<KeyVal>().is_err());
        assert!(GlobalCli::try_parse_from(["inkdash", "layout", "--set", "oops"]).is_err());
    }

    #[test]
    fn subcommand_is_required() {
        assert!(GlobalCli::try_parse_from(["inkdash"]).is_err());
    }
}
