pub mod aggregate;
pub mod cli;
pub mod config;
pub mod datetime;
pub mod format;
pub mod layout;
pub mod model;
pub mod month;
pub mod providers;
pub mod screens;
pub mod settings;
pub mod template;
pub mod weather;
pub mod xml;

use std::collections::BTreeMap;
use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

/// Placeholder name to substituted
/// value.
pub type OutputMap =
  BTreeMap<String, String>;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    command = ?cli.command,
    workdir = %cli.workdir.display(),
    "starting inkdash"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref(),
    std::env::vars()
  )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );
  debug!(files = ?cfg.loaded_files, "configuration loaded");

  let workdir =
    config::expand_tilde(&cli.workdir);
  let client =
    providers::http::client()
      .context(
        "failed to set up HTTP client"
      )?;
  let ctx = screens::Context::new(
    cfg,
    workdir,
    datetime::now_utc(),
    client
  );

  dispatch(&ctx, cli.command)?;

  info!("done");
  Ok(())
}

pub fn dispatch(
  ctx: &screens::Context,
  command: cli::Command
) -> anyhow::Result<()> {
  match command {
    | cli::Command::Layout => {
      screens::run_layout(ctx)
    }
    | cli::Command::Weather => {
      screens::run_weather(ctx)
    }
    | cli::Command::Calendar => {
      screens::run_calendar(ctx)
    }
    | cli::Command::Todo => {
      screens::run_todo(ctx)
    }
    | cli::Command::Month => {
      screens::run_month(ctx)
    }
    | cli::Command::Render => {
      screens::run_render(ctx)
    }
  }
  .with_context(|| {
    format!("{command:?} command failed")
  })
}
