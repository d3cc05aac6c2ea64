pub mod assistant;
pub mod auth;
pub mod bundle;
pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod datastore;
pub mod error;
pub mod import;
pub mod inventory;
pub mod model;
pub mod notify;
pub mod recipes;
pub mod render;
pub mod session;
pub mod store;
pub mod tasks;

use std::ffi::OsString;

use anyhow::Context;
use clap::{
  CommandFactory,
  Parser
};
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args);
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting hestia CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let Some(command) = cli.command
  else {
    cli::GlobalCli::command()
      .print_help()?;
    return Ok(());
  };

  let mut cfg = config::Config::load(
    cli.hestiarc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let storage =
    datastore::DataStore::open_dir(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;
  let mut store =
    store::AppStore::open(storage)
      .context(
        "failed to restore session"
      )?;

  let renderer =
    render::Renderer::new(&cfg)?;

  commands::dispatch(
    &mut store,
    &cfg,
    &renderer,
    command
  )?;

  info!("done");
  Ok(())
}
