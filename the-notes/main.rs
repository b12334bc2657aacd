use std::process::ExitCode;

use anyhow::{
  Context,
  Result,
};
use clap::Parser;

use crate::{
  cli::{
    Cli,
    Command,
  },
  config::Config,
};

mod cli;
mod commands;
mod config;

fn setup_logging(verbosity: u8) -> Result<()> {
  let level = match verbosity {
    0 => log::LevelFilter::Warn,
    1 => log::LevelFilter::Info,
    2 => log::LevelFilter::Debug,
    _ => log::LevelFilter::Trace,
  };

  fern::Dispatch::new()
    .format(|out, message, record| {
      out.finish(format_args!(
        "{} {} [{}] {}",
        chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
        record.target(),
        record.level(),
        message
      ))
    })
    .level(level)
    .chain(fern::log_file(the_notes_loader::log_file())?)
    .apply()?;
  Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
  let cli = Cli::parse();

  the_notes_loader::initialize_config_file(cli.config_file.clone());
  the_notes_loader::initialize_log_file(cli.log_file.clone());
  setup_logging(cli.verbosity).context("failed to initialize logging")?;

  let config = match &cli.config_file {
    Some(path) => Config::load_file(path)?,
    None => Config::load()?,
  };
  log::debug!("loaded config: {config:?}");

  match cli.command {
    Command::Render(args) => commands::render(args, &config).await,
    Command::Search(args) => commands::search(args),
    Command::Import(args) => commands::import(args, &config).await,
  }
}
