use std::path::{
  Path,
  PathBuf,
};

use anyhow::{
  Context,
  Result,
};
use serde::Deserialize;
use the_notes_loader::{
  config::ConfigReadError,
  expand_tilde,
};
use the_notes_session::SessionConfig;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
  /// Theme for rendered documents; the built-in default when unset.
  pub theme:   Option<String>,
  pub session: SessionConfig,
  pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
  pub dir:        Option<PathBuf>,
  pub mirror_dir: Option<PathBuf>,
  pub themes_dir: Option<PathBuf>,
}

impl StorageConfig {
  pub fn notes_dir(&self) -> PathBuf {
    self
      .dir
      .as_deref()
      .map_or_else(the_notes_loader::notes_dir, expand_tilde)
  }

  pub fn mirror_dir(&self) -> Option<PathBuf> {
    self.mirror_dir.as_deref().map(expand_tilde)
  }

  pub fn themes_dir(&self) -> PathBuf {
    self
      .themes_dir
      .as_deref()
      .map_or_else(the_notes_loader::themes_dir, expand_tilde)
  }
}

impl Config {
  /// The global config merged with the workspace one.
  pub fn load() -> Result<Self> {
    let value = the_notes_loader::config::layered_config_value().map_err(describe)?;
    Self::from_value(value)
  }

  /// Only the file at `path`, which has to exist.
  pub fn load_file(path: &Path) -> Result<Self> {
    let value = the_notes_loader::config::read_config_value(path)
      .map_err(describe)?
      .with_context(|| format!("config file {} does not exist", path.display()))?;
    Self::from_value(value)
  }

  fn from_value(value: toml::Value) -> Result<Self> {
    value.try_into().context("invalid config")
  }
}

fn describe(err: ConfigReadError) -> anyhow::Error {
  anyhow::Error::new(err).context("could not load config")
}
