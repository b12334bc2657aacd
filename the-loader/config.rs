use std::{
  fs,
  io,
  path::Path,
};

/// Read a TOML config file into a raw value.
///
/// A missing file is not an error and yields `Ok(None)`; unreadable or
/// malformed files are reported so the caller can refuse to start.
pub fn read_config_value(path: &Path) -> Result<Option<toml::Value>, ConfigReadError> {
  let text = match fs::read_to_string(path) {
    Ok(text) => text,
    Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(err) => return Err(ConfigReadError::Io(err)),
  };
  toml::from_str(&text)
    .map(Some)
    .map_err(ConfigReadError::Parse)
}

/// The global config (`config_file()`) overlaid with the workspace-local one.
pub fn layered_config_value() -> Result<toml::Value, ConfigReadError> {
  let global = read_config_value(&crate::config_file())?;
  let local = read_config_value(&crate::workspace_config_file())?;
  let empty = || toml::Value::Table(toml::Table::new());

  Ok(match (global, local) {
    (Some(global), Some(local)) => crate::merge_toml_values(global, local, 3),
    (Some(value), None) | (None, Some(value)) => value,
    (None, None) => empty(),
  })
}

#[derive(Debug)]
pub enum ConfigReadError {
  Io(io::Error),
  Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigReadError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Io(err) => write!(f, "failed to read config: {err}"),
      Self::Parse(err) => write!(f, "failed to parse config: {err}"),
    }
  }
}

impl std::error::Error for ConfigReadError {}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn missing_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let value = read_config_value(&dir.path().join("absent.toml")).unwrap();
    assert!(value.is_none());
  }

  #[test]
  fn malformed_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "theme = ").unwrap();
    assert!(matches!(
      read_config_value(&path),
      Err(ConfigReadError::Parse(_))
    ));
  }
}
