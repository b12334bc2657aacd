use std::{
  io,
  path::PathBuf,
  time::Duration,
};

use thiserror::Error;

use crate::theme::ThemeError;

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
  #[error("markdown conversion failed: {0}")]
  Parse(String),
  #[error("theme {theme:?} could not be loaded: {source}")]
  ThemeLoad {
    theme:  String,
    #[source]
    source: ThemeError,
  },
  #[error("image {} could not be embedded: {source}", path.display())]
  ImageLoad {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("style asset {0:?} not found")]
  StyleAssetNotFound(String),
  #[error("render timed out after {0:?}")]
  Timeout(Duration),
  #[error("render was cancelled")]
  Cancelled,
  #[error("render task failed: {0}")]
  Internal(String),
}
