use std::{
  io,
  sync::Arc,
};

use the_notes_lib::DocumentId;
use the_notes_render::RenderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("document {0} not found")]
  NotFound(DocumentId),
  #[error("storage io error: {0}")]
  Io(#[from] io::Error),
  #[error("could not encode or decode document: {0}")]
  Serialize(#[from] serde_json::Error),
}

impl StoreError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound(_))
  }
}

#[derive(Debug, Error)]
pub enum MirrorError {
  #[error("mirror io error: {0}")]
  Io(#[from] io::Error),
  #[error("could not write front matter: {0}")]
  FrontMatter(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
  /// Shared so the same failure can sit in several update notifications.
  #[error(transparent)]
  Store(Arc<StoreError>),
  #[error(transparent)]
  Render(Arc<RenderError>),
  #[error("no document is open")]
  NoDocument,
  #[error("switch to another document was abandoned: {0}")]
  SwitchAborted(String),
}

impl From<StoreError> for SessionError {
  fn from(err: StoreError) -> Self {
    Self::Store(Arc::new(err))
  }
}

impl From<RenderError> for SessionError {
  fn from(err: RenderError) -> Self {
    Self::Render(Arc::new(err))
  }
}
