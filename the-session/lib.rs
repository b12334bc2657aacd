//! The editing session around a single open note.
//!
//! [`SessionController`] ties the pure state in `the-notes-lib` to storage,
//! the markdown mirror and the preview renderer. All IO runs on tokio tasks;
//! results come back through the controller's event queue.

pub mod autosave;
pub mod config;
pub mod controller;
pub mod error;
pub mod mirror;
pub mod render;
pub mod store;

pub use config::{
  AutoSaveConfig,
  RenderConfig,
  SessionConfig,
};
pub use controller::{
  LoadSource,
  Phase,
  SessionController,
  SessionEvent,
  SessionUpdate,
};
pub use error::{
  MirrorError,
  SessionError,
  StoreError,
};
pub use mirror::{
  FileMirror,
  MarkdownMirror,
  NoMirror,
};
pub use store::{
  FolderStore,
  MemoryStore,
  Storage,
};
