//! Pure editing-state core for the-notes.
//!
//! Nothing in here performs IO or spawns tasks: ranges, documents, the live
//! [`session::Session`] buffer, the search & replace engine and the edit
//! commands handed to a host text widget are all plain values.

pub mod document;
pub mod range;
pub mod search;
pub mod session;
pub mod widget;

pub use document::{
  Document,
  DocumentFlags,
  DocumentId,
};
pub use range::TextRange;
pub use session::{
  SaveSnapshot,
  Session,
  ViewMode,
};
