//! The live editing state of the one open document.
//!
//! A [`Session`] keeps two copies of the title and body: the working text the
//! user is editing and the last text known to be durable. The session is
//! dirty whenever they differ. Saves run against a [`SaveSnapshot`] captured
//! at request time, so typing during a save leaves the session dirty again
//! once [`Session::mark_saved`] records what actually landed.

use std::collections::BTreeSet;

use chrono::{
  DateTime,
  Utc,
};
use serde::{
  Deserialize,
  Serialize,
};

use crate::{
  document::{
    Document,
    DocumentFlags,
    DocumentId,
  },
  range::{
    self,
    TextRange,
  },
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
  #[default]
  Source,
  Rendered,
  Split,
}

impl ViewMode {
  /// Whether the rendered preview is visible in this mode.
  pub const fn shows_rendered(self) -> bool {
    matches!(self, Self::Rendered | Self::Split)
  }
}

/// Immutable copy of the text a save is going to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSnapshot {
  pub id:    DocumentId,
  pub title: String,
  pub body:  String,
}

#[derive(Debug, Clone)]
pub struct Session {
  /// Metadata and the last persisted copy.
  document:         Document,
  title:            String,
  body:             String,
  last_saved_title: String,
  last_saved_body:  String,
  selection:        TextRange,
  view_mode:        ViewMode,
}

impl Session {
  pub fn open(document: Document) -> Self {
    Self {
      title: document.title.clone(),
      body: document.body.clone(),
      last_saved_title: document.title.clone(),
      last_saved_body: document.body.clone(),
      selection: TextRange::point(0),
      view_mode: ViewMode::Source,
      document,
    }
  }

  pub fn id(&self) -> DocumentId {
    self.document.id
  }

  pub fn document(&self) -> &Document {
    &self.document
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn body(&self) -> &str {
    &self.body
  }

  pub fn last_saved_title(&self) -> &str {
    &self.last_saved_title
  }

  pub fn last_saved_body(&self) -> &str {
    &self.last_saved_body
  }

  pub fn selection(&self) -> TextRange {
    self.selection
  }

  pub fn view_mode(&self) -> ViewMode {
    self.view_mode
  }

  pub fn is_dirty(&self) -> bool {
    self.body != self.last_saved_body || self.title != self.last_saved_title
  }

  /// Returns whether the title changed.
  pub fn set_title(&mut self, title: impl Into<String>) -> bool {
    let title = title.into();
    if title == self.title {
      return false;
    }
    self.title = title;
    true
  }

  /// Returns whether the body changed.
  pub fn set_body(&mut self, body: impl Into<String>) -> bool {
    let body = body.into();
    if body == self.body {
      return false;
    }
    self.body = body;
    self.selection = self.selection.clamp(range::utf16_len(&self.body));
    true
  }

  /// Splice `text` over `range` and put the cursor after the inserted text.
  /// Returns whether the body changed.
  pub fn replace(&mut self, range: TextRange, text: &str) -> bool {
    let range = range.clamp(range::utf16_len(&self.body));
    self.selection = TextRange::point(range.start + range::utf16_len(text));
    if self.body[range.byte_range(&self.body)] == *text {
      return false;
    }
    self.body = range::splice(&self.body, range, text);
    true
  }

  pub fn set_selection(&mut self, selection: TextRange) {
    self.selection = selection.clamp(range::utf16_len(&self.body));
  }

  /// Returns the previous mode.
  pub fn set_view_mode(&mut self, mode: ViewMode) -> ViewMode {
    std::mem::replace(&mut self.view_mode, mode)
  }

  pub fn flags(&self) -> DocumentFlags {
    self.document.flags
  }

  pub fn set_flags(&mut self, flags: DocumentFlags) {
    self.document.flags = flags;
  }

  pub fn tags(&self) -> &BTreeSet<String> {
    &self.document.tags
  }

  pub fn set_tags(&mut self, tags: BTreeSet<String>) {
    self.document.tags = tags;
  }

  pub fn snapshot(&self) -> SaveSnapshot {
    SaveSnapshot {
      id:    self.id(),
      title: self.title.clone(),
      body:  self.body.clone(),
    }
  }

  /// Whether `snapshot` matches what is already durable.
  pub fn is_saved(&self, snapshot: &SaveSnapshot) -> bool {
    snapshot.id == self.id()
      && snapshot.title == self.last_saved_title
      && snapshot.body == self.last_saved_body
  }

  /// The document to hand to storage for `snapshot`, stamped at `now`.
  pub fn document_for_save(&self, snapshot: &SaveSnapshot, now: DateTime<Utc>) -> Document {
    let mut document = self.document.clone();
    document.title = snapshot.title.clone();
    document.body = snapshot.body.clone();
    document.touch(now);
    document
  }

  /// Record that `saved` is now durable. Documents of another id are ignored.
  pub fn mark_saved(&mut self, saved: &Document) {
    if saved.id != self.id() {
      return;
    }
    self.last_saved_title = saved.title.clone();
    self.last_saved_body = saved.body.clone();
    self.document.title = saved.title.clone();
    self.document.body = saved.body.clone();
    self.document.updated = saved.updated;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn session(body: &str) -> Session {
    Session::open(Document::new("title", body))
  }

  #[test]
  fn dirty_tracks_both_fields() {
    let mut session = session("body");
    assert!(!session.is_dirty());
    session.set_body("body!");
    assert!(session.is_dirty());
    session.set_body("body");
    assert!(!session.is_dirty());
    session.set_title("other");
    assert!(session.is_dirty());
  }

  #[test]
  fn edits_during_save_stay_dirty() {
    let mut session = session("one");
    session.set_body("two");
    let snapshot = session.snapshot();
    let saved = session.document_for_save(&snapshot, Utc::now());
    session.set_body("three");
    session.mark_saved(&saved);
    assert_eq!(session.last_saved_body(), "two");
    assert!(session.is_dirty());
    assert!(session.is_saved(&snapshot));
  }

  #[test]
  fn save_of_other_document_is_ignored() {
    let mut session = session("one");
    session.set_body("two");
    let other = Document::new("x", "two");
    session.mark_saved(&other);
    assert!(session.is_dirty());
  }

  #[test]
  fn selection_is_clamped_to_body() {
    let mut session = session("hello world");
    session.set_selection(TextRange::new(6, 5));
    session.set_body("hello");
    assert_eq!(session.selection(), TextRange::new(5, 0));
    session.set_selection(TextRange::new(2, 100));
    assert_eq!(session.selection(), TextRange::new(2, 3));
  }

  #[test]
  fn replace_moves_cursor_after_insert() {
    let mut session = session("hello world");
    assert!(session.replace(TextRange::new(6, 5), "there"));
    assert_eq!(session.body(), "hello there");
    assert_eq!(session.selection(), TextRange::point(11));
  }

  #[test]
  fn replace_reports_no_op_edits() {
    let mut session = session("hello world");
    assert!(!session.replace(TextRange::point(3), ""));
    assert!(!session.replace(TextRange::new(0, 5), "hello"));
    assert_eq!(session.selection(), TextRange::point(5));
    assert!(!session.is_dirty());
  }

  #[test]
  fn rendered_modes() {
    assert!(!ViewMode::Source.shows_rendered());
    assert!(ViewMode::Rendered.shows_rendered());
    assert!(ViewMode::Split.shows_rendered());
  }
}
