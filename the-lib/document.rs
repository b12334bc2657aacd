//! Persistent note documents.

use std::{
  collections::BTreeSet,
  fmt,
  str::FromStr,
};

use chrono::{
  DateTime,
  Utc,
};
use serde::{
  Deserialize,
  Serialize,
};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
  pub fn new() -> Self {
    Self(Uuid::new_v4())
  }

  pub const fn from_uuid(uuid: Uuid) -> Self {
    Self(uuid)
  }

  pub const fn as_uuid(&self) -> &Uuid {
    &self.0
  }
}

impl Default for DocumentId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for DocumentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.hyphenated())
  }
}

impl FromStr for DocumentId {
  type Err = uuid::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Uuid::parse_str(s).map(Self)
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentFlags {
  pub starred: bool,
  pub pinned:  bool,
  pub deleted: bool,
}

/// A note as the storage layer sees it.
///
/// `updated` never precedes `created`; use [`Document::touch`] instead of
/// writing the field directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  pub id:      DocumentId,
  pub title:   String,
  pub body:    String,
  pub created: DateTime<Utc>,
  pub updated: DateTime<Utc>,
  #[serde(default)]
  pub flags:   DocumentFlags,
  #[serde(default)]
  pub tags:    BTreeSet<String>,
}

impl Document {
  pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
    Self::with_id(DocumentId::new(), title, body, Utc::now())
  }

  pub fn with_id(
    id: DocumentId,
    title: impl Into<String>,
    body: impl Into<String>,
    created: DateTime<Utc>,
  ) -> Self {
    Self {
      id,
      title: title.into(),
      body: body.into(),
      created,
      updated: created,
      flags: DocumentFlags::default(),
      tags: BTreeSet::new(),
    }
  }

  /// Record a modification at `now`. Clock skew can not move `updated` before
  /// `created`.
  pub fn touch(&mut self, now: DateTime<Utc>) {
    self.updated = now.max(self.created);
  }

  /// Title for display; untitled notes fall back to their first body line.
  pub fn display_title(&self) -> &str {
    let title = self.title.trim();
    if !title.is_empty() {
      return title;
    }
    self
      .body
      .lines()
      .map(str::trim)
      .find(|line| !line.is_empty())
      .map(|line| line.trim_start_matches('#').trim())
      .unwrap_or("Untitled")
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  #[test]
  fn touch_never_precedes_created() {
    let mut doc = Document::new("t", "b");
    let created = doc.created;
    doc.touch(created - Duration::hours(1));
    assert_eq!(doc.updated, created);
    doc.touch(created + Duration::seconds(5));
    assert!(doc.updated > doc.created);
  }

  #[test]
  fn id_roundtrips_through_display() {
    let id = DocumentId::new();
    let parsed: DocumentId = id.to_string().parse().unwrap();
    assert_eq!(parsed, id);
    assert!("not-a-uuid".parse::<DocumentId>().is_err());
  }

  #[test]
  fn display_title_falls_back_to_body() {
    let doc = Document::new("  ", "\n# Groceries\n- milk");
    assert_eq!(doc.display_title(), "Groceries");
    assert_eq!(Document::new("", "").display_title(), "Untitled");
  }

  #[test]
  fn missing_flags_and_tags_deserialize_to_defaults() {
    let doc = Document::new("t", "b");
    let mut value = serde_json::to_value(&doc).unwrap();
    let object = value.as_object_mut().unwrap();
    object.remove("flags");
    object.remove("tags");
    let back: Document = serde_json::from_value(value).unwrap();
    assert_eq!(back.flags, DocumentFlags::default());
    assert!(back.tags.is_empty());
  }
}
