//! Plain-text mirror of stored notes.
//!
//! The mirror is best effort. Its failures are logged by the caller and never
//! undo a storage write that already succeeded.

use std::{
  collections::BTreeSet,
  io,
  path::{
    Path,
    PathBuf,
  },
};

use async_trait::async_trait;
use chrono::{
  DateTime,
  Utc,
};
use serde::{
  Deserialize,
  Serialize,
};
use the_notes_lib::{
  Document,
  DocumentFlags,
  DocumentId,
};

use crate::error::MirrorError;

const FENCE: &str = "+++";

#[async_trait]
pub trait FileMirror: Send + Sync {
  async fn write_file(&self, doc: &Document) -> Result<(), MirrorError>;

  async fn delete_file(&self, id: DocumentId) -> Result<(), MirrorError>;
}

/// Mirror that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMirror;

#[async_trait]
impl FileMirror for NoMirror {
  async fn write_file(&self, _doc: &Document) -> Result<(), MirrorError> {
    Ok(())
  }

  async fn delete_file(&self, _id: DocumentId) -> Result<(), MirrorError> {
    Ok(())
  }
}

/// Metadata block at the top of a mirrored note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontMatter {
  #[serde(default)]
  pub title:   String,
  pub created: Option<DateTime<Utc>>,
  pub updated: Option<DateTime<Utc>>,
  #[serde(default)]
  pub tags:    BTreeSet<String>,
  #[serde(default)]
  pub starred: bool,
  #[serde(default)]
  pub pinned:  bool,
}

impl FrontMatter {
  fn of(doc: &Document) -> Self {
    Self {
      title:   doc.title.clone(),
      created: Some(doc.created),
      updated: Some(doc.updated),
      tags:    doc.tags.clone(),
      starred: doc.flags.starred,
      pinned:  doc.flags.pinned,
    }
  }

  /// Build a fresh document from this metadata and `body`. Missing timestamps
  /// default to now.
  pub fn into_document(self, body: impl Into<String>) -> Document {
    let created = self.created.unwrap_or_else(Utc::now);
    let mut doc = Document::with_id(DocumentId::new(), self.title, body, created);
    doc.touch(self.updated.unwrap_or(created));
    doc.tags = self.tags;
    doc.flags = DocumentFlags {
      starred: self.starred,
      pinned:  self.pinned,
      deleted: false,
    };
    doc
  }
}

/// `+++` fenced toml front matter followed by the body.
pub fn to_markdown(doc: &Document) -> Result<String, MirrorError> {
  let meta = toml::to_string(&FrontMatter::of(doc))?;
  Ok(format!("{FENCE}\n{meta}{FENCE}\n\n{}", doc.body))
}

fn strip_line_break(text: &str) -> Option<&str> {
  text
    .strip_prefix('\n')
    .or_else(|| text.strip_prefix("\r\n"))
}

/// Split a mirrored note into its front matter and body. Text without a
/// parseable front matter block comes back whole with `None`.
///
/// The closing fence may be followed by one blank separator line, which is
/// not part of the body.
pub fn split_front_matter(text: &str) -> (Option<FrontMatter>, &str) {
  let Some(rest) = text.strip_prefix(FENCE).and_then(strip_line_break) else {
    return (None, text);
  };
  let Some(end) = rest.find(&format!("\n{FENCE}")) else {
    return (None, text);
  };
  let meta = &rest[..=end];
  let body = &rest[end + 1 + FENCE.len()..];
  let body = strip_line_break(body).unwrap_or(body);
  let body = strip_line_break(body).unwrap_or(body);
  match toml::from_str(meta) {
    Ok(front) => (Some(front), body),
    Err(err) => {
      log::debug!("ignoring malformed front matter: {err}");
      (None, text)
    },
  }
}

/// Writes `<id>.md` files into a directory.
#[derive(Debug, Clone)]
pub struct MarkdownMirror {
  dir: PathBuf,
}

impl MarkdownMirror {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn path(&self, id: DocumentId) -> PathBuf {
    self.dir.join(format!("{id}.md"))
  }
}

#[async_trait]
impl FileMirror for MarkdownMirror {
  async fn write_file(&self, doc: &Document) -> Result<(), MirrorError> {
    let text = to_markdown(doc)?;
    tokio::fs::create_dir_all(&self.dir).await?;
    tokio::fs::write(self.path(doc.id), text).await?;
    Ok(())
  }

  async fn delete_file(&self, id: DocumentId) -> Result<(), MirrorError> {
    match tokio::fs::remove_file(self.path(id)).await {
      Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
      _ => Ok(()),
    }
  }
}
