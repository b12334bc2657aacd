//! Durable document storage.

use std::{
  collections::HashMap,
  io,
  path::{
    Path,
    PathBuf,
  },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use the_notes_lib::{
  Document,
  DocumentId,
};

use crate::error::StoreError;

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait Storage: Send + Sync {
  async fn create(&self, doc: &Document) -> Result<()>;

  async fn fetch(&self, id: DocumentId) -> Result<Document>;

  /// Fails with [`StoreError::NotFound`] for a document that was never
  /// created or has been deleted.
  async fn update(&self, doc: &Document) -> Result<()>;

  async fn delete(&self, id: DocumentId) -> Result<()>;
}

/// Storage that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
  docs: Mutex<HashMap<DocumentId, Document>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_documents(docs: impl IntoIterator<Item = Document>) -> Self {
    let store = Self::new();
    store
      .docs
      .lock()
      .extend(docs.into_iter().map(|doc| (doc.id, doc)));
    store
  }

  pub fn get(&self, id: DocumentId) -> Option<Document> {
    self.docs.lock().get(&id).cloned()
  }

  pub fn len(&self) -> usize {
    self.docs.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.docs.lock().is_empty()
  }
}

#[async_trait]
impl Storage for MemoryStore {
  async fn create(&self, doc: &Document) -> Result<()> {
    self.docs.lock().insert(doc.id, doc.clone());
    Ok(())
  }

  async fn fetch(&self, id: DocumentId) -> Result<Document> {
    self.get(id).ok_or(StoreError::NotFound(id))
  }

  async fn update(&self, doc: &Document) -> Result<()> {
    match self.docs.lock().get_mut(&doc.id) {
      Some(slot) => {
        *slot = doc.clone();
        Ok(())
      },
      None => Err(StoreError::NotFound(doc.id)),
    }
  }

  async fn delete(&self, id: DocumentId) -> Result<()> {
    self
      .docs
      .lock()
      .remove(&id)
      .map(|_| ())
      .ok_or(StoreError::NotFound(id))
  }
}

/// One JSON file per document in a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write never leaves a truncated note behind.
#[derive(Debug, Clone)]
pub struct FolderStore {
  dir: PathBuf,
}

impl FolderStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn path(&self, id: DocumentId) -> PathBuf {
    self.dir.join(format!("{id}.json"))
  }

  async fn write(&self, doc: &Document) -> Result<()> {
    tokio::fs::create_dir_all(&self.dir).await?;
    let json = serde_json::to_vec_pretty(doc)?;
    let path = self.path(doc.id);
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, &path).await?;
    Ok(())
  }
}

fn not_found(id: DocumentId) -> impl FnOnce(io::Error) -> StoreError {
  move |err| {
    if err.kind() == io::ErrorKind::NotFound {
      StoreError::NotFound(id)
    } else {
      StoreError::Io(err)
    }
  }
}

#[async_trait]
impl Storage for FolderStore {
  async fn create(&self, doc: &Document) -> Result<()> {
    self.write(doc).await
  }

  async fn fetch(&self, id: DocumentId) -> Result<Document> {
    let bytes = tokio::fs::read(self.path(id)).await.map_err(not_found(id))?;
    Ok(serde_json::from_slice(&bytes)?)
  }

  async fn update(&self, doc: &Document) -> Result<()> {
    tokio::fs::metadata(self.path(doc.id))
      .await
      .map_err(not_found(doc.id))?;
    self.write(doc).await
  }

  async fn delete(&self, id: DocumentId) -> Result<()> {
    tokio::fs::remove_file(self.path(id))
      .await
      .map_err(not_found(id))
  }
}
