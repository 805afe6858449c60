//! Document-store collaborator.
//!
//! The host owns attachment persistence; the engine only needs the narrow
//! surface below. `rewrite_file_locator` is deliberately separate from any
//! hook-firing update path so rewriting a record after upload cannot
//! re-trigger the lifecycle event that caused it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use driveloft_common::{Error, Result};

/// The host's persisted representation of an uploaded attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Record identifier.
    pub id: String,
    /// Display name of the file.
    pub file_name: String,
    /// Locator: local path or remote reference.
    pub file_url: String,
    /// Whether the file is private to the host's permission model.
    #[serde(default)]
    pub is_private: bool,
    /// Document type the file is attached to.
    #[serde(default)]
    pub attached_to_doctype: Option<String>,
    /// Specific document the file is attached to.
    #[serde(default)]
    pub attached_to_name: Option<String>,
    /// Content marker; holds the remote object id once offloaded.
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// The slice of the host's document persistence the engine relies on.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All file records.
    async fn list_file_records(&self) -> Result<Vec<FileRecord>>;

    /// One file record by id.
    async fn get_file_record(&self, id: &str) -> Result<Option<FileRecord>>;

    /// Internal update path: rewrite a record's locator and content marker
    /// without firing lifecycle hooks.
    async fn rewrite_file_locator(&self, id: &str, locator: &str, marker: &str) -> Result<()>;

    /// The designated image field of a document type, when one is declared.
    async fn image_field(&self, doctype: &str) -> Result<Option<String>>;

    /// Write a field on an owning document.
    async fn set_document_field(
        &self,
        doctype: &str,
        docname: &str,
        field: &str,
        value: &str,
    ) -> Result<()>;

    /// Flush pending writes.
    async fn commit(&self) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoreState {
    records: Vec<FileRecord>,
    /// Document type -> name of its designated image field.
    image_fields: HashMap<String, String>,
    /// "doctype/docname" -> field -> value.
    documents: HashMap<String, HashMap<String, String>>,
}

fn document_key(doctype: &str, docname: &str) -> String {
    format!("{}/{}", doctype, docname)
}

/// JSON-file-backed document store for standalone operation.
pub struct JsonDocumentStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl JsonDocumentStore {
    /// Open a store at the given path, loading existing state when present.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = match tokio::fs::read_to_string(&path).await {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| Error::Serialization(format!("Invalid record store: {}", e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Insert a new record (host-side attachment creation).
    pub async fn insert_record(&self, record: FileRecord) {
        self.state.write().await.records.push(record);
    }

    /// Remove a record (host-side attachment deletion).
    pub async fn remove_record(&self, id: &str) {
        self.state.write().await.records.retain(|r| r.id != id);
    }

    /// Declare the designated image field of a document type.
    pub async fn declare_image_field(&self, doctype: &str, field: &str) {
        self.state
            .write()
            .await
            .image_fields
            .insert(doctype.to_string(), field.to_string());
    }
}

#[async_trait]
impl DocumentStore for JsonDocumentStore {
    async fn list_file_records(&self) -> Result<Vec<FileRecord>> {
        Ok(self.state.read().await.records.clone())
    }

    async fn get_file_record(&self, id: &str) -> Result<Option<FileRecord>> {
        Ok(self
            .state
            .read()
            .await
            .records
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn rewrite_file_locator(&self, id: &str, locator: &str, marker: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(format!("No file record: {}", id)))?;

        record.file_url = locator.to_string();
        record.content_hash = Some(marker.to_string());
        Ok(())
    }

    async fn image_field(&self, doctype: &str) -> Result<Option<String>> {
        Ok(self.state.read().await.image_fields.get(doctype).cloned())
    }

    async fn set_document_field(
        &self,
        doctype: &str,
        docname: &str,
        field: &str,
        value: &str,
    ) -> Result<()> {
        self.state
            .write()
            .await
            .documents
            .entry(document_key(doctype, docname))
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let state = self.state.read().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&*state)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// In-memory document store for tests.
#[derive(Default)]
pub struct MemoryDocumentStore {
    state: std::sync::Mutex<StoreState>,
    commits: std::sync::atomic::AtomicUsize,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record.
    pub fn insert(&self, record: FileRecord) {
        self.state.lock().unwrap().records.push(record);
    }

    /// Declare the designated image field of a document type.
    pub fn declare_image_field(&self, doctype: &str, field: &str) {
        self.state
            .lock()
            .unwrap()
            .image_fields
            .insert(doctype.to_string(), field.to_string());
    }

    /// Current state of a record.
    pub fn record(&self, id: &str) -> Option<FileRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Value written to an owning document's field, if any.
    pub fn document_field(&self, doctype: &str, docname: &str, field: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .documents
            .get(&document_key(doctype, docname))
            .and_then(|fields| fields.get(field))
            .cloned()
    }

    /// Number of commit calls seen.
    pub fn commit_count(&self) -> usize {
        self.commits.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_file_records(&self) -> Result<Vec<FileRecord>> {
        Ok(self.state.lock().unwrap().records.clone())
    }

    async fn get_file_record(&self, id: &str) -> Result<Option<FileRecord>> {
        Ok(self.record(id))
    }

    async fn rewrite_file_locator(&self, id: &str, locator: &str, marker: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(format!("No file record: {}", id)))?;

        record.file_url = locator.to_string();
        record.content_hash = Some(marker.to_string());
        Ok(())
    }

    async fn image_field(&self, doctype: &str) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().image_fields.get(doctype).cloned())
    }

    async fn set_document_field(
        &self,
        doctype: &str,
        docname: &str,
        field: &str,
        value: &str,
    ) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .documents
            .entry(document_key(doctype, docname))
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.commits
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}
