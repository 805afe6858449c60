//! In-memory remote storage for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use driveloft_common::{Error, Result};

use crate::remote::{
    DriveSettings, ObjectInfo, RemoteFactory, RemoteObject, RemoteStorage, UploadRequest,
};

/// In-memory remote storage.
///
/// Useful for exercising the lifecycle engine without a provider. Counts
/// calls per operation and can be told to fail the nth upload.
#[derive(Default)]
pub struct MemoryRemote {
    objects: Mutex<HashMap<String, (ObjectInfo, Vec<u8>)>>,
    uploads: AtomicUsize,
    downloads: AtomicUsize,
    deletes: AtomicUsize,
    fail_upload_at: Mutex<Option<usize>>,
}

impl MemoryRemote {
    /// Create an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the nth upload (1-based) with a network error.
    pub fn fail_upload_at(&self, nth: usize) {
        *self.fail_upload_at.lock().unwrap() = Some(nth);
    }

    /// Number of upload calls seen.
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Number of download calls seen.
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Number of delete calls seen.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Whether an object is currently stored.
    pub fn contains(&self, object_id: &str) -> bool {
        self.objects.lock().unwrap().contains_key(object_id)
    }

    /// Stored content of an object, when present.
    pub fn content(&self, object_id: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(object_id)
            .map(|(_, data)| data.clone())
    }
}

#[async_trait]
impl RemoteStorage for MemoryRemote {
    async fn upload(&self, request: UploadRequest) -> Result<RemoteObject> {
        let ordinal = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_upload_at.lock().unwrap() == Some(ordinal) {
            return Err(Error::Network("Injected upload failure".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let view_link = format!("https://drive.google.com/file/d/{}/view", id);
        let content_link = format!("https://drive.google.com/uc?id={}&export=download", id);

        let info = ObjectInfo {
            id: id.clone(),
            name: request.file_name.clone(),
            mime_type: "application/octet-stream".to_string(),
            size: Some(request.data.len() as u64),
            view_link: Some(view_link.clone()),
            content_link: Some(content_link.clone()),
            created_time: Some(Utc::now()),
            modified_time: Some(Utc::now()),
        };

        self.objects
            .lock()
            .unwrap()
            .insert(id.clone(), (info, request.data));

        Ok(RemoteObject {
            id,
            view_link: Some(view_link),
            content_link: Some(content_link),
        })
    }

    async fn download(&self, object_id: &str) -> Result<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .get(object_id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| Error::NotFound(format!("No such object: {}", object_id)))
    }

    async fn metadata(&self, object_id: &str) -> Option<ObjectInfo> {
        self.objects
            .lock()
            .unwrap()
            .get(object_id)
            .map(|(info, _)| info.clone())
    }

    async fn delete(&self, object_id: &str) {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().unwrap().remove(object_id);
    }

    async fn check(&self) -> Result<()> {
        Ok(())
    }
}

/// Factory handing out one shared in-memory remote.
pub struct MemoryFactory {
    remote: Arc<MemoryRemote>,
}

impl MemoryFactory {
    /// Create a factory over a shared remote.
    pub fn new(remote: Arc<MemoryRemote>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl RemoteFactory for MemoryFactory {
    async fn connect(
        &self,
        _settings: DriveSettings,
        _refresh_token: &str,
    ) -> Result<Arc<dyn RemoteStorage>> {
        Ok(self.remote.clone())
    }
}
