//! File lifecycle engine.
//!
//! Each file record moves through at most three states: `Local` (locator is
//! a filesystem path), `Offloaded` (locator is a remote reference) and
//! `Removed`. The transitions are driven by host lifecycle events; whether a
//! record is already offloaded is decided by parsing its locator, which is
//! what keeps re-runs (and bulk migration) idempotent.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use driveloft_common::locator::{is_remote, serve_locator};
use driveloft_common::{Error, Result};
use driveloft_storage::{AuthFlow, RemoteFactory, RemoteStorage, UploadRequest};

use crate::config::{ConfigCache, OffloadConfig};
use crate::paths::SiteRoots;
use crate::store::{DocumentStore, FileRecord};

/// Document type assumed when a file has no owning document.
const DEFAULT_DOCTYPE: &str = "File";

/// Engine behavior knobs outside the persisted configuration.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Owning document types whose attachments are never offloaded.
    pub ignored_doctypes: Vec<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            // Bulk data-import jobs produce transient artifacts.
            ignored_doctypes: vec!["Data Import".to_string()],
        }
    }
}

/// Outcome of a bulk migration sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub migrated: usize,
    pub errors: usize,
    pub total: usize,
}

/// Outcome of a connection probe.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub success: bool,
    pub message: String,
}

/// Configuration summary for screens.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    pub enabled: bool,
    pub has_authorization: bool,
    pub folder_prefix: Option<String>,
    pub sharing_permission: driveloft_storage::SharingPolicy,
    pub parent_folder_id: Option<String>,
}

/// Outcome of the authorization flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    /// The user must visit the consent URL first.
    ConsentUrl(String),
    /// The code was exchanged and the credential stored.
    Authorized,
}

/// A downloaded file ready to stream back to the user.
#[derive(Debug, Clone)]
pub struct ServedFile {
    /// Name to suggest on download.
    pub file_name: String,
    /// Complete file content.
    pub content: Vec<u8>,
}

/// Why an offload attempt did not upload anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    Disabled,
    AlreadyRemote,
    IgnoredDoctype,
    MissingLocalFile,
}

enum OffloadOutcome {
    Offloaded,
    Skipped(Skip),
}

/// The file lifecycle engine.
pub struct OffloadEngine {
    config: Arc<ConfigCache>,
    store: Arc<dyn DocumentStore>,
    remote: Arc<dyn RemoteFactory>,
    auth: Arc<dyn AuthFlow>,
    roots: SiteRoots,
    options: EngineOptions,
}

impl OffloadEngine {
    /// Create an engine with default options.
    pub fn new(
        config: Arc<ConfigCache>,
        store: Arc<dyn DocumentStore>,
        remote: Arc<dyn RemoteFactory>,
        auth: Arc<dyn AuthFlow>,
        roots: SiteRoots,
    ) -> Self {
        Self {
            config,
            store,
            remote,
            auth,
            roots,
            options: EngineOptions::default(),
        }
    }

    /// Override the engine options.
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Build a remote session from an already-loaded configuration.
    async fn remote_from(&self, config: &OffloadConfig) -> Result<Arc<dyn RemoteStorage>> {
        let token = config
            .refresh_token
            .as_ref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                Error::Config("No refresh credential stored. Authorize access first.".to_string())
            })?;

        self.remote
            .connect(config.drive_settings(), token.expose())
            .await
    }

    /// Build a remote session, rejecting the call when offload is disabled.
    async fn connect(&self) -> Result<Arc<dyn RemoteStorage>> {
        let config = self.config.get().await?;
        if !config.enabled {
            return Err(Error::Config(
                "Google Drive offload is disabled in configuration".to_string(),
            ));
        }
        self.remote_from(&config).await
    }

    /// Host hook: a file record was created.
    ///
    /// Runs inside the host's document transaction and therefore never
    /// propagates a failure; everything is logged instead.
    pub async fn on_file_created(&self, record: &mut FileRecord) {
        match self.offload_record(record).await {
            Ok(OffloadOutcome::Offloaded) => {
                info!("Offloaded {} ({})", record.id, record.file_name);
            }
            Ok(OffloadOutcome::Skipped(reason)) => {
                debug!("Skipping offload of {}: {:?}", record.id, reason);
            }
            Err(e) => {
                error!("Offload failed for {}: {}", record.id, e);
            }
        }
    }

    /// Host hook: a file record is being deleted.
    ///
    /// Acts only on records whose content marker is set and whose locator is
    /// a remote reference; never propagates a failure.
    pub async fn on_file_deleted(&self, record: &FileRecord) {
        let Some(marker) = record
            .content_hash
            .as_deref()
            .filter(|marker| !marker.is_empty())
        else {
            return;
        };

        if !is_remote(&record.file_url) {
            return;
        }

        match self.connect().await {
            Ok(remote) => remote.delete(marker).await,
            Err(e) => warn!("Skipping remote deletion of {}: {}", record.id, e),
        }
    }

    /// The offload sequence for one record.
    async fn offload_record(&self, record: &mut FileRecord) -> Result<OffloadOutcome> {
        let config = self.config.get().await?;
        if !config.enabled {
            return Ok(OffloadOutcome::Skipped(Skip::Disabled));
        }

        if is_remote(&record.file_url) {
            return Ok(OffloadOutcome::Skipped(Skip::AlreadyRemote));
        }

        let doctype = record
            .attached_to_doctype
            .clone()
            .unwrap_or_else(|| DEFAULT_DOCTYPE.to_string());
        if self.options.ignored_doctypes.contains(&doctype) {
            return Ok(OffloadOutcome::Skipped(Skip::IgnoredDoctype));
        }

        let path = self.roots.resolve(&record.file_url, record.is_private);
        if !path.exists() {
            warn!("File not found, skipping offload: {}", path.display());
            return Ok(OffloadOutcome::Skipped(Skip::MissingLocalFile));
        }

        let data = tokio::fs::read(&path).await?;
        let remote = self.remote_from(&config).await?;

        let object = remote
            .upload(UploadRequest {
                data,
                file_name: record.file_name.clone(),
                doctype: doctype.clone(),
                docname: record.attached_to_name.clone(),
            })
            .await?;

        let locator = if record.is_private {
            serve_locator(&object.id, Some(&record.file_name))
        } else {
            object.view_link.clone().ok_or_else(|| {
                Error::Network("Upload response carried no view link".to_string())
            })?
        };

        // The remote copy is authoritative from here on; a leftover local
        // file is harmless.
        if let Err(e) = tokio::fs::remove_file(&path).await {
            debug!("Could not remove local copy {}: {}", path.display(), e);
        }

        self.store
            .rewrite_file_locator(&record.id, &locator, &object.id)
            .await?;
        record.file_url = locator.clone();
        record.content_hash = Some(object.id.clone());

        if let Some(field) = self.store.image_field(&doctype).await? {
            if let Some(docname) = &record.attached_to_name {
                self.store
                    .set_document_field(&doctype, docname, &field, &locator)
                    .await?;
            }
        }

        self.store.commit().await?;
        Ok(OffloadOutcome::Offloaded)
    }

    /// Download a remote object for serving back to the user.
    ///
    /// # Errors
    /// - Empty object id
    /// - Configuration or transport failure; user-visible
    pub async fn serve_file(&self, file_id: &str, file_name: Option<&str>) -> Result<ServedFile> {
        if file_id.is_empty() {
            return Err(Error::InvalidInput("File ID is required".to_string()));
        }

        let remote = self.connect().await?;
        let content = remote.download(file_id).await?;

        Ok(ServedFile {
            file_name: file_name.unwrap_or("download").to_string(),
            content,
        })
    }

    /// Offload every record still carrying a local locator.
    ///
    /// One record's failure is logged and counted; it never aborts the
    /// sweep. Re-runs skip already-offloaded records via the locator guard.
    ///
    /// # Errors
    /// - Offload disabled or credential missing (before any remote call)
    pub async fn migrate_existing(&self) -> Result<MigrationReport> {
        let config = self.config.get().await?;
        if !config.enabled {
            return Err(Error::Config(
                "Google Drive offload is disabled in configuration".to_string(),
            ));
        }
        if !config.has_authorization() {
            return Err(Error::Config(
                "No refresh credential stored. Authorize access first.".to_string(),
            ));
        }

        let records = self.store.list_file_records().await?;
        let total = records.len();
        let mut migrated = 0;
        let mut errors = 0;

        info!("Starting migration sweep over {} records", total);

        for mut record in records {
            if is_remote(&record.file_url) {
                continue;
            }

            match self.offload_record(&mut record).await {
                Ok(OffloadOutcome::Offloaded) => migrated += 1,
                Ok(OffloadOutcome::Skipped(reason)) => {
                    debug!("Migration skipped {}: {:?}", record.id, reason);
                }
                Err(e) => {
                    errors += 1;
                    error!("Failed to migrate {}: {}", record.id, e);
                }
            }
        }

        info!(
            "Migration completed: {} migrated, {} failed, {} total",
            migrated, errors, total
        );

        Ok(MigrationReport {
            migrated,
            errors,
            total,
        })
    }

    /// Remote metadata for an object; absent when the lookup fails.
    pub async fn file_info(
        &self,
        file_id: &str,
    ) -> Result<Option<driveloft_storage::ObjectInfo>> {
        let remote = self.connect().await?;
        Ok(remote.metadata(file_id).await)
    }

    /// Probe the remote storage connection.
    pub async fn test_connection(&self) -> ConnectionStatus {
        let probe = async {
            let remote = self.connect().await?;
            remote.check().await
        };

        match probe.await {
            Ok(()) => ConnectionStatus {
                success: true,
                message: "Google Drive connection successful".to_string(),
            },
            Err(e) => ConnectionStatus {
                success: false,
                message: e.to_string(),
            },
        }
    }

    /// Run the authorization flow.
    ///
    /// With no one-time code on hand, or when re-authorization is forced
    /// (which also clears the target folder), the caller gets the consent
    /// URL. Otherwise the code is exchanged and the credential persisted.
    pub async fn authorize_access(
        &self,
        reauthorize: bool,
        code: Option<&str>,
    ) -> Result<AuthorizeOutcome> {
        let config = self.config.get().await?;
        let oauth_code = code
            .map(str::to_string)
            .or_else(|| config.authorization_code.clone());

        if oauth_code.is_none() || reauthorize {
            if reauthorize {
                self.config
                    .update(|config| config.parent_folder_id = None)
                    .await?;
            }
            return Ok(AuthorizeOutcome::ConsentUrl(self.auth.consent_url()));
        }

        let oauth_code = oauth_code.ok_or_else(|| {
            Error::Authentication("No authorization code available".to_string())
        })?;
        let refresh_token = self.auth.exchange_code(&oauth_code).await?;

        self.config
            .update(|config| {
                config.authorization_code = Some(oauth_code.clone());
                config.refresh_token = Some(refresh_token.clone());
            })
            .await?;

        Ok(AuthorizeOutcome::Authorized)
    }

    /// Configuration summary for screens.
    pub async fn settings(&self) -> Result<SettingsView> {
        let config = self.config.get().await?;
        Ok(SettingsView {
            enabled: config.enabled,
            has_authorization: config.has_authorization(),
            folder_prefix: config.folder_name_prefix.clone(),
            sharing_permission: config.sharing,
            parent_folder_id: config.parent_folder_id.clone(),
        })
    }
}
