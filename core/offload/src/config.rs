//! Offload configuration: the singleton record, its persistence, and the
//! short-lived read cache.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

use driveloft_common::validate::is_valid_email;
use driveloft_common::{Error, Result, SecretString};
use driveloft_storage::{DriveSettings, SharingPolicy};

/// Configuration file name in the site directory.
pub const CONFIG_FILENAME: &str = "driveloft.config";

/// How long a cached configuration read stays fresh.
pub const CONFIG_CACHE_TTL: Duration = Duration::from_secs(300);

/// The singleton offload configuration record.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OffloadConfig {
    /// Master switch for the offload behavior.
    pub enabled: bool,
    /// Target folder for uploads; provider root when unset.
    pub parent_folder_id: Option<String>,
    /// Prefix surfaced to configuration screens for folder naming.
    pub folder_name_prefix: Option<String>,
    /// Sharing applied to uploaded objects.
    pub sharing: SharingPolicy,
    /// Comma-separated recipient addresses for `SpecificPeople` sharing.
    pub shared_with: Option<String>,
    /// Whether deleting an attachment also deletes the remote object.
    pub delete_remote_on_remove: bool,
    /// Stored refresh credential from the consent exchange.
    pub refresh_token: Option<SecretString>,
    /// Stored one-time authorization code.
    pub authorization_code: Option<String>,
}

impl OffloadConfig {
    /// Check the record's internal consistency.
    ///
    /// # Errors
    /// - A `SpecificPeople` recipient entry that is not a syntactically
    ///   valid address
    pub fn validate(&self) -> Result<()> {
        if self.sharing == SharingPolicy::SpecificPeople {
            if let Some(list) = &self.shared_with {
                let invalid: Vec<&str> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty() && !is_valid_email(entry))
                    .collect();
                if !invalid.is_empty() {
                    return Err(Error::InvalidInput(format!(
                        "Invalid email addresses: {}",
                        invalid.join(", ")
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether a refresh credential is on hand.
    pub fn has_authorization(&self) -> bool {
        self.refresh_token
            .as_ref()
            .map(|token| !token.is_empty())
            .unwrap_or(false)
    }

    /// The provider-facing slice of this record.
    pub fn drive_settings(&self) -> DriveSettings {
        DriveSettings {
            parent_folder_id: self.parent_folder_id.clone(),
            sharing: self.sharing,
            shared_with: self.shared_with.clone(),
            delete_remote_on_remove: self.delete_remote_on_remove,
        }
    }
}

/// Persistence for the configuration record.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the stored record, if any exists.
    async fn load(&self) -> Result<Option<OffloadConfig>>;

    /// Persist the record.
    async fn save(&self, config: &OffloadConfig) -> Result<()>;
}

/// JSON-file-backed configuration store.
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    /// Create a store persisting at the given path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create a store at the conventional location inside a site directory.
    pub fn in_site_dir(site_dir: impl AsRef<Path>) -> Self {
        Self::new(site_dir.as_ref().join(CONFIG_FILENAME))
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn load(&self) -> Result<Option<OffloadConfig>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let config = serde_json::from_str(&json)
            .map_err(|e| Error::Serialization(format!("Invalid configuration file: {}", e)))?;
        Ok(Some(config))
    }

    async fn save(&self, config: &OffloadConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(config)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// In-memory configuration store for tests; counts persistent-store reads.
#[derive(Default)]
pub struct MemoryConfigStore {
    inner: std::sync::Mutex<Option<OffloadConfig>>,
    loads: std::sync::atomic::AtomicUsize,
}

impl MemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a record.
    pub fn with_config(config: OffloadConfig) -> Self {
        Self {
            inner: std::sync::Mutex::new(Some(config)),
            loads: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of load calls seen.
    pub fn load_count(&self) -> usize {
        self.loads.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<Option<OffloadConfig>> {
        self.loads
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.inner.lock().unwrap().clone())
    }

    async fn save(&self, config: &OffloadConfig) -> Result<()> {
        *self.inner.lock().unwrap() = Some(config.clone());
        Ok(())
    }
}

/// Cached accessor over a configuration store.
///
/// One explicit cache object per engine; a cached read stays valid for the
/// TTL or until `invalidate` runs, whichever comes first. Configuration
/// changes therefore take up to the TTL to be visible elsewhere.
pub struct ConfigCache {
    store: Arc<dyn ConfigStore>,
    ttl: Duration,
    slot: RwLock<Option<(Instant, OffloadConfig)>>,
}

impl ConfigCache {
    /// Create a cache with the default TTL.
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self::with_ttl(store, CONFIG_CACHE_TTL)
    }

    /// Create a cache with an explicit TTL.
    pub fn with_ttl(store: Arc<dyn ConfigStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Current configuration, from cache when fresh.
    ///
    /// On complete absence of a stored record, a default one is created and
    /// persisted.
    pub async fn get(&self) -> Result<OffloadConfig> {
        {
            let slot = self.slot.read().await;
            if let Some((loaded_at, config)) = slot.as_ref() {
                if loaded_at.elapsed() < self.ttl {
                    return Ok(config.clone());
                }
            }
        }

        let mut slot = self.slot.write().await;

        // Double-check after acquiring the write lock
        if let Some((loaded_at, config)) = slot.as_ref() {
            if loaded_at.elapsed() < self.ttl {
                return Ok(config.clone());
            }
        }

        let config = match self.store.load().await? {
            Some(config) => config,
            None => {
                info!("No stored configuration found; creating default record");
                let config = OffloadConfig::default();
                self.store.save(&config).await?;
                config
            }
        };

        *slot = Some((Instant::now(), config.clone()));
        Ok(config)
    }

    /// Drop the cached copy so the next read hits the store.
    pub async fn invalidate(&self) {
        debug!("Configuration cache invalidated");
        *self.slot.write().await = None;
    }

    /// Apply a change to the stored record: load fresh, mutate, validate,
    /// persist, invalidate the cache.
    pub async fn update<F>(&self, apply: F) -> Result<OffloadConfig>
    where
        F: FnOnce(&mut OffloadConfig),
    {
        let mut config = self.store.load().await?.unwrap_or_default();
        apply(&mut config);
        config.validate()?;
        self.store.save(&config).await?;
        self.invalidate().await;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_config() -> OffloadConfig {
        OffloadConfig {
            enabled: true,
            refresh_token: Some(SecretString::new("refresh")),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_accepts_valid_recipients() {
        let config = OffloadConfig {
            sharing: SharingPolicy::SpecificPeople,
            shared_with: Some("a@x.com, b@x.com".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_recipients() {
        let config = OffloadConfig {
            sharing: SharingPolicy::SpecificPeople,
            shared_with: Some("a@x.com, bad-email".to_string()),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bad-email"));
    }

    #[test]
    fn test_validate_ignores_recipients_under_other_modes() {
        let config = OffloadConfig {
            sharing: SharingPolicy::LinkView,
            shared_with: Some("not an email".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = enabled_config();
        let json = serde_json::to_string(&config).unwrap();
        let restored: OffloadConfig = serde_json::from_str(&json).unwrap();

        assert!(restored.enabled);
        assert!(restored.has_authorization());
    }

    #[tokio::test]
    async fn test_cache_serves_repeat_reads_without_store_access() {
        let store = Arc::new(MemoryConfigStore::with_config(enabled_config()));
        let cache = ConfigCache::new(store.clone());

        let first = cache.get().await.unwrap();
        let second = cache.get().await.unwrap();

        assert_eq!(store.load_count(), 1);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_cache_expires_after_ttl() {
        let store = Arc::new(MemoryConfigStore::with_config(enabled_config()));
        let cache = ConfigCache::with_ttl(store.clone(), Duration::ZERO);

        cache.get().await.unwrap();
        cache.get().await.unwrap();

        assert_eq!(store.load_count(), 2);
    }

    #[tokio::test]
    async fn test_cache_invalidate_forces_reload() {
        let store = Arc::new(MemoryConfigStore::with_config(enabled_config()));
        let cache = ConfigCache::new(store.clone());

        cache.get().await.unwrap();
        cache.invalidate().await;
        cache.get().await.unwrap();

        assert_eq!(store.load_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_record_creates_and_persists_default() {
        let store = Arc::new(MemoryConfigStore::new());
        let cache = ConfigCache::new(store.clone());

        let config = cache.get().await.unwrap();
        assert!(!config.enabled);

        // The default was written through to the store.
        assert!(store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_persists_and_invalidates() {
        let store = Arc::new(MemoryConfigStore::with_config(enabled_config()));
        let cache = ConfigCache::new(store.clone());

        cache.get().await.unwrap();
        cache
            .update(|config| config.parent_folder_id = Some("folder123".to_string()))
            .await
            .unwrap();

        let reloaded = cache.get().await.unwrap();
        assert_eq!(reloaded.parent_folder_id.as_deref(), Some("folder123"));
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_recipients() {
        let store = Arc::new(MemoryConfigStore::with_config(enabled_config()));
        let cache = ConfigCache::new(store.clone());

        let result = cache
            .update(|config| {
                config.sharing = SharingPolicy::SpecificPeople;
                config.shared_with = Some("nope".to_string());
            })
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::in_site_dir(dir.path());

        assert!(store.load().await.unwrap().is_none());

        store.save(&enabled_config()).await.unwrap();
        let restored = store.load().await.unwrap().unwrap();
        assert!(restored.enabled);
        assert!(restored.has_authorization());
    }
}
