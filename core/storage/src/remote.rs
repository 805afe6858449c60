//! Remote storage trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use driveloft_common::Result;

/// Sharing applied to a freshly uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingPolicy {
    /// No sharing calls; the object stays visible to the owner only.
    Private,
    /// Anyone with the link may view.
    LinkView,
    /// Anyone with the link may edit.
    LinkEdit,
    /// A reader grant per configured recipient address.
    SpecificPeople,
}

impl Default for SharingPolicy {
    fn default() -> Self {
        Self::Private
    }
}

/// Provider-facing slice of the offload configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveSettings {
    /// Target folder for uploads; the provider root when unset.
    pub parent_folder_id: Option<String>,
    /// Sharing applied after each upload.
    pub sharing: SharingPolicy,
    /// Comma-separated recipient addresses, meaningful only under
    /// `SharingPolicy::SpecificPeople`.
    pub shared_with: Option<String>,
    /// Whether removing an attachment also deletes the remote object.
    pub delete_remote_on_remove: bool,
}

/// One attachment to upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Complete file content.
    pub data: Vec<u8>,
    /// Display name as the host recorded it.
    pub file_name: String,
    /// Document type the file is attached to.
    pub doctype: String,
    /// Specific document the file is attached to, when known.
    pub docname: Option<String>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Provider-assigned object id; the only part persisted locally.
    pub id: String,
    /// Browser-facing link.
    pub view_link: Option<String>,
    /// Direct content link.
    pub content_link: Option<String>,
}

/// Metadata for a stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: Option<u64>,
    pub view_link: Option<String>,
    pub content_link: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
    pub modified_time: Option<DateTime<Utc>>,
}

/// Remote object storage as the lifecycle engine sees it.
///
/// Implementations authenticate up front and hold nothing but a session
/// handle; every method is one request/response exchange.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Upload one attachment and apply the configured sharing.
    ///
    /// # Errors
    /// - Transport or authentication failure; surfaced, never retried.
    ///   Sharing-grant failures are logged and do not fail the upload.
    async fn upload(&self, request: UploadRequest) -> Result<RemoteObject>;

    /// Fetch complete object content.
    async fn download(&self, object_id: &str) -> Result<Vec<u8>>;

    /// Fetch object metadata; absent (after logging) when the lookup fails.
    async fn metadata(&self, object_id: &str) -> Option<ObjectInfo>;

    /// Best-effort delete honoring the delete-on-remove flag. Provider
    /// errors are logged and never surfaced.
    async fn delete(&self, object_id: &str);

    /// Cheap connectivity probe.
    async fn check(&self) -> Result<()>;
}

/// The one-time consent exchange, as the lifecycle engine sees it.
#[async_trait]
pub trait AuthFlow: Send + Sync {
    /// Provider-hosted consent URL for the user to visit.
    fn consent_url(&self) -> String;

    /// Exchange a one-time authorization code for a refresh credential.
    async fn exchange_code(&self, code: &str) -> Result<driveloft_common::SecretString>;
}

/// Builds a request-scoped remote session from configuration.
#[async_trait]
pub trait RemoteFactory: Send + Sync {
    /// Authenticate and return a ready-to-use remote.
    ///
    /// # Errors
    /// - Credential exchange failure
    async fn connect(
        &self,
        settings: DriveSettings,
        refresh_token: &str,
    ) -> Result<Arc<dyn RemoteStorage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharing_policy_serialization() {
        let json = serde_json::to_string(&SharingPolicy::SpecificPeople).unwrap();
        assert_eq!(json, "\"specific_people\"");

        let restored: SharingPolicy = serde_json::from_str("\"link_view\"").unwrap();
        assert_eq!(restored, SharingPolicy::LinkView);
    }

    #[test]
    fn test_drive_settings_defaults() {
        let settings: DriveSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.sharing, SharingPolicy::Private);
        assert!(settings.parent_folder_id.is_none());
        assert!(!settings.delete_remote_on_remove);
    }
}
