//! Google Drive implementation of the remote storage contract.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use driveloft_common::validate::is_valid_email;
use driveloft_common::Result;

use crate::remote::{
    AuthFlow, DriveSettings, ObjectInfo, RemoteFactory, RemoteObject, RemoteStorage,
    SharingPolicy, UploadRequest,
};

use super::auth::OauthHelper;
use super::client::{DriveClient, DriveFile, PermissionGrant};

/// Fallback MIME type for unrecognized names.
const GENERIC_MIME: &str = "application/octet-stream";

/// Strip characters outside letters, digits, dot, hyphen, underscore and
/// whitespace, then trim the ends.
pub fn sanitize_file_name(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') || c.is_whitespace())
        .collect();
    kept.trim().to_string()
}

/// Split a name at its last dot, keeping the dot with the extension.
///
/// A leading dot is part of the base name, not an extension boundary.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Remote display name: sanitized, prefixed with the owning document type
/// and, when present, the sanitized owning document id.
pub fn remote_name(file_name: &str, doctype: &str, docname: Option<&str>) -> String {
    let clean = sanitize_file_name(file_name);
    let (base, ext) = split_extension(&clean);

    let clean_docname = docname.map(sanitize_file_name).unwrap_or_default();
    if clean_docname.is_empty() {
        format!("{}_{}{}", doctype, base, ext)
    } else {
        format!("{}_{}_{}{}", doctype, clean_docname, base, ext)
    }
}

/// Infer a MIME type from a file name's extension.
pub fn mime_for_name(name: &str) -> &'static str {
    let (_, ext) = split_extension(name);
    match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        _ => GENERIC_MIME,
    }
}

/// The permission grants a sharing configuration calls for.
///
/// Under `SpecificPeople`, entries that are empty or not syntactically valid
/// addresses are dropped before any API call is attempted.
pub fn grant_plan(settings: &DriveSettings) -> Vec<PermissionGrant> {
    match settings.sharing {
        SharingPolicy::Private => Vec::new(),
        SharingPolicy::LinkView => vec![PermissionGrant {
            grantee: "anyone",
            role: "reader",
            email_address: None,
        }],
        SharingPolicy::LinkEdit => vec![PermissionGrant {
            grantee: "anyone",
            role: "writer",
            email_address: None,
        }],
        SharingPolicy::SpecificPeople => settings
            .shared_with
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .filter(|address| {
                let valid = is_valid_email(address);
                if !valid {
                    warn!("Skipping malformed sharing recipient: {}", address);
                }
                valid
            })
            .map(|address| PermissionGrant {
                grantee: "user",
                role: "reader",
                email_address: Some(address.to_string()),
            })
            .collect(),
    }
}

/// Google Drive adapter: one authenticated session plus the provider-facing
/// configuration slice.
pub struct DriveAdapter {
    client: DriveClient,
    settings: DriveSettings,
}

impl DriveAdapter {
    /// Create an adapter around an authenticated client.
    pub fn new(client: DriveClient, settings: DriveSettings) -> Self {
        Self { client, settings }
    }

    fn upload_folder_id(&self) -> &str {
        self.settings.parent_folder_id.as_deref().unwrap_or("root")
    }

    /// Apply the configured sharing to a freshly created object.
    ///
    /// The first failing grant aborts the remaining grants in this pass;
    /// grants already made stay. Failures never reach the caller.
    async fn apply_sharing(&self, object_id: &str) {
        for grant in grant_plan(&self.settings) {
            if let Err(e) = self.client.create_permission(object_id, &grant).await {
                warn!("Failed to set sharing on {}: {}", object_id, e);
                break;
            }
        }
    }

    fn to_object_info(file: DriveFile) -> ObjectInfo {
        let size = file.size_bytes();
        ObjectInfo {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            size,
            view_link: file.web_view_link,
            content_link: file.web_content_link,
            created_time: file.created_time,
            modified_time: file.modified_time,
        }
    }
}

#[async_trait]
impl RemoteStorage for DriveAdapter {
    async fn upload(&self, request: UploadRequest) -> Result<RemoteObject> {
        let name = remote_name(
            &request.file_name,
            &request.doctype,
            request.docname.as_deref(),
        );
        let mime_type = mime_for_name(&request.file_name);
        let description = match &request.docname {
            Some(docname) => format!("Uploaded from {}: {}", request.doctype, docname),
            None => format!("Uploaded from {}", request.doctype),
        };

        let file = self
            .client
            .create_file(
                &name,
                self.upload_folder_id(),
                mime_type,
                &description,
                request.data,
            )
            .await?;

        debug!("Uploaded {} as remote object {}", request.file_name, file.id);
        self.apply_sharing(&file.id).await;

        Ok(RemoteObject {
            id: file.id,
            view_link: file.web_view_link,
            content_link: file.web_content_link,
        })
    }

    async fn download(&self, object_id: &str) -> Result<Vec<u8>> {
        self.client.download(object_id).await
    }

    async fn metadata(&self, object_id: &str) -> Option<ObjectInfo> {
        match self.client.get_file(object_id).await {
            Ok(file) => Some(Self::to_object_info(file)),
            Err(e) => {
                warn!("Metadata lookup failed for {}: {}", object_id, e);
                None
            }
        }
    }

    async fn delete(&self, object_id: &str) {
        if !self.settings.delete_remote_on_remove {
            debug!("Remote deletion disabled; keeping object {}", object_id);
            return;
        }

        if let Err(e) = self.client.delete(object_id).await {
            warn!("Failed to delete remote object {}: {}", object_id, e);
        }
    }

    async fn check(&self) -> Result<()> {
        self.client.probe().await
    }
}

/// Factory producing authenticated Drive sessions.
pub struct DriveFactory {
    oauth: Arc<OauthHelper>,
}

impl DriveFactory {
    /// Create a factory around an OAuth helper.
    pub fn new(oauth: Arc<OauthHelper>) -> Self {
        Self { oauth }
    }
}

#[async_trait]
impl RemoteFactory for DriveFactory {
    async fn connect(
        &self,
        settings: DriveSettings,
        refresh_token: &str,
    ) -> Result<Arc<dyn RemoteStorage>> {
        let access_token = self.oauth.access_token(refresh_token).await?;
        Ok(Arc::new(DriveAdapter::new(
            DriveClient::new(access_token),
            settings,
        )))
    }
}

#[async_trait]
impl AuthFlow for OauthHelper {
    fn consent_url(&self) -> String {
        OauthHelper::consent_url(self)
    }

    async fn exchange_code(&self, code: &str) -> Result<driveloft_common::SecretString> {
        OauthHelper::exchange_code(self, code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_strips_special_characters() {
        assert_eq!(sanitize_file_name("inv#oi!ce.pdf"), "invoice.pdf");
        assert_eq!(sanitize_file_name("  report (final).txt "), "report final.txt");
        assert_eq!(sanitize_file_name("naïve.png"), "nave.png");
        assert_eq!(sanitize_file_name("safe_name-1.2.tar"), "safe_name-1.2.tar");
    }

    #[test]
    fn test_split_extension_uses_last_dot() {
        assert_eq!(split_extension("a.b.c"), ("a.b", ".c"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
        assert_eq!(split_extension("trailing."), ("trailing", "."));
    }

    #[test]
    fn test_remote_name_prefixing() {
        assert_eq!(
            remote_name("invoice.pdf", "Sales Invoice", Some("SINV-0001")),
            "Sales Invoice_SINV-0001_invoice.pdf"
        );
        assert_eq!(
            remote_name("invoice.pdf", "Sales Invoice", None),
            "Sales Invoice_invoice.pdf"
        );
        // A docname that sanitizes away is treated as absent.
        assert_eq!(remote_name("a.txt", "File", Some("###")), "File_a.txt");
    }

    #[test]
    fn test_mime_inference() {
        assert_eq!(mime_for_name("photo.JPG"), "image/jpeg");
        assert_eq!(mime_for_name("doc.pdf"), "application/pdf");
        assert_eq!(mime_for_name("archive.unknownext"), GENERIC_MIME);
        assert_eq!(mime_for_name("no_extension"), GENERIC_MIME);
    }

    #[test]
    fn test_grant_plan_link_modes() {
        let view = DriveSettings {
            sharing: SharingPolicy::LinkView,
            ..Default::default()
        };
        assert_eq!(
            grant_plan(&view),
            vec![PermissionGrant {
                grantee: "anyone",
                role: "reader",
                email_address: None,
            }]
        );

        let edit = DriveSettings {
            sharing: SharingPolicy::LinkEdit,
            ..Default::default()
        };
        assert_eq!(grant_plan(&edit)[0].role, "writer");

        let private = DriveSettings::default();
        assert!(grant_plan(&private).is_empty());
    }

    #[test]
    fn test_grant_plan_skips_malformed_recipients() {
        let settings = DriveSettings {
            sharing: SharingPolicy::SpecificPeople,
            shared_with: Some("a@x.com, bad-email, b@x.com".to_string()),
            ..Default::default()
        };

        let plan = grant_plan(&settings);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].email_address.as_deref(), Some("a@x.com"));
        assert_eq!(plan[1].email_address.as_deref(), Some("b@x.com"));
        assert!(plan.iter().all(|g| g.grantee == "user" && g.role == "reader"));
    }

    #[test]
    fn test_grant_plan_specific_people_without_list() {
        let settings = DriveSettings {
            sharing: SharingPolicy::SpecificPeople,
            shared_with: None,
            ..Default::default()
        };
        assert!(grant_plan(&settings).is_empty());
    }

    proptest! {
        #[test]
        fn prop_sanitize_keeps_only_allowed_characters(name in ".{0,64}") {
            let cleaned = sanitize_file_name(&name);
            let only_allowed_chars = cleaned.chars().all(|c| {
                c.is_ascii_alphanumeric()
                    || matches!(c, '.' | '-' | '_')
                    || c.is_whitespace()
            });
            prop_assert!(only_allowed_chars);
            prop_assert_eq!(cleaned.trim(), cleaned.as_str());
        }

        #[test]
        fn prop_sanitize_preserves_clean_extensions(
            base in "[a-zA-Z0-9_-]{1,16}",
            ext in "[a-z]{1,6}",
        ) {
            let cleaned = sanitize_file_name(&format!("{}#?.{}", base, ext));
            let expected_suffix = format!(".{}", ext);
            let has_expected_suffix = cleaned.ends_with(&expected_suffix);
            prop_assert!(has_expected_suffix);
        }
    }
}
