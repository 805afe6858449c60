//! Google Drive API client.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};

use driveloft_common::{Error, Result};

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Metadata fields requested on every file-returning call.
const FILE_FIELDS: &str =
    "id,name,mimeType,size,webViewLink,webContentLink,createdTime,modifiedTime";

/// Google Drive file metadata from API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// File size in bytes, returned as a decimal string.
    #[serde(default)]
    pub size: Option<String>,
    /// Browser-facing link.
    #[serde(default)]
    pub web_view_link: Option<String>,
    /// Direct content link.
    #[serde(default)]
    pub web_content_link: Option<String>,
    /// Created time.
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    /// Modified time.
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
}

impl DriveFile {
    /// Get size as u64.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }
}

/// One permission grant on a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    /// Grantee type: "anyone" or "user".
    #[serde(rename = "type")]
    pub grantee: &'static str,
    /// Granted role: "reader" or "writer".
    pub role: &'static str,
    /// Recipient address, required for "user" grants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

/// Google Drive API client holding one bearer session.
pub struct DriveClient {
    http: Client,
    access_token: String,
}

impl DriveClient {
    /// Create a client around a short-lived access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        let http = Client::builder()
            .user_agent("Driveloft/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            access_token: access_token.into(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Get file metadata by ID.
    pub async fn get_file(&self, file_id: &str) -> Result<DriveFile> {
        let url = format!("{}/files/{}", DRIVE_API_BASE, file_id);

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to get file: {}", e)))?;

        self.handle_response(response).await
    }

    /// Create a file inside a folder via a multipart upload.
    pub async fn create_file(
        &self,
        name: &str,
        parent_id: &str,
        mime_type: &str,
        description: &str,
        data: Vec<u8>,
    ) -> Result<DriveFile> {
        let url = format!("{}/files?uploadType=multipart", DRIVE_UPLOAD_BASE);

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id],
            "description": description,
        });

        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| Error::Serialization(format!("Failed to serialize metadata: {}", e)))?;

        // Build multipart/related request
        let boundary = "DriveloftBoundary";
        let mut body = Vec::new();

        // Metadata part
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(metadata_json.as_bytes());
        body.extend_from_slice(b"\r\n");

        // Data part
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
        body.extend_from_slice(&data);
        body.extend_from_slice(b"\r\n");

        // End boundary
        body.extend_from_slice(format!("--{}--", boundary).as_bytes());

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .query(&[("fields", FILE_FIELDS)])
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload file: {}", e)))?;

        self.handle_response(response).await
    }

    /// Create one permission on a file.
    pub async fn create_permission(&self, file_id: &str, grant: &PermissionGrant) -> Result<()> {
        let url = format!("{}/files/{}/permissions", DRIVE_API_BASE, file_id);

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .json(grant)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to create permission: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Error::Network(format!(
                "Permission grant failed: {} - {}",
                status, body
            )))
        }
    }

    /// Download file content, chunk by chunk, into one buffer.
    pub async fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/files/{}", DRIVE_API_BASE, file_id);

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to download file: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!(
                "Download failed: {} - {}",
                status, body
            )));
        }

        let mut content = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| Error::Network(format!("Download stream error: {}", e)))?;
            content.extend_from_slice(&chunk);
        }

        Ok(content)
    }

    /// Delete a file.
    pub async fn delete(&self, file_id: &str) -> Result<()> {
        let url = format!("{}/files/{}", DRIVE_API_BASE, file_id);

        let response = self
            .http
            .delete(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to delete file: {}", e)))?;

        if response.status() == StatusCode::NO_CONTENT || response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Error::Network(format!(
                "Delete failed: {} - {}",
                status, body
            )))
        }
    }

    /// List a single file as a connectivity probe.
    pub async fn probe(&self) -> Result<()> {
        let url = format!("{}/files", DRIVE_API_BASE);

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .query(&[("pageSize", "1"), ("fields", "files(id,name)")])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to list files: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Error::Network(format!(
                "List probe failed: {} - {}",
                status, body
            )))
        }
    }

    /// Handle API response with error checking.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::NotFound("Resource not found".to_string()))
        } else if status == StatusCode::UNAUTHORIZED {
            Err(Error::Authentication(
                "Invalid or expired token".to_string(),
            ))
        } else if status == StatusCode::FORBIDDEN {
            Err(Error::Authentication("Access denied".to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Network(format!("API error: {} - {}", status, body)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_file_size_bytes() {
        let file = DriveFile {
            id: "1".to_string(),
            name: "file.txt".to_string(),
            mime_type: "text/plain".to_string(),
            size: Some("12345".to_string()),
            web_view_link: None,
            web_content_link: None,
            created_time: None,
            modified_time: None,
        };

        assert_eq!(file.size_bytes(), Some(12345));
    }

    #[test]
    fn test_drive_file_deserializes_api_shape() {
        let json = r#"{
            "id": "abc123",
            "name": "report.pdf",
            "mimeType": "application/pdf",
            "size": "100",
            "webViewLink": "https://drive.google.com/file/d/abc123/view"
        }"#;

        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.id, "abc123");
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(
            file.web_view_link.as_deref(),
            Some("https://drive.google.com/file/d/abc123/view")
        );
        assert!(file.web_content_link.is_none());
    }

    #[test]
    fn test_permission_grant_serialization() {
        let anyone = PermissionGrant {
            grantee: "anyone",
            role: "reader",
            email_address: None,
        };
        let json = serde_json::to_value(&anyone).unwrap();
        assert_eq!(json, serde_json::json!({"type": "anyone", "role": "reader"}));

        let user = PermissionGrant {
            grantee: "user",
            role: "reader",
            email_address: Some("a@x.com".to_string()),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "user", "role": "reader", "emailAddress": "a@x.com"})
        );
    }
}
