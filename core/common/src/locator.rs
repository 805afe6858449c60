//! Remote-locator model.
//!
//! A file record's locator is either a local filesystem path or one of two
//! recognized remote forms: the internal serve reference used for private
//! files, or a direct Google Drive link used for public files. Matching a
//! locator against these forms is the guard that keeps already-offloaded
//! records from being uploaded twice.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::fmt;

/// Origin of direct public links handed out by the provider.
pub const DRIVE_PUBLIC_ORIGIN: &str = "https://drive.google.com";

/// Canonical mount path of the serve endpoint.
pub const SERVE_ENDPOINT: &str = "/api/driveloft/serve_file";

/// Characters escaped when embedding values in a serve-locator query string.
const QUERY_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'=');

/// A parsed remote reference.
///
/// Locators that do not parse as one of these forms are local paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteRef {
    /// Internal proxy form carrying the remote object id and, usually, the
    /// original file name to suggest on download.
    Serve {
        file_id: String,
        file_name: Option<String>,
    },
    /// Direct provider link, stored verbatim.
    PublicLink(String),
}

impl RemoteRef {
    /// Parse a locator string into a remote reference.
    ///
    /// Returns `None` for anything that is not one of the two recognized
    /// remote forms, i.e. for local paths. Any path ending in `/serve_file`
    /// with a `file_id` query parameter is accepted so locators written
    /// behind other mount points still match.
    pub fn parse(locator: &str) -> Option<Self> {
        if locator.starts_with(DRIVE_PUBLIC_ORIGIN) {
            return Some(Self::PublicLink(locator.to_string()));
        }

        let (path, query) = locator.split_once('?')?;
        if !path.ends_with("/serve_file") {
            return None;
        }

        let mut file_id = None;
        let mut file_name = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "file_id" if !value.is_empty() => file_id = Some(value.into_owned()),
                "file_name" if !value.is_empty() => file_name = Some(value.into_owned()),
                _ => {}
            }
        }

        Some(Self::Serve {
            file_id: file_id?,
            file_name,
        })
    }

    /// The remote object id, when this reference carries one.
    ///
    /// Public links embed the id in provider-specific ways and are never
    /// resolved back to an id locally.
    pub fn file_id(&self) -> Option<&str> {
        match self {
            Self::Serve { file_id, .. } => Some(file_id),
            Self::PublicLink(_) => None,
        }
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serve { file_id, file_name } => {
                write!(f, "{}", serve_locator(file_id, file_name.as_deref()))
            }
            Self::PublicLink(url) => write!(f, "{}", url),
        }
    }
}

/// Build the internal serve locator for a private file.
pub fn serve_locator(file_id: &str, file_name: Option<&str>) -> String {
    let mut locator = format!(
        "{}?file_id={}",
        SERVE_ENDPOINT,
        utf8_percent_encode(file_id, QUERY_ESCAPE)
    );
    if let Some(name) = file_name {
        locator.push_str("&file_name=");
        locator.push_str(&utf8_percent_encode(name, QUERY_ESCAPE).to_string());
    }
    locator
}

/// Check whether a locator already points at remote storage.
pub fn is_remote(locator: &str) -> bool {
    RemoteRef::parse(locator).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_paths_are_not_remote() {
        assert!(!is_remote("/files/report.pdf"));
        assert!(!is_remote("/private/files/report.pdf"));
        assert!(!is_remote(""));
        assert!(!is_remote("https://example.com/serve_file"));
    }

    #[test]
    fn test_public_link_is_remote() {
        let url = "https://drive.google.com/file/d/abc123/view";
        assert!(is_remote(url));
        assert_eq!(
            RemoteRef::parse(url),
            Some(RemoteRef::PublicLink(url.to_string()))
        );
    }

    #[test]
    fn test_serve_locator_round_trip() {
        let locator = serve_locator("abc123", Some("a b.png"));
        assert_eq!(
            locator,
            "/api/driveloft/serve_file?file_id=abc123&file_name=a%20b.png"
        );

        let parsed = RemoteRef::parse(&locator).unwrap();
        assert_eq!(
            parsed,
            RemoteRef::Serve {
                file_id: "abc123".to_string(),
                file_name: Some("a b.png".to_string()),
            }
        );
        assert_eq!(parsed.file_id(), Some("abc123"));
    }

    #[test]
    fn test_serve_locator_without_name() {
        let locator = serve_locator("xyz", None);
        assert_eq!(locator, "/api/driveloft/serve_file?file_id=xyz");
        assert_eq!(
            RemoteRef::parse(&locator),
            Some(RemoteRef::Serve {
                file_id: "xyz".to_string(),
                file_name: None,
            })
        );
    }

    #[test]
    fn test_foreign_mount_point_still_matches() {
        let locator = "/api/method/attachments/serve_file?file_id=abc&file_name=x.txt";
        assert!(is_remote(locator));
    }

    #[test]
    fn test_serve_path_without_file_id_is_not_remote() {
        assert!(!is_remote("/api/driveloft/serve_file?file_name=x.txt"));
        assert!(!is_remote("/api/driveloft/serve_file?file_id="));
    }

    #[test]
    fn test_display_round_trips() {
        let reference = RemoteRef::Serve {
            file_id: "id1".to_string(),
            file_name: Some("döc.pdf".to_string()),
        };
        let rendered = reference.to_string();
        assert_eq!(RemoteRef::parse(&rendered), Some(reference));
    }
}
