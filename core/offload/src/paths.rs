//! Mapping from stored locators to on-disk paths.

use std::path::{Path, PathBuf};

/// Filesystem layout of the host site.
///
/// Public attachments live under `<base>/public`, private ones directly
/// under `<base>` (their locators already carry a `/private` prefix).
#[derive(Debug, Clone)]
pub struct SiteRoots {
    base: PathBuf,
}

impl SiteRoots {
    /// Create a layout rooted at the site directory.
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    /// The site directory itself.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve a local locator to the file's on-disk path.
    pub fn resolve(&self, locator: &str, is_private: bool) -> PathBuf {
        let relative = locator.trim_start_matches('/');
        if is_private {
            self.base.join(relative)
        } else {
            self.base.join("public").join(relative)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_files_live_under_public_root() {
        let roots = SiteRoots::new("/srv/site");
        assert_eq!(
            roots.resolve("/files/a.png", false),
            PathBuf::from("/srv/site/public/files/a.png")
        );
    }

    #[test]
    fn test_private_files_live_under_site_root() {
        let roots = SiteRoots::new("/srv/site");
        assert_eq!(
            roots.resolve("/private/files/a.png", true),
            PathBuf::from("/srv/site/private/files/a.png")
        );
    }
}
