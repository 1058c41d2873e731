//! Files embedded in notes.
//!
//! An [`Attachment`] is the binary content of a file together with the name
//! and extension the forum should see. An [`AttachmentSource`] resolves the
//! references found in a note into attachments.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("attachment not found: {0}")]
    NotFound(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name without extension.
    pub name: String,
    /// Extension without the leading dot. May be empty.
    pub extension: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    #[must_use]
    pub fn new(name: impl Into<String>, extension: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            extension: extension.into(),
            bytes,
        }
    }

    /// Name with extension, as sent in the upload.
    #[must_use]
    pub fn file_name(&self) -> String {
        if self.extension.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.extension)
        }
    }

    /// Read a file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub async fn from_path(path: &Path) -> Result<Self, AttachmentError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AttachmentError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let name = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            name,
            extension,
            bytes,
        })
    }
}

/// Resolves embed references into attachments.
#[async_trait]
pub trait AttachmentSource: Send + Sync {
    /// Load the file a note refers to as `reference`.
    async fn load(&self, reference: &str) -> Result<Attachment, AttachmentError>;
}

/// Attachments stored under a vault directory.
///
/// References are resolved relative to the root. A bare file name that is not
/// at the root is looked up anywhere below it, the way wiki-style embeds name
/// files without their folder.
#[derive(Debug, Clone)]
pub struct VaultDir {
    root: PathBuf,
}

impl VaultDir {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn find_by_name(&self, file_name: &str) -> Result<Option<PathBuf>, AttachmentError> {
        let mut stack = vec![self.root.clone()];

        while let Some(current) = stack.pop() {
            let mut dir = tokio::fs::read_dir(&current)
                .await
                .map_err(|source| AttachmentError::Read {
                    path: current.clone(),
                    source,
                })?;

            while let Some(entry) = dir.next_entry().await.map_err(|source| {
                AttachmentError::Read {
                    path: current.clone(),
                    source,
                }
            })? {
                let entry_path = entry.path();
                let Ok(file_type) = entry.file_type().await else {
                    continue;
                };

                if file_type.is_dir() {
                    stack.push(entry_path);
                } else if file_type.is_file()
                    && entry_path.file_name().and_then(|n| n.to_str()) == Some(file_name)
                {
                    return Ok(Some(entry_path));
                }
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl AttachmentSource for VaultDir {
    async fn load(&self, reference: &str) -> Result<Attachment, AttachmentError> {
        let decoded = urlencoding::decode(reference)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| reference.to_string());
        let relative = decoded.trim_start_matches("./").trim_start_matches('/');
        let direct = self.root.join(relative);

        if tokio::fs::metadata(&direct)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return Attachment::from_path(&direct).await;
        }

        let is_bare_name = !relative.contains('/');
        if is_bare_name {
            if let Some(found) = self.find_by_name(relative).await? {
                debug!(
                    reference = %reference,
                    path = %found.display(),
                    "Resolved attachment by name"
                );
                return Attachment::from_path(&found).await;
            }
        }

        Err(AttachmentError::NotFound(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_name() {
        assert_eq!(Attachment::new("photo", "png", vec![]).file_name(), "photo.png");
        assert_eq!(Attachment::new("README", "", vec![]).file_name(), "README");
    }

    #[tokio::test]
    async fn test_from_path_splits_name_and_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("diagram.final.svg");
        tokio::fs::write(&path, b"<svg/>").await.unwrap();

        let attachment = Attachment::from_path(&path).await.unwrap();
        assert_eq!(attachment.name, "diagram.final");
        assert_eq!(attachment.extension, "svg");
        assert_eq!(attachment.bytes, b"<svg/>");
    }

    #[tokio::test]
    async fn test_vault_resolves_relative_and_bare_names() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("assets").join("img");
        tokio::fs::create_dir_all(&nested).await.unwrap();
        tokio::fs::write(nested.join("cat.png"), b"meow").await.unwrap();

        let vault = VaultDir::new(dir.path());

        let by_path = vault.load("assets/img/cat.png").await.unwrap();
        assert_eq!(by_path.bytes, b"meow");

        let by_name = vault.load("cat.png").await.unwrap();
        assert_eq!(by_name.file_name(), "cat.png");

        let missing = vault.load("dog.png").await;
        assert!(matches!(missing, Err(AttachmentError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_vault_decodes_percent_encoded_references() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("my image.png"), b"x").await.unwrap();

        let vault = VaultDir::new(dir.path());
        let attachment = vault.load("my%20image.png").await.unwrap();
        assert_eq!(attachment.name, "my image");
    }
}
