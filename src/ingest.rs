//! Turns an untrusted upload into a safely named file under the storage root.
//!
//! Gates run in order and stop at the first failure: payload size, extension
//! allow-list, declared MIME type, sniffed MIME type, filename sanitisation,
//! destination confinement, no-overwrite, streaming write, and finally the
//! atomic consumption of one use of the upload link.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::clock::{Clock, TokenSource};
use crate::config::UploadConfig;
use crate::links::LinkError;
use crate::paths;
use crate::sniff::{sniff_content_type, SNIFF_LEN};
use crate::storage::{Database, DatabaseError, Link, LinkKind};

/// Longest stored filename, in bytes.
pub const MAX_FILE_NAME_LEN: usize = 255;

const PREFIX_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("File is empty")]
    Empty,
    #[error("File exceeds maximum upload size of {0} bytes")]
    TooLarge(u64),
    #[error("Unsafe content: {0}")]
    UnsafeContent(String),
    #[error("Invalid upload target: {0}")]
    InvalidTarget(String),
    #[error("File already exists")]
    FileExists,
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Where an upload lands.
#[derive(Debug, Clone, Copy)]
pub enum IngestTarget<'a> {
    /// Through an upload link. The directory is created on first use and one use
    /// is consumed after the write succeeds.
    Link(&'a Link),
    /// By an authenticated admin. The directory must already exist and nothing
    /// is consumed; `marker` takes the token's place in the stored name.
    Directory { name: &'a str, marker: &'a str },
}

pub struct UploadPipeline {
    config: UploadConfig,
    db: Database,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenSource>,
}

impl UploadPipeline {
    pub fn new(
        config: UploadConfig,
        db: Database,
        clock: Arc<dyn Clock>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            config,
            db,
            clock,
            tokens,
        }
    }

    /// Validate and store one file, returning its path on disk.
    pub async fn ingest<R>(
        &self,
        mut reader: R,
        declared_filename: &str,
        declared_content_type: Option<&str>,
        target: IngestTarget<'_>,
    ) -> Result<PathBuf, IngestError>
    where
        R: AsyncRead + Unpin,
    {
        let max = self.config.max_file_size;

        let mut head = Vec::with_capacity(SNIFF_LEN);
        (&mut reader)
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut head)
            .await?;
        if head.is_empty() {
            return Err(IngestError::Empty);
        }
        if head.len() as u64 > max {
            return Err(IngestError::TooLarge(max));
        }

        if !self.extension_allowed(declared_filename) {
            return Err(IngestError::UnsafeContent(format!(
                "extension '{}' is not allowed",
                paths::extension(declared_filename)
            )));
        }

        let declared = declared_content_type.unwrap_or_default();
        if !self.mime_allowed(declared) {
            return Err(IngestError::UnsafeContent(format!(
                "declared type '{declared}' is not allowed"
            )));
        }

        let sniffed = sniff_content_type(&head);
        if !self.mime_allowed(&sniffed) {
            return Err(IngestError::UnsafeContent(format!(
                "detected type '{sniffed}' is not allowed"
            )));
        }

        let (directory, marker) = match target {
            IngestTarget::Link(link) => (link.directory.as_str(), link.token.as_str()),
            IngestTarget::Directory { name, marker } => (name, marker),
        };
        let file_name = self.stored_file_name(declared_filename, marker);

        let dir = self.resolve_directory(directory, &target).await?;
        let path = dir.join(&file_name);
        if !paths::is_bare_component(&file_name) || path.parent() != Some(dir.as_path()) {
            return Err(IngestError::InvalidTarget(
                "stored name escapes the target directory".into(),
            ));
        }

        let size = match self.write_file(&path, &head, &mut reader).await {
            Ok(size) => size,
            Err(IngestError::FileExists) => return Err(IngestError::FileExists),
            Err(e) => {
                remove_partial(&path).await;
                return Err(e);
            }
        };

        if let IngestTarget::Link(link) = target {
            match self
                .db
                .consume_link(LinkKind::Upload, &link.token, self.clock.now())
            {
                Ok(true) => {}
                Ok(false) => {
                    // The link ran out between validation and this point; keep the
                    // use count authoritative and drop the file we just wrote.
                    tracing::warn!(
                        link_id = link.id,
                        path = %path.display(),
                        "Upload link exhausted or expired after write, removing file"
                    );
                    remove_partial(&path).await;
                    return Err(LinkError::TokenExhausted.into());
                }
                Err(e) => {
                    remove_partial(&path).await;
                    return Err(e.into());
                }
            }
        }

        tracing::debug!(path = %path.display(), bytes = size, "Stored upload");
        Ok(path)
    }

    fn extension_allowed(&self, filename: &str) -> bool {
        let ext = paths::extension(filename);
        self.config.allowed_extensions.iter().any(|a| a == ext)
    }

    fn mime_allowed(&self, mime: &str) -> bool {
        !mime.is_empty()
            && self
                .config
                .allowed_mime_types
                .iter()
                .any(|a| mime.starts_with(a.as_str()))
    }

    /// `<random>-<marker>-<sanitised base><ext>`, cut to [`MAX_FILE_NAME_LEN`]
    /// while keeping the extension.
    fn stored_file_name(&self, declared: &str, marker: &str) -> String {
        build_file_name(&self.tokens.token(PREFIX_LEN), marker, declared)
    }

    async fn resolve_directory(
        &self,
        directory: &str,
        target: &IngestTarget<'_>,
    ) -> Result<PathBuf, IngestError> {
        if !paths::is_bare_component(directory) {
            return Err(IngestError::InvalidTarget(format!(
                "'{directory}' is not a plain directory name"
            )));
        }
        let dir = self.config.storage_root.join(directory);

        match target {
            IngestTarget::Link(_) => {
                fs::create_dir_all(&dir).await?;
            }
            IngestTarget::Directory { .. } => match fs::metadata(&dir).await {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    return Err(IngestError::InvalidTarget(format!(
                        "'{directory}' is not a directory"
                    )))
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(IngestError::InvalidTarget(format!(
                        "directory '{directory}' does not exist"
                    )))
                }
                Err(e) => return Err(e.into()),
            },
        }
        Ok(dir)
    }

    async fn write_file<R>(
        &self,
        path: &Path,
        head: &[u8],
        reader: &mut R,
    ) -> Result<u64, IngestError>
    where
        R: AsyncRead + Unpin,
    {
        let max = self.config.max_file_size;

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::error!(path = %path.display(), "Stored filename collided with an existing file");
                return Err(IngestError::FileExists);
            }
            Err(e) => return Err(e.into()),
        };

        file.write_all(head).await?;
        let allowance = max - head.len() as u64;
        let copied = tokio::io::copy(&mut reader.take(allowance + 1), &mut file).await?;
        if copied > allowance {
            return Err(IngestError::TooLarge(max));
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(head.len() as u64 + copied)
    }
}

/// Assemble a stored filename from its parts.
pub fn build_file_name(prefix: &str, marker: &str, declared: &str) -> String {
    let cleaned = paths::sanitize_file_name(declared);
    let ext = paths::extension(&cleaned);
    let base = &cleaned[..cleaned.len() - ext.len()];

    let mut name = format!("{prefix}-{marker}-{base}{ext}");
    if name.len() > MAX_FILE_NAME_LEN {
        // Everything is ASCII after sanitisation, so byte offsets are char boundaries.
        let ext = &ext[..ext.len().min(MAX_FILE_NAME_LEN)];
        name.truncate(MAX_FILE_NAME_LEN - ext.len());
        name.push_str(ext);
    }
    name
}

async fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_file_name() {
        assert_eq!(
            build_file_name("AAAAAAAAAAAAAAAA", "tok", "notes.txt"),
            "AAAAAAAAAAAAAAAA-tok-notes.txt"
        );
    }

    #[test]
    fn test_build_file_name_strips_traversal() {
        let name = build_file_name("AAAAAAAAAAAAAAAA", "tok", "../../etc/passwd");
        assert_eq!(name, "AAAAAAAAAAAAAAAA-tok-passwd");
        assert!(paths::is_bare_component(&name));
    }

    #[test]
    fn test_build_file_name_truncates_keeping_extension() {
        let long = format!("{}.txt", "x".repeat(400));
        let name = build_file_name("AAAAAAAAAAAAAAAA", "tok", &long);
        assert_eq!(name.len(), MAX_FILE_NAME_LEN);
        assert!(name.ends_with(".txt"));
        assert!(name.starts_with("AAAAAAAAAAAAAAAA-tok-xxx"));
    }

    #[test]
    fn test_build_file_name_display_roundtrip() {
        let name = build_file_name("AAAAAAAAAAAAAAAA", "tok", "quarterly-report.txt");
        assert_eq!(paths::display_name(&name), "quarterly-report.txt");
    }
}
