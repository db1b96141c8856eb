//! Read-only view of the storage root for the admin pages and download links.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::fs;

use crate::paths;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("File exceeds the maximum allowed size")]
    TooLarge,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct DirectorySummary {
    pub name: String,
    pub file_count: usize,
    pub total_size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub name: String,
    pub display_name: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct DirectoryListing {
    pub name: String,
    pub file_count: usize,
    pub files: Vec<FileEntry>,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Lists directories and files under the storage root.
pub struct DirectoryCatalog {
    root: PathBuf,
    max_file_size: u64,
}

impl DirectoryCatalog {
    pub fn new<P: AsRef<Path>>(root: P, max_file_size: u64) -> Result<Self, io::Error> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            max_file_size,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Immediate sub-directories of the root, sorted by name.
    pub async fn list_directories(&self) -> Result<Vec<DirectorySummary>, CatalogError> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut directories = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let files = self.read_files(&entry.path()).await?;

            directories.push(DirectorySummary {
                name,
                file_count: files.len(),
                total_size: files.iter().map(|f| f.size).sum(),
                last_modified: modified(&meta),
            });
        }

        directories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(directories)
    }

    /// Regular files of one directory, sorted by name.
    pub async fn list_files(&self, directory: &str) -> Result<DirectoryListing, CatalogError> {
        let dir = self.directory_path(directory)?;
        let meta = match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => meta,
            Ok(_) => return Err(CatalogError::NotFound(directory.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CatalogError::NotFound(directory.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let files = self.read_files(&dir).await?;
        Ok(DirectoryListing {
            name: directory.to_string(),
            file_count: files.len(),
            size: files.iter().map(|f| f.size).sum(),
            files,
            last_modified: modified(&meta),
        })
    }

    /// True when `directory` names an existing sub-directory of the root.
    pub fn directory_exists(&self, directory: &str) -> bool {
        match self.directory_path(directory) {
            Ok(dir) => dir.is_dir(),
            Err(_) => false,
        }
    }

    /// Locate a file for serving. Both names must be single path components, the
    /// canonical path must stay under the root, and the file may not exceed the
    /// upload size ceiling.
    pub async fn resolve_file_path(
        &self,
        directory: &str,
        filename: &str,
    ) -> Result<(PathBuf, Metadata), CatalogError> {
        let dir = self.directory_path(directory)?;
        if !paths::is_bare_component(filename) {
            return Err(CatalogError::InvalidName(filename.to_string()));
        }

        let path = dir.join(filename);
        let canonical = match fs::canonicalize(&path).await {
            Ok(p) => p,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CatalogError::NotFound(filename.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let root = fs::canonicalize(&self.root).await?;
        if !canonical.starts_with(&root) {
            return Err(CatalogError::InvalidName(filename.to_string()));
        }

        let meta = fs::metadata(&canonical).await?;
        if !meta.is_file() {
            return Err(CatalogError::NotFound(filename.to_string()));
        }
        if meta.len() > self.max_file_size {
            return Err(CatalogError::TooLarge);
        }

        Ok((canonical, meta))
    }

    fn directory_path(&self, directory: &str) -> Result<PathBuf, CatalogError> {
        if !paths::is_bare_component(directory) {
            return Err(CatalogError::InvalidName(directory.to_string()));
        }
        Ok(self.root.join(directory))
    }

    async fn read_files(&self, dir: &Path) -> Result<Vec<FileEntry>, CatalogError> {
        let mut entries = fs::read_dir(dir).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Failed to stat file");
                    continue;
                }
            };
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            files.push(FileEntry {
                display_name: paths::display_name(&name).to_string(),
                name,
                size: meta.len(),
                last_modified: modified(&meta),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }
}

fn modified(meta: &Metadata) -> Option<DateTime<Utc>> {
    meta.modified().ok().map(DateTime::<Utc>::from)
}
