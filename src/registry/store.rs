//! Flat directory of uploaded archives, one file per filename.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use tokio::fs;

use crate::error::CipError;

#[derive(Debug, Clone)]
pub struct ArchiveStore {
    dir: PathBuf,
}

impl ArchiveStore {
    /// Opens the store, creating the directory if it does not exist.
    #[tracing::instrument]
    pub async fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create storage directory {:?}", dir))?;
        debug!("Archive store at {:?}", dir);
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of the regular files in the store, sorted.
    pub async fn filenames(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to read storage directory {:?}", self.dir))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => debug!("Skipping non UTF-8 filename {:?}", raw),
            }
        }
        names.sort();
        Ok(names)
    }

    /// Writes `bytes` under `filename`, replacing any previous file.
    #[tracing::instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(filename)?;
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {:?}", path))
    }

    /// Reads `filename`, or `None` if it is not stored.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(filename)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
        }
    }

    fn path_for(&self, filename: &str) -> Result<PathBuf, CipError> {
        validate_filename(filename)?;
        Ok(self.dir.join(filename))
    }
}

/// A stored filename must be a single plain path component that can be
/// quoted in a `Content-Disposition` header.
pub fn validate_filename(filename: &str) -> Result<(), CipError> {
    if filename.is_empty() {
        return Err(CipError::MissingFilename);
    }
    if filename == "."
        || filename == ".."
        || filename.contains('/')
        || filename.contains('\\')
        || filename.chars().any(|c| c == '"' || c.is_control())
    {
        return Err(CipError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}
