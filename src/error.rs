//! Error kinds shared by the archive codec, installer, registry and client.
//!
//! Library functions return `anyhow::Result`; domain failures carry a
//! [`CipError`] as their root cause so callers can `downcast_ref` and branch
//! on the kind (the registry server maps kinds to HTTP status codes).

use std::path::PathBuf;

use thiserror::Error;

use crate::archive::MARKER_FILE;

#[derive(Debug, Error)]
pub enum CipError {
    #[error("Directory {} is not a valid package (missing {})", .0.display(), MARKER_FILE)]
    InvalidPackageDir(PathBuf),

    #[error("No package directories given")]
    NoPackages,

    #[error("Package '{0}' is given more than once")]
    DuplicatePackage(String),

    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("Install target {} already exists", .0.display())]
    InstallTargetConflict(PathBuf),

    #[error("Install target {} is not a directory", .0.display())]
    InvalidTarget(PathBuf),

    #[error("No file was uploaded")]
    MissingFile,

    #[error("Uploaded file has no filename")]
    MissingFilename,

    #[error("Invalid archive filename '{0}'")]
    InvalidFilename(String),

    #[error("No package name given and none can be derived from the filename")]
    MissingPackageName,

    #[error("{0}")]
    NotFound(String),

    #[error("File '{filename}' does not belong to {package_name} {version}")]
    NameMismatch {
        filename: String,
        package_name: String,
        version: String,
    },

    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("Registry error (HTTP {status}): {message}")]
    RegistryError { status: u16, message: String },

    #[error("Unknown config key '{0}'")]
    UnknownConfigKey(String),
}
