//! The `.cpack` archive format.
//!
//! A `.cpack` file is a zip container with exactly two members:
//!
//! - `pack.zip`: the content container, holding every file of every
//!   package as `<package_dir_name>/<relative_path>`
//! - `pack.json`: the [`Manifest`]
//!
//! Keeping the content in its own container lets the registry and the
//! transport treat an archive as an opaque blob, while the installer can
//! read the manifest without unpacking any package files.

mod content;
mod manifest;

use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::HashSet;
use std::io::{Cursor, Read, Seek, Write};
use std::path::PathBuf;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::CipError;
use crate::runtime::Runtime;

pub use content::{extract_package, is_valid_package_name};
pub use manifest::Manifest;

/// File whose presence marks a directory as an installable package.
pub const MARKER_FILE: &str = "__init__.py";

/// Outer member holding the content container.
pub const CONTENT_MEMBER: &str = "pack.zip";

/// Outer member holding the serialized manifest.
pub const MANIFEST_MEMBER: &str = "pack.json";

pub const ARCHIVE_EXTENSION: &str = "cpack";

/// Builds a `.cpack` archive from one or more package directories.
///
/// Every directory must contain [`MARKER_FILE`]; the first one that does not
/// fails the build with [`CipError::InvalidPackageDir`]. Nothing is written
/// to disk, the archive is returned as bytes.
#[tracing::instrument(skip(runtime, package_dirs))]
pub fn build<R: Runtime>(
    runtime: &R,
    name: &str,
    version: &str,
    package_dirs: &[PathBuf],
) -> Result<Vec<u8>> {
    if package_dirs.is_empty() {
        return Err(CipError::NoPackages.into());
    }

    let packages = validate_package_dirs(runtime, package_dirs)?;
    let manifest = Manifest::new(
        name,
        version,
        packages.iter().map(|(name, _)| name.clone()).collect(),
    );
    debug!("Building {} with packages {:?}", manifest.archive_file_name(), manifest.packages);

    let content = content::build_content(runtime, &packages)?;
    let manifest_bytes = manifest.to_json()?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<()> =
        FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(CONTENT_MEMBER, options)
        .context("Failed to add content to archive")?;
    zip.write_all(&content)?;
    zip.start_file(MANIFEST_MEMBER, options)
        .context("Failed to add manifest to archive")?;
    zip.write_all(&manifest_bytes)?;

    let cursor = zip.finish().context("Failed to finish archive")?;
    Ok(cursor.into_inner())
}

/// Resolves each directory to its package name, checking for the marker file.
fn validate_package_dirs<R: Runtime>(
    runtime: &R,
    package_dirs: &[PathBuf],
) -> Result<Vec<(String, PathBuf)>> {
    let mut seen = HashSet::new();
    let mut packages = Vec::with_capacity(package_dirs.len());

    for dir in package_dirs {
        if !runtime.is_dir(dir) || !runtime.exists(&dir.join(MARKER_FILE)) {
            return Err(CipError::InvalidPackageDir(dir.clone()).into());
        }

        // "." and "pkg/.." have no usable file name until resolved
        let resolved = runtime.canonicalize(dir)?;
        let name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| is_valid_package_name(n))
            .ok_or_else(|| CipError::InvalidPackageDir(dir.clone()))?;

        if !seen.insert(name.clone()) {
            return Err(CipError::DuplicatePackage(name).into());
        }
        packages.push((name, resolved));
    }

    Ok(packages)
}

/// Reads an archive, returning its manifest and the raw content container.
///
/// Whether the content actually holds every listed package is checked by
/// the installer, package by package.
pub fn read(archive_bytes: &[u8]) -> Result<(Manifest, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(archive_bytes))
        .map_err(|e| CipError::CorruptArchive(format!("not a zip container: {}", e)))?;

    let manifest = Manifest::from_json(&read_member(&mut archive, MANIFEST_MEMBER)?)?;
    let content = read_member(&mut archive, CONTENT_MEMBER)?;

    if !manifest.is_same_producer() {
        warn!(
            "{} was created by cip {}, this is cip {}; it may not install cleanly",
            manifest.archive_file_name(),
            if manifest.producer_version.is_empty() {
                "(unknown)"
            } else {
                manifest.producer_version.as_str()
            },
            crate::CIP_VERSION
        );
    }

    Ok((manifest, content))
}

fn read_member<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>, CipError> {
    let mut entry = archive
        .by_name(name)
        .map_err(|_| CipError::CorruptArchive(format!("missing member {}", name)))?;

    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| CipError::CorruptArchive(format!("unreadable member {}: {}", name, e)))?;
    Ok(bytes)
}
