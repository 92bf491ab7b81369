use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

use crate::archive;
use crate::naming::archive_file_name;
use crate::runtime::Runtime;

/// Builds `<name>-<version>.cpack` from `dirs` and writes it to `output`
/// (default: the file name in the working directory).
#[tracing::instrument(skip(runtime, dirs))]
pub fn create<R: Runtime>(
    runtime: &R,
    name: &str,
    version: &str,
    dirs: &[PathBuf],
    output: Option<PathBuf>,
) -> Result<PathBuf> {
    let bytes = archive::build(runtime, name, version, dirs)?;
    let path = output.unwrap_or_else(|| Path::new(".").join(archive_file_name(name, version)));

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !runtime.exists(parent)
    {
        runtime.create_dir_all(parent)?;
    }
    runtime
        .write(&path, &bytes)
        .with_context(|| format!("Failed to write archive {:?}", path))?;

    info!("Wrote {} bytes to {:?}", bytes.len(), path);
    println!(
        "Created {} ({} package(s))",
        path.display(),
        dirs.len()
    );
    Ok(path)
}
