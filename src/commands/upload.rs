use anyhow::{Context, Result, anyhow};
use log::debug;
use std::path::Path;

use crate::archive;
use crate::registry::RegistryTransport;
use crate::runtime::Runtime;

/// Uploads an archive file. Name and version come from its manifest.
#[tracing::instrument(skip(runtime, transport))]
pub async fn upload<R: Runtime, T: RegistryTransport>(
    runtime: &R,
    transport: &T,
    archive_path: &Path,
) -> Result<String> {
    let bytes = runtime
        .read(archive_path)
        .with_context(|| format!("Failed to read archive {:?}", archive_path))?;
    let (manifest, _) =
        archive::read(&bytes).with_context(|| format!("Failed to read {:?}", archive_path))?;

    let filename = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Archive path {:?} has no file name", archive_path))?;
    debug!(
        "Uploading {} as {} {}",
        filename, manifest.name, manifest.version
    );

    let message = transport
        .upload(&filename, bytes, &manifest.name, &manifest.version)
        .await?;
    println!("{}", message);
    Ok(message)
}
