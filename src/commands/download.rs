use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

use super::install::{InstallOptions, install_bytes};
use crate::config::CipConfig;
use crate::naming::archive_file_name;
use crate::registry::RegistryTransport;
use crate::runtime::Runtime;

/// Downloads `<name>-<version>.cpack` into `out_dir`, then installs it when
/// `install` is given.
#[tracing::instrument(skip(runtime, transport, config, install))]
pub async fn download<R: Runtime, T: RegistryTransport>(
    runtime: &R,
    transport: &T,
    config: &CipConfig,
    name: &str,
    version: &str,
    out_dir: &Path,
    install: Option<&InstallOptions>,
) -> Result<PathBuf> {
    let filename = archive_file_name(name, version);
    let bytes = transport.download(name, version, &filename).await?;

    let path = out_dir.join(&filename);
    runtime
        .write(&path, &bytes)
        .with_context(|| format!("Failed to write {:?}", path))?;
    info!("Saved {} bytes to {:?}", bytes.len(), path);
    println!("Downloaded {}", path.display());

    if let Some(options) = install {
        install_bytes(runtime, config, &bytes, options)?;
    }
    Ok(path)
}
