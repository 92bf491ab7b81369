use anyhow::{Context, Result, bail};
use log::warn;
use std::path::{Path, PathBuf};

use crate::config::CipConfig;
use crate::install::{ConflictPolicy, InstallReport, Installer, resolve_target};
use crate::runtime::Runtime;

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Library directory; falls back to the configured `install_target`.
    pub target: Option<PathBuf>,
    /// Install every package without asking.
    pub yes: bool,
    /// Replace packages that already exist in the target.
    pub force: bool,
}

impl InstallOptions {
    fn policy(&self) -> ConflictPolicy {
        if self.force {
            ConflictPolicy::Replace
        } else {
            ConflictPolicy::Reject
        }
    }
}

/// Installs the archive at `archive_path`.
#[tracing::instrument(skip(runtime, config, options))]
pub fn install<R: Runtime>(
    runtime: &R,
    config: &CipConfig,
    archive_path: &Path,
    options: &InstallOptions,
) -> Result<InstallReport> {
    let bytes = runtime
        .read(archive_path)
        .with_context(|| format!("Failed to read archive {:?}", archive_path))?;
    install_bytes(runtime, config, &bytes, options)
}

/// Installs an archive already held in memory and prints one line per package.
///
/// Fails after printing if any package could not be installed.
pub fn install_bytes<R: Runtime>(
    runtime: &R,
    config: &CipConfig,
    archive_bytes: &[u8],
    options: &InstallOptions,
) -> Result<InstallReport> {
    let target = resolve_target(runtime, options.target.clone(), config)?;
    let installer = Installer::new(runtime, options.policy());

    let report = installer.install(archive_bytes, &target, |package| {
        confirm_package(runtime, options.yes, package, &target)
    })?;

    println!("{} {}:", report.name, report.version);
    for entry in &report.packages {
        println!("  {}: {}", entry.package, entry.outcome);
    }

    let failed = report.failed().count();
    if failed > 0 {
        bail!("{} package(s) failed to install", failed);
    }
    Ok(report)
}

fn confirm_package<R: Runtime>(runtime: &R, yes: bool, package: &str, target: &Path) -> bool {
    if yes {
        return true;
    }
    let prompt = format!("Install {} into {}?", package, target.display());
    match runtime.confirm(&prompt) {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Could not read confirmation for {}: {:#}", package, e);
            false
        }
    }
}
