//! Installing the packages of a `.cpack` archive into a library directory.

mod report;
mod target;

use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::archive::{self, extract_package, is_valid_package_name};
use crate::cleanup::ScratchDir;
use crate::error::CipError;
use crate::runtime::Runtime;

pub use report::{InstallReport, PackageOutcome, PackageReport};
pub use target::resolve_target;

/// What to do when the install target already holds a same-named entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Leave the existing entry alone and fail that package.
    #[default]
    Reject,
    /// Swap the existing entry out and the new package in. The previous
    /// entry is restored if the swap fails.
    Replace,
}

pub struct Installer<'a, R: Runtime> {
    runtime: &'a R,
    policy: ConflictPolicy,
}

impl<'a, R: Runtime> Installer<'a, R> {
    pub fn new(runtime: &'a R, policy: ConflictPolicy) -> Self {
        Self { runtime, policy }
    }

    /// Installs every package of the archive that `confirm` accepts into `target_root`.
    ///
    /// A package failure is recorded in the report and does not stop the
    /// remaining packages; packages already installed are left in place.
    /// The archive itself being unreadable, or the target not being a
    /// directory, fails the whole call.
    #[tracing::instrument(skip(self, archive_bytes, confirm))]
    pub fn install<F>(
        &self,
        archive_bytes: &[u8],
        target_root: &Path,
        mut confirm: F,
    ) -> Result<InstallReport>
    where
        F: FnMut(&str) -> bool,
    {
        if !self.runtime.is_dir(target_root) {
            return Err(CipError::InvalidTarget(target_root.to_path_buf()).into());
        }

        let (manifest, content) = archive::read(archive_bytes)?;
        info!(
            "Installing {} {} into {:?}",
            manifest.name, manifest.version, target_root
        );

        let scratch = ScratchDir::create(self.runtime, target_root)?;
        let mut report = InstallReport::new(&manifest.name, &manifest.version);

        for package in &manifest.packages {
            if !confirm(package) {
                info!("Skipping package {}", package);
                report.record(package, PackageOutcome::Skipped);
                continue;
            }

            match self.install_package(&content, package, &scratch, target_root) {
                Ok(path) => {
                    info!("Installed {} to {:?}", package, path);
                    report.record(package, PackageOutcome::Installed { path });
                }
                Err(e) => {
                    warn!("Failed to install {}: {:#}", package, e);
                    report.record(
                        package,
                        PackageOutcome::Failed {
                            reason: format!("{:#}", e),
                        },
                    );
                }
            }
        }

        Ok(report)
    }

    fn install_package(
        &self,
        content: &[u8],
        package: &str,
        scratch: &ScratchDir<'_, R>,
        target_root: &Path,
    ) -> Result<PathBuf> {
        if !is_valid_package_name(package) {
            return Err(CipError::CorruptArchive(format!(
                "manifest lists invalid package name '{}'",
                package
            ))
            .into());
        }

        let destination = target_root.join(package);
        if self.policy == ConflictPolicy::Reject && self.is_occupied(&destination) {
            return Err(CipError::InstallTargetConflict(destination).into());
        }

        let extract_dir = scratch.subdir("extract")?;
        let written = extract_package(self.runtime, content, package, &extract_dir)?;
        if written == 0 {
            return Err(CipError::CorruptArchive(format!(
                "package '{}' is listed in the manifest but has no content",
                package
            ))
            .into());
        }

        let extracted = extract_dir.join(package);
        if !self.runtime.is_dir(&extracted) {
            return Err(CipError::CorruptArchive(format!(
                "package '{}' does not extract to a directory",
                package
            ))
            .into());
        }

        self.place(&extracted, &destination, scratch)?;
        Ok(destination)
    }

    fn is_occupied(&self, path: &Path) -> bool {
        self.runtime.exists(path) || self.runtime.is_symlink(path)
    }

    /// Moves an extracted package directory to its final location.
    fn place(&self, extracted: &Path, destination: &Path, scratch: &ScratchDir<'_, R>) -> Result<()> {
        if !self.is_occupied(destination) {
            debug!("Moving {:?} to {:?}", extracted, destination);
            return self.runtime.rename(extracted, destination);
        }

        if self.policy == ConflictPolicy::Reject {
            return Err(CipError::InstallTargetConflict(destination.to_path_buf()).into());
        }

        // Park the previous entry in the scratch area; it goes away with it.
        let file_name = destination
            .file_name()
            .ok_or_else(|| anyhow!("{:?} has no file name", destination))?;
        let parked = scratch.subdir("replaced")?.join(file_name);
        debug!("Replacing {:?}, previous entry parked at {:?}", destination, parked);
        self.runtime.rename(destination, &parked)?;

        if let Err(e) = self.runtime.rename(extracted, destination) {
            warn!("Restoring previous {:?} after failed replace", destination);
            if let Err(restore_err) = self.runtime.rename(&parked, destination) {
                warn!("Failed to restore {:?}: {}", destination, restore_err);
            }
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use crate::test_utils::{assert_same_tree, write_package};
    use std::fs;
    use tempfile::tempdir;

    fn demo_archive(root: &Path) -> Result<(Vec<u8>, PathBuf)> {
        let demo = write_package(root, "demo", &[("mod.py", "print('demo')"), ("sub/util.py", "x = 1")])?;
        let bytes = archive::build(&RealRuntime, "demo", "1.0", &[demo.clone()])?;
        Ok((bytes, demo))
    }

    fn scratch_leftovers(target: &Path) -> usize {
        fs::read_dir(target)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with(".cip-scratch")
            })
            .count()
    }

    #[test]
    fn test_install_reproduces_source_tree() -> Result<()> {
        let src = tempdir()?;
        let target = tempdir()?;
        let (bytes, demo) = demo_archive(src.path())?;

        let installer = Installer::new(&RealRuntime, ConflictPolicy::Reject);
        let report = installer.install(&bytes, target.path(), |_| true)?;

        assert!(report.is_success());
        assert_eq!(
            report.outcome("demo"),
            Some(&PackageOutcome::Installed {
                path: target.path().join("demo")
            })
        );
        assert_same_tree(&demo, &target.path().join("demo"));
        assert_eq!(scratch_leftovers(target.path()), 0);
        Ok(())
    }

    #[test]
    fn test_declined_package_is_skipped() -> Result<()> {
        let src = tempdir()?;
        let target = tempdir()?;
        let a = write_package(src.path(), "a", &[("a.py", "a")])?;
        let b = write_package(src.path(), "b", &[("b.py", "b")])?;
        let bytes = archive::build(&RealRuntime, "bundle", "1.0", &[a, b])?;

        let mut asked = Vec::new();
        let installer = Installer::new(&RealRuntime, ConflictPolicy::Reject);
        let report = installer.install(&bytes, target.path(), |name| {
            asked.push(name.to_string());
            name != "a"
        })?;

        assert_eq!(asked, vec!["a", "b"]);
        assert_eq!(report.outcome("a"), Some(&PackageOutcome::Skipped));
        assert!(matches!(report.outcome("b"), Some(PackageOutcome::Installed { .. })));
        assert!(!target.path().join("a").exists());
        assert!(target.path().join("b/b.py").exists());
        Ok(())
    }

    #[test]
    fn test_conflict_is_rejected_by_default() -> Result<()> {
        let src = tempdir()?;
        let target = tempdir()?;
        let (bytes, _) = demo_archive(src.path())?;
        fs::create_dir(target.path().join("demo"))?;
        fs::write(target.path().join("demo/keep.py"), "mine")?;

        let installer = Installer::new(&RealRuntime, ConflictPolicy::Reject);
        let report = installer.install(&bytes, target.path(), |_| true)?;

        match report.outcome("demo") {
            Some(PackageOutcome::Failed { reason }) => assert!(reason.contains("already exists")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(fs::read_to_string(target.path().join("demo/keep.py"))?, "mine");
        assert!(!target.path().join("demo/mod.py").exists());
        assert_eq!(scratch_leftovers(target.path()), 0);
        Ok(())
    }

    #[test]
    fn test_replace_policy_swaps_existing_entry() -> Result<()> {
        let src = tempdir()?;
        let target = tempdir()?;
        let (bytes, demo) = demo_archive(src.path())?;
        fs::create_dir(target.path().join("demo"))?;
        fs::write(target.path().join("demo/stale.py"), "old")?;

        let installer = Installer::new(&RealRuntime, ConflictPolicy::Replace);
        let report = installer.install(&bytes, target.path(), |_| true)?;

        assert!(report.is_success());
        assert!(!target.path().join("demo/stale.py").exists());
        assert_same_tree(&demo, &target.path().join("demo"));
        assert_eq!(scratch_leftovers(target.path()), 0);
        Ok(())
    }

    #[test]
    fn test_one_failure_does_not_stop_other_packages() -> Result<()> {
        let src = tempdir()?;
        let target = tempdir()?;
        let a = write_package(src.path(), "a", &[])?;
        let b = write_package(src.path(), "b", &[])?;
        let bytes = archive::build(&RealRuntime, "bundle", "1.0", &[a, b])?;
        fs::write(target.path().join("a"), "a file in the way")?;

        let installer = Installer::new(&RealRuntime, ConflictPolicy::Reject);
        let report = installer.install(&bytes, target.path(), |_| true)?;

        assert!(!report.is_success());
        assert!(matches!(report.outcome("a"), Some(PackageOutcome::Failed { .. })));
        assert!(matches!(report.outcome("b"), Some(PackageOutcome::Installed { .. })));
        Ok(())
    }

    #[test]
    fn test_manifest_package_missing_from_content() -> Result<()> {
        use std::io::{Cursor, Write};
        use zip::ZipWriter;
        use zip::write::FileOptions;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<()> = FileOptions::default();
        zip.start_file(archive::CONTENT_MEMBER, options)?;
        zip.write_all(&ZipWriter::new(Cursor::new(Vec::new())).finish()?.into_inner())?;
        zip.start_file(archive::MANIFEST_MEMBER, options)?;
        zip.write_all(br#"{"name": "ghost", "version": "1.0", "packages": ["ghost"]}"#)?;
        let bytes = zip.finish()?.into_inner();

        let target = tempdir()?;
        let installer = Installer::new(&RealRuntime, ConflictPolicy::Reject);
        let report = installer.install(&bytes, target.path(), |_| true)?;

        match report.outcome("ghost") {
            Some(PackageOutcome::Failed { reason }) => assert!(reason.contains("no content")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(fs::read_dir(target.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_corrupt_archive_fails_whole_install() {
        let target = tempdir().unwrap();
        let installer = Installer::new(&RealRuntime, ConflictPolicy::Reject);
        let err = installer
            .install(b"garbage", target.path(), |_| true)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CipError>(),
            Some(CipError::CorruptArchive(_))
        ));
        assert_eq!(scratch_leftovers(target.path()), 0);
    }

    #[test]
    fn test_target_must_exist() {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_dir().returning(|_| false);

        let installer = Installer::new(&runtime, ConflictPolicy::Reject);
        let err = installer
            .install(b"irrelevant", Path::new("/no/such/lib"), |_| true)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CipError>(),
            Some(CipError::InvalidTarget(_))
        ));
    }
}
