use anyhow::Result;
use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Scratch directory that is removed when the guard goes out of scope,
/// whether the work done inside it succeeded or not.
pub struct ScratchDir<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime> ScratchDir<'a, R> {
    /// Creates `<parent>/.cip-scratch-<pid>`, clearing any leftover from an earlier crash.
    ///
    /// Placing the scratch area next to the final destination keeps the last
    /// move a same-filesystem rename.
    pub fn create(runtime: &'a R, parent: &Path) -> Result<Self> {
        let path = parent.join(format!(".cip-scratch-{}", std::process::id()));
        if runtime.exists(&path) {
            debug!("Removing stale scratch directory {:?}", path);
            runtime.remove_dir_all(&path)?;
        }
        runtime.create_dir_all(&path)?;
        debug!("Created scratch directory {:?}", path);
        Ok(Self { runtime, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A subdirectory of the scratch area, created on demand.
    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.path.join(name);
        if !self.runtime.exists(&dir) {
            self.runtime.create_dir_all(&dir)?;
        }
        Ok(dir)
    }
}

impl<R: Runtime> Drop for ScratchDir<'_, R> {
    fn drop(&mut self) {
        if !self.runtime.exists(&self.path) {
            return;
        }
        debug!("Cleaning up: {:?}", self.path);
        if let Err(e) = self.runtime.remove_dir_all(&self.path) {
            warn!("Failed to remove scratch directory {:?}: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_scratch_dir_removed_on_drop() {
        let dir = tempdir().unwrap();
        let path;
        {
            let scratch = ScratchDir::create(&RealRuntime, dir.path()).unwrap();
            path = scratch.path().to_path_buf();
            fs::write(path.join("file.txt"), "test").unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_dir_removed_after_error() {
        let dir = tempdir().unwrap();
        let mut leaked = None;

        let result = (|| -> Result<()> {
            let scratch = ScratchDir::create(&RealRuntime, dir.path())?;
            leaked = Some(scratch.subdir("extract")?);
            anyhow::bail!("extraction failed")
        })();

        assert!(result.is_err());
        assert!(!leaked.unwrap().exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_scratch_dir_replaces_stale_leftover() {
        let dir = tempdir().unwrap();
        let stale = dir.path().join(format!(".cip-scratch-{}", std::process::id()));
        fs::create_dir(&stale).unwrap();
        fs::write(stale.join("old.txt"), "old").unwrap();

        let scratch = ScratchDir::create(&RealRuntime, dir.path()).unwrap();
        assert_eq!(scratch.path(), stale);
        assert!(!stale.join("old.txt").exists());
    }

    #[test]
    fn test_scratch_dir_removal_failure_is_not_fatal() {
        let mut runtime = MockRuntime::new();
        let parent = PathBuf::from("/target");
        let path = parent.join(format!(".cip-scratch-{}", std::process::id()));

        let mut seq = mockall::Sequence::new();
        runtime
            .expect_exists()
            .with(eq(path.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| false);
        runtime
            .expect_create_dir_all()
            .with(eq(path.clone()))
            .returning(|_| Ok(()));
        runtime
            .expect_exists()
            .with(eq(path.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| true);
        runtime
            .expect_remove_dir_all()
            .with(eq(path))
            .returning(|_| Err(anyhow::anyhow!("permission denied")));

        let scratch = ScratchDir::create(&runtime, &parent).unwrap();
        drop(scratch);
    }
}
