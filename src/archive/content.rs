//! The inner content container (`pack.zip`): one file tree per package,
//! each rooted at the package directory's own name.

use anyhow::{Context, Result};
use log::debug;
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::runtime::Runtime;

/// Builds a content container from `(package_name, directory)` pairs.
#[tracing::instrument(skip(runtime, packages))]
pub fn build_content<R: Runtime>(runtime: &R, packages: &[(String, PathBuf)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<()> =
        FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, dir) in packages {
        let mut files = Vec::new();
        collect_files(runtime, dir, &mut files)?;
        debug!("Packing {} file(s) from {:?} as {}/", files.len(), dir, name);

        for file in files {
            let relative = file
                .strip_prefix(dir)
                .with_context(|| format!("{:?} is outside {:?}", file, dir))?;
            let entry_name = format!("{}/{}", name, to_entry_path(relative));

            let mut contents = Vec::new();
            runtime
                .open(&file)?
                .read_to_end(&mut contents)
                .with_context(|| format!("Failed to read {:?}", file))?;

            zip.start_file(entry_name.as_str(), options)
                .with_context(|| format!("Failed to add {} to content archive", entry_name))?;
            zip.write_all(&contents)?;
        }
    }

    let cursor = zip.finish().context("Failed to finish content archive")?;
    Ok(cursor.into_inner())
}

/// Recursively lists regular files under `dir`. Symlinked directories are not followed.
fn collect_files<R: Runtime>(runtime: &R, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in runtime.read_dir(dir)? {
        if runtime.is_dir(&entry) {
            if runtime.is_symlink(&entry) {
                debug!("Skipping symlinked directory {:?}", entry);
                continue;
            }
            collect_files(runtime, &entry, files)?;
        } else {
            files.push(entry);
        }
    }
    Ok(())
}

/// Zip entry names always use forward slashes.
fn to_entry_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// True if `name` is usable as a single directory name inside the install target.
pub fn is_valid_package_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

/// Extracts the entries under `<package>/` from a content container into
/// `extract_to`, producing `extract_to/<package>/...`.
///
/// Returns the number of entries written; zero means the container holds
/// nothing for this package.
#[tracing::instrument(skip(runtime, content, extract_to))]
pub fn extract_package<R: Runtime>(
    runtime: &R,
    content: &[u8],
    package: &str,
    extract_to: &Path,
) -> Result<usize> {
    let mut archive =
        ZipArchive::new(Cursor::new(content)).context("Failed to parse content archive")?;
    let prefix = format!("{}/", package);
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read content entry {}", i))?;

        if !entry.name().starts_with(&prefix) {
            continue;
        }

        let entry_path = match entry.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                debug!("Skipping entry with invalid path: {}", entry.name());
                continue;
            }
        };

        let full_path = extract_to.join(&entry_path);

        if entry.is_dir() {
            runtime.create_dir_all(&full_path)?;
        } else {
            if let Some(parent) = full_path.parent() {
                runtime.create_dir_all(parent)?;
            }
            let mut dest_file = runtime.create_file(&full_path)?;
            std::io::copy(&mut entry, &mut dest_file)
                .with_context(|| format!("Failed to extract file {:?}", full_path))?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode()
                && let Err(e) = runtime.set_permissions(&full_path, mode)
            {
                debug!("Failed to set permissions on {:?}: {}", full_path, e);
            }
        }
        written += 1;
    }

    debug!("Extracted {} entries for package {}", written, package);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use crate::test_utils::write_package;
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::tempdir;

    fn entry_names(content: &[u8]) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(content)).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[test]
    fn test_build_content_roots_entries_at_package_name() -> Result<()> {
        let dir = tempdir()?;
        let demo = write_package(dir.path(), "demo", &[("mod.py", "x = 1"), ("sub/deep.py", "")])?;

        let content = build_content(&RealRuntime, &[("demo".to_string(), demo)])?;

        let mut names = entry_names(&content);
        names.sort();
        assert_eq!(names, vec!["demo/__init__.py", "demo/mod.py", "demo/sub/deep.py"]);
        Ok(())
    }

    #[test]
    fn test_build_content_reads_through_runtime() -> Result<()> {
        let mut runtime = MockRuntime::new();
        let dir = PathBuf::from("/src/demo");
        let file = dir.join("__init__.py");

        runtime
            .expect_read_dir()
            .with(eq(dir.clone()))
            .returning(|_| Ok(vec![PathBuf::from("/src/demo/__init__.py")]));
        runtime
            .expect_is_dir()
            .with(eq(file.clone()))
            .returning(|_| false);
        runtime
            .expect_open()
            .with(eq(file))
            .returning(|_| Ok(Box::new(Cursor::new(b"hello".to_vec()))));

        let content = build_content(&runtime, &[("demo".to_string(), dir)])?;
        assert_eq!(entry_names(&content), vec!["demo/__init__.py"]);
        Ok(())
    }

    #[test]
    fn test_extract_package_only_takes_its_own_prefix() -> Result<()> {
        let dir = tempdir()?;
        let alpha = write_package(dir.path(), "alpha", &[("a.py", "a")])?;
        let alphabet = write_package(dir.path(), "alphabet", &[("b.py", "b")])?;
        let content = build_content(
            &RealRuntime,
            &[("alpha".to_string(), alpha), ("alphabet".to_string(), alphabet)],
        )?;

        let out = dir.path().join("out");
        fs::create_dir(&out)?;
        let written = extract_package(&RealRuntime, &content, "alpha", &out)?;

        assert_eq!(written, 2);
        assert_eq!(fs::read_to_string(out.join("alpha/a.py"))?, "a");
        assert!(!out.join("alphabet").exists());
        Ok(())
    }

    #[test]
    fn test_extract_missing_package_writes_nothing() -> Result<()> {
        let dir = tempdir()?;
        let demo = write_package(dir.path(), "demo", &[])?;
        let content = build_content(&RealRuntime, &[("demo".to_string(), demo)])?;

        let out = dir.path().join("out");
        fs::create_dir(&out)?;
        assert_eq!(extract_package(&RealRuntime, &content, "other", &out)?, 0);
        assert_eq!(fs::read_dir(&out)?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_extract_skips_escaping_entries() -> Result<()> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<()> = FileOptions::default();
        zip.start_file("demo/../../evil.py", options)?;
        zip.write_all(b"boom")?;
        zip.start_file("demo/ok.py", options)?;
        zip.write_all(b"ok")?;
        let content = zip.finish()?.into_inner();

        let dir = tempdir()?;
        let out = dir.path().join("scratch");
        fs::create_dir(&out)?;
        let written = extract_package(&RealRuntime, &content, "demo", &out)?;

        assert_eq!(written, 1);
        assert!(out.join("demo/ok.py").exists());
        assert!(!dir.path().join("evil.py").exists());
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_extract_restores_permissions() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<()> = FileOptions::default().unix_permissions(0o755);
        zip.start_file("demo/run.sh", options)?;
        zip.write_all(b"#!/bin/sh\n")?;
        let content = zip.finish()?.into_inner();

        let dir = tempdir()?;
        extract_package(&RealRuntime, &content, "demo", dir.path())?;

        let mode = fs::metadata(dir.path().join("demo/run.sh"))?.permissions().mode();
        assert!(mode & 0o111 != 0, "expected run.sh to be executable, mode {:o}", mode);
        Ok(())
    }

    #[test]
    fn test_is_valid_package_name() {
        assert!(is_valid_package_name("demo"));
        assert!(is_valid_package_name("demo_utils"));
        assert!(!is_valid_package_name(""));
        assert!(!is_valid_package_name(".."));
        assert!(!is_valid_package_name("a/b"));
        assert!(!is_valid_package_name("/abs"));
    }
}
