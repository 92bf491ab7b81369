//! Archive filename convention: `<package_name>-<version>.<extension>`.
//!
//! The package name is everything before the first `-`, the version is
//! everything between that `-` and the final `.`, and the extension follows
//! the final `.`. A package name containing `-` therefore cannot round-trip;
//! this is a limitation of the wire format shared with existing registries.
//! All parsing and formatting of archive filenames goes through this module.

use std::fmt;
use std::str::FromStr;

use crate::archive::ARCHIVE_EXTENSION;
use crate::error::CipError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub package: String,
    pub version: String,
    pub extension: String,
}

impl ArchiveName {
    /// Name of a `.cpack` archive for the given package and version.
    pub fn new(package: &str, version: &str) -> Self {
        Self {
            package: package.to_string(),
            version: version.to_string(),
            extension: ARCHIVE_EXTENSION.to_string(),
        }
    }

    /// True if this filename encodes exactly `package` and `version`.
    pub fn matches(&self, package: &str, version: &str) -> bool {
        self.package == package && self.version == version
    }
}

impl FromStr for ArchiveName {
    type Err = CipError;

    fn from_str(filename: &str) -> Result<Self, Self::Err> {
        let invalid = || CipError::InvalidFilename(filename.to_string());

        let (package, rest) = filename.split_once('-').ok_or_else(invalid)?;
        let (version, extension) = rest.rsplit_once('.').ok_or_else(invalid)?;

        if package.is_empty() || version.is_empty() || extension.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            package: package.to_string(),
            version: version.to_string(),
            extension: extension.to_string(),
        })
    }
}

impl fmt::Display for ArchiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}.{}", self.package, self.version, self.extension)
    }
}

/// `<package>-<version>.cpack`
pub fn archive_file_name(package: &str, version: &str) -> String {
    ArchiveName::new(package, version).to_string()
}
