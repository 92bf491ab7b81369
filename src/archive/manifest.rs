use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::CIP_VERSION;
use crate::error::CipError;
use crate::naming::archive_file_name;

/// Descriptive record embedded in every archive as `pack.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    /// Package directory names, in the order they were given at build time.
    pub packages: Vec<String>,
    /// Version of the tool that produced the archive. Absent in very old archives.
    #[serde(rename = "cip_version", default)]
    pub producer_version: String,
}

impl Manifest {
    pub fn new(name: &str, version: &str, packages: Vec<String>) -> Self {
        Manifest {
            name: name.to_string(),
            version: version.to_string(),
            packages,
            producer_version: CIP_VERSION.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).context("Failed to serialize manifest")
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, CipError> {
        let manifest: Manifest = serde_json::from_slice(bytes)
            .map_err(|e| CipError::CorruptArchive(format!("unreadable manifest: {}", e)))?;

        if manifest.packages.is_empty() {
            return Err(CipError::CorruptArchive(
                "manifest lists no packages".to_string(),
            ));
        }

        Ok(manifest)
    }

    /// Conventional filename of this archive, e.g. `demo-1.0.cpack`.
    pub fn archive_file_name(&self) -> String {
        archive_file_name(&self.name, &self.version)
    }

    pub fn is_same_producer(&self) -> bool {
        self.producer_version == CIP_VERSION
    }
}
