use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::naming::ArchiveName;

/// Package name to the archive filenames known for it.
///
/// Filenames keep their insertion order; repeated inserts are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryIndex {
    packages: BTreeMap<String, Vec<String>>,
}

impl RegistryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from stored filenames, skipping those that do not
    /// follow the `<name>-<version>.<ext>` convention.
    pub fn from_filenames<I, S>(filenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::new();
        for filename in filenames {
            let filename = filename.as_ref();
            match filename.parse::<ArchiveName>() {
                Ok(name) => {
                    index.insert(&name.package, filename);
                }
                Err(_) => debug!("Skipping non-archive file {:?}", filename),
            }
        }
        index
    }

    /// Returns true if `filename` was not yet listed under `package`.
    pub fn insert(&mut self, package: &str, filename: &str) -> bool {
        let files = self.packages.entry(package.to_string()).or_default();
        if files.iter().any(|f| f == filename) {
            return false;
        }
        files.push(filename.to_string());
        true
    }

    pub fn files(&self, package: &str) -> Option<&[String]> {
        self.packages.get(package).map(Vec::as_slice)
    }

    pub fn packages(&self) -> &BTreeMap<String, Vec<String>> {
        &self.packages
    }
}
