use std::fmt;
use std::path::PathBuf;

/// What happened to one package of an archive during installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
    Installed { path: PathBuf },
    Skipped,
    Failed { reason: String },
}

impl fmt::Display for PackageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageOutcome::Installed { path } => write!(f, "installed to {}", path.display()),
            PackageOutcome::Skipped => write!(f, "skipped"),
            PackageOutcome::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReport {
    pub package: String,
    pub outcome: PackageOutcome,
}

/// Per-package results of installing one archive, in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub name: String,
    pub version: String,
    pub packages: Vec<PackageReport>,
}

impl InstallReport {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            packages: Vec::new(),
        }
    }

    pub fn record(&mut self, package: &str, outcome: PackageOutcome) {
        self.packages.push(PackageReport {
            package: package.to_string(),
            outcome,
        });
    }

    pub fn outcome(&self, package: &str) -> Option<&PackageOutcome> {
        self.packages
            .iter()
            .find(|p| p.package == package)
            .map(|p| &p.outcome)
    }

    pub fn installed(&self) -> impl Iterator<Item = &PackageReport> {
        self.packages
            .iter()
            .filter(|p| matches!(p.outcome, PackageOutcome::Installed { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &PackageReport> {
        self.packages
            .iter()
            .filter(|p| matches!(p.outcome, PackageOutcome::Failed { .. }))
    }

    /// True when no package failed. Skipped packages do not count as failures.
    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}
