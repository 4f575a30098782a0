//! What is currently materialized in an extension's vendor directory.

use crate::core::path::{installed_file, write_atomic};
use crate::core::version::Version;
use crate::core::{XpmError, XpmResult};
use crate::repository::{Dist, PackageMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A package that completed installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub version: Version,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub require: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist: Option<Dist>,
    /// Tree hash of the package directory right after placement
    pub checksum: String,
    pub installed_at: DateTime<Utc>,
}

/// `<vendor>/.xpm/installed.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledState {
    #[serde(default)]
    pub packages: BTreeMap<String, InstalledPackage>,
}

impl InstalledState {
    /// Load the state of a vendor directory; an absent file is an empty state
    pub fn load(vendor_dir: &Path) -> XpmResult<Self> {
        let path = installed_file(vendor_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            XpmError::Package(format!(
                "Failed to parse installed state {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Atomically replace the state file
    pub fn save(&self, vendor_dir: &Path) -> XpmResult<()> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        write_atomic(&installed_file(vendor_dir), content.as_bytes())
    }

    pub fn get(&self, name: &str) -> Option<&InstalledPackage> {
        self.packages.get(name)
    }

    /// Record a package whose files were just placed
    pub fn record(&mut self, package: &PackageMetadata, checksum: String) {
        self.packages.insert(
            package.name.clone(),
            InstalledPackage {
                version: package.version.clone(),
                require: package.require.clone(),
                dist: package.dist.clone(),
                checksum,
                installed_at: Utc::now(),
            },
        );
    }

    pub fn remove(&mut self, name: &str) -> Option<InstalledPackage> {
        self.packages.remove(name)
    }

    /// Installed packages as repository metadata
    pub fn to_metadata(&self) -> Vec<PackageMetadata> {
        self.packages
            .iter()
            .map(|(name, installed)| PackageMetadata {
                name: name.clone(),
                version: installed.version.clone(),
                require: installed.require.clone(),
                dist: installed.dist.clone(),
                provided: false,
                origin: "installed".to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
