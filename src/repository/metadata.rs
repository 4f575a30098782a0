//! Package metadata as published by repositories.

use crate::core::version::Version;
use crate::core::{XpmError, XpmResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use xpm_core::package::manifest::{is_valid_package_name, PackageConstraint};

/// How a package's files are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistKind {
    /// gzip-compressed tarball
    Tar,
    Zip,
    /// Directory on the local filesystem
    Path,
}

/// Where a package version's files come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dist {
    #[serde(rename = "type")]
    pub kind: DistKind,
    pub url: String,
    /// Expected archive checksum (`sha256:<hex>`, `blake3:<hex>` or bare hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shasum: Option<String>,
}

/// One version of one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: Version,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub require: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist: Option<Dist>,
    /// Already installed by the host application; never materialized
    #[serde(default, skip_serializing_if = "is_false")]
    pub provided: bool,
    /// Name of the source that supplied this entry (not persisted)
    #[serde(skip)]
    pub origin: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl PackageMetadata {
    /// `name@version`, the form used in reports and conflict chains
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    /// Parsed dependency requirements, sorted by name
    pub fn requirements(&self) -> XpmResult<Vec<PackageConstraint>> {
        self.require
            .iter()
            .map(|(name, expression)| {
                PackageConstraint::parse(name, expression).map_err(|e| {
                    XpmError::Package(format!("{} has an invalid requirement: {}", self.id(), e))
                })
            })
            .collect()
    }

    /// Check the name and every requirement
    ///
    /// Requirements of provided packages are never resolved, so they are not
    /// checked.
    pub fn validate(&self) -> XpmResult<()> {
        if !is_valid_package_name(&self.name) {
            return Err(XpmError::Package(format!(
                "Invalid package name '{}'",
                self.name
            )));
        }
        if self.provided {
            return Ok(());
        }
        self.requirements().map(|_| ())
    }
}

/// Entry for one version inside a repository index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(default)]
    pub require: BTreeMap<String, String>,
    #[serde(default)]
    pub dist: Option<Dist>,
}

/// `packages.json`: `{"packages": {name: {version: entry}}}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexDocument {
    #[serde(default)]
    pub packages: BTreeMap<String, BTreeMap<String, IndexEntry>>,
}

impl IndexDocument {
    pub fn parse(content: &str) -> XpmResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Flatten into metadata; entries with an invalid name or version are
    /// skipped with a warning.
    pub fn into_metadata(self, origin: &str) -> Vec<PackageMetadata> {
        let mut packages = Vec::new();
        for (name, versions) in self.packages {
            if !is_valid_package_name(&name) {
                tracing::warn!("{}: skipping package with invalid name '{}'", origin, name);
                continue;
            }
            for (version, entry) in versions {
                let version = match Version::parse(&version) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!("{}: skipping {} {}: {}", origin, name, version, e);
                        continue;
                    }
                };
                packages.push(PackageMetadata {
                    name: name.clone(),
                    version,
                    require: entry.require,
                    dist: entry.dist,
                    provided: false,
                    origin: origin.to_string(),
                });
            }
        }
        packages
    }
}
