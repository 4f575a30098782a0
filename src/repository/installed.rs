use super::metadata::PackageMetadata;
use super::PackageSource;
use crate::core::version::Version;
use crate::core::{XpmError, XpmResult};
use crate::package::installed::InstalledState;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Packages already materialized in the extension's vendor directory
///
/// Keeps installed versions resolvable even when a remote repository no
/// longer lists them.
pub struct InstalledSource {
    packages: Vec<PackageMetadata>,
}

impl InstalledSource {
    pub fn new(state: &InstalledState) -> Self {
        Self {
            packages: state.to_metadata(),
        }
    }
}

#[async_trait]
impl PackageSource for InstalledSource {
    fn name(&self) -> &str {
        "installed"
    }

    async fn load(&self) -> XpmResult<Vec<PackageMetadata>> {
        Ok(self.packages.clone())
    }
}

#[derive(Debug, Deserialize)]
struct HostPackage {
    name: String,
    version: String,
    #[serde(default)]
    require: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HostDocument {
    List(Vec<HostPackage>),
    Wrapped { packages: Vec<HostPackage> },
}

/// Packages installed by the host application (its `installed.json`)
///
/// Every entry is marked provided: it satisfies constraints on its name but
/// is never installed into an extension.
pub struct HostSource {
    path: PathBuf,
    label: String,
}

impl HostSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = format!("host ({})", path.display());
        Self { path, label }
    }
}

#[async_trait]
impl PackageSource for HostSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn load(&self) -> XpmResult<Vec<PackageMetadata>> {
        let unavailable = |reason: String| XpmError::SourceUnavailable {
            source_name: self.label.clone(),
            reason,
        };

        let content = fs::read_to_string(&self.path)
            .map_err(|e| unavailable(format!("cannot read {}: {}", self.path.display(), e)))?;
        let document: HostDocument = serde_json::from_str(&content)
            .map_err(|e| unavailable(format!("malformed installed.json: {}", e)))?;
        let entries = match document {
            HostDocument::List(entries) => entries,
            HostDocument::Wrapped { packages } => packages,
        };

        let mut packages = Vec::new();
        for entry in entries {
            let version = match Version::parse(&entry.version) {
                Ok(version) => version,
                Err(_) => {
                    tracing::debug!(
                        "Host package {} has non-release version {}, ignoring",
                        entry.name,
                        entry.version
                    );
                    continue;
                }
            };
            packages.push(PackageMetadata {
                name: entry.name.to_ascii_lowercase(),
                version,
                require: entry.require,
                dist: None,
                provided: true,
                origin: self.label.clone(),
            });
        }
        Ok(packages)
    }
}
