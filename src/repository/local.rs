use super::metadata::{IndexDocument, PackageMetadata};
use super::PackageSource;
use crate::core::{XpmError, XpmResult};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

/// Repository on the local filesystem: a directory holding `packages.json`
///
/// Relative dist URLs are resolved against the directory so the metadata
/// (and the lock file written from it) names absolute paths.
pub struct PathSource {
    root: PathBuf,
    optional: bool,
    label: String,
}

impl PathSource {
    pub fn new(root: impl Into<PathBuf>, optional: bool) -> Self {
        let root = root.into();
        let label = root.display().to_string();
        Self {
            root,
            optional,
            label,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn unavailable(&self, reason: String) -> XpmError {
        XpmError::SourceUnavailable {
            source_name: self.label.clone(),
            reason,
        }
    }

    fn resolve_dist_url(&self, url: &str) -> String {
        if url.contains("://") {
            return url.to_string();
        }
        let path = Path::new(url);
        if path.is_absolute() {
            url.to_string()
        } else {
            self.root.join(path).display().to_string()
        }
    }
}

#[async_trait]
impl PackageSource for PathSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn optional(&self) -> bool {
        self.optional
    }

    async fn load(&self) -> XpmResult<Vec<PackageMetadata>> {
        let index = self.root.join("packages.json");
        let content = fs::read_to_string(&index)
            .map_err(|e| self.unavailable(format!("cannot read {}: {}", index.display(), e)))?;
        let document = IndexDocument::parse(&content)
            .map_err(|e| self.unavailable(format!("malformed index: {}", e)))?;

        let mut packages = document.into_metadata(&self.label);
        for package in &mut packages {
            if let Some(dist) = package.dist.as_mut() {
                dist.url = self.resolve_dist_url(&dist.url);
            }
        }
        Ok(packages)
    }
}
