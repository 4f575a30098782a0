//! Lock record (`extension.lock`) and the store that reads and writes it.

use crate::core::path::{lock_file, write_atomic};
use crate::core::version::Version;
use crate::core::{XpmError, XpmResult};
use crate::repository::PackageMetadata;
use crate::resolver::ResolvedSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use xpm_core::package::manifest::PackageConstraint;

/// Current lock file layout
pub const LOCK_SCHEMA_VERSION: u32 = 1;

/// The resolved set as persisted, keyed by the constraint fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub schema_version: u32,
    /// Fingerprint of the constraints this set was resolved from
    pub content_hash: String,
    /// Hash of the canonical form of `packages`
    pub packages_hash: String,
    /// Sorted by name
    pub packages: Vec<PackageMetadata>,
}

impl LockRecord {
    pub fn new(set: &ResolvedSet, content_hash: String) -> XpmResult<Self> {
        let packages: Vec<PackageMetadata> = set.iter().cloned().collect();
        let packages_hash = hash_packages(&packages)?;
        Ok(Self {
            schema_version: LOCK_SCHEMA_VERSION,
            content_hash,
            packages_hash,
            packages,
        })
    }

    /// Re-hash the stored packages and compare with `packages_hash`
    pub fn verify(&self) -> XpmResult<()> {
        if self.schema_version != LOCK_SCHEMA_VERSION {
            return Err(XpmError::LockMismatch(format!(
                "lock schema {} is not supported (expected {})",
                self.schema_version, LOCK_SCHEMA_VERSION
            )));
        }
        let actual = hash_packages(&self.packages)?;
        if actual != self.packages_hash {
            return Err(XpmError::LockMismatch(
                "locked packages do not match their recorded hash".to_string(),
            ));
        }
        Ok(())
    }

    /// Usable as-is for constraints with this fingerprint
    pub fn check(&self, fingerprint: &str) -> XpmResult<()> {
        if self.content_hash != fingerprint {
            return Err(XpmError::LockMismatch(
                "constraints changed since the lock was written".to_string(),
            ));
        }
        self.verify()
    }

    pub fn resolved_set(&self) -> ResolvedSet {
        ResolvedSet::from_packages(self.packages.iter().cloned().map(|mut package| {
            package.origin = "lock".to_string();
            package
        }))
    }

    /// Locked versions, used as resolver preferences when re-resolving
    pub fn pins(&self) -> BTreeMap<String, Version> {
        self.packages
            .iter()
            .map(|p| (p.name.clone(), p.version.clone()))
            .collect()
    }
}

fn hash_packages(packages: &[PackageMetadata]) -> XpmResult<String> {
    let canonical = serde_json::to_string(&serde_json::to_value(packages)?)?;
    Ok(format!("blake3:{}", blake3::hash(canonical.as_bytes()).to_hex()))
}

/// Reads and writes `extension.lock`
pub struct LockStore {
    path: PathBuf,
}

impl LockStore {
    /// Store for the lock file of an extension directory
    pub fn new(extension_dir: &Path) -> Self {
        Self {
            path: lock_file(extension_dir),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stable hash of the constraints
    ///
    /// Computed over the canonical JSON of the name-sorted map of normalized
    /// expressions, so key order and whitespace in the manifest don't matter.
    pub fn fingerprint(constraints: &[PackageConstraint]) -> String {
        let canonical: BTreeMap<&str, String> = constraints
            .iter()
            .map(|c| (c.name.as_str(), c.normalized()))
            .collect();
        // A map of strings always serializes
        let json = serde_json::to_string(&canonical).unwrap_or_default();
        format!("blake3:{}", blake3::hash(json.as_bytes()).to_hex())
    }

    /// `None` when there is no lock file; `LockInvalid` when it can't be read
    pub fn load(&self) -> XpmResult<Option<LockRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let invalid = |reason: String| XpmError::LockInvalid {
            path: self.path.clone(),
            reason,
        };

        let content = fs::read_to_string(&self.path).map_err(|e| invalid(e.to_string()))?;
        let record: LockRecord =
            serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;

        for package in &record.packages {
            package
                .validate()
                .map_err(|e| invalid(format!("{}: {}", package.id(), e)))?;
        }
        let mut names: Vec<&str> = record.packages.iter().map(|p| p.name.as_str()).collect();
        names.dedup();
        if names.len() != record.packages.len() {
            return Err(invalid("duplicate package entries".to_string()));
        }

        Ok(Some(record))
    }

    /// Pretty JSON with sorted keys and a trailing newline
    pub fn render(record: &LockRecord) -> XpmResult<String> {
        let value = serde_json::to_value(record)?;
        let mut text = serde_json::to_string_pretty(&value)?;
        text.push('\n');
        Ok(text)
    }

    /// Write the record atomically; returns `false` without touching the
    /// file when its content is already identical
    pub fn save(&self, record: &LockRecord) -> XpmResult<bool> {
        let text = Self::render(record)?;
        if let Ok(existing) = fs::read(&self.path) {
            if existing == text.as_bytes() {
                return Ok(false);
            }
        }
        write_atomic(&self.path, text.as_bytes())?;
        tracing::info!("Wrote {}", self.path.display());
        Ok(true)
    }
}
