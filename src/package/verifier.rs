use super::installed::InstalledState;
use crate::cache::{Cache, ChecksumAlgorithm};
use crate::core::path::package_dir;
use crate::core::{XpmError, XpmResult};
use crate::repository::PackageMetadata;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Checks fetched archives and installed package trees
#[derive(Debug, Clone)]
pub struct PackageVerifier {
    algorithm: ChecksumAlgorithm,
    verify_checksums: bool,
    max_size: Option<u64>,
}

impl PackageVerifier {
    pub fn new(algorithm: ChecksumAlgorithm, verify_checksums: bool, max_size: Option<u64>) -> Self {
        Self {
            algorithm,
            verify_checksums,
            max_size,
        }
    }

    /// Check an archive's size and, when the dist publishes one, its checksum
    pub fn verify_archive(&self, package: &PackageMetadata, bytes: &[u8]) -> XpmResult<()> {
        let failed = |cause: String| XpmError::PackageVerifyFailed {
            package: package.name.clone(),
            cause,
        };

        if let Some(limit) = self.max_size {
            if bytes.len() as u64 > limit {
                return Err(failed(format!(
                    "archive is {} bytes, above the limit of {} bytes",
                    bytes.len(),
                    limit
                )));
            }
        }

        let expected = package.dist.as_ref().and_then(|d| d.shasum.as_deref());
        match expected {
            Some(expected) if self.verify_checksums => match Cache::checksum_matches(bytes, expected) {
                Ok(true) => {}
                Ok(false) => {
                    let actual = ChecksumAlgorithm::from_checksum(expected).digest(bytes);
                    return Err(failed(format!(
                        "checksum mismatch\n  Expected: {}\n  Actual:   {}",
                        expected, actual
                    )));
                }
                Err(_) => {
                    return Err(failed(format!(
                        "unsupported checksum '{}' (expected sha256, blake3 or bare hex)",
                        expected
                    )))
                }
            },
            _ => tracing::debug!("No checksum check for {}", package.id()),
        }
        Ok(())
    }

    /// Checksum recorded for a freshly placed package directory
    pub fn tree_checksum(&self, dir: &Path) -> XpmResult<String> {
        hash_tree(dir, self.algorithm)
    }

    /// Compare every installed package directory with its recorded checksum
    pub fn verify_installed(state: &InstalledState, vendor_dir: &Path) -> VerificationResult {
        let mut result = VerificationResult::new();

        for (name, installed) in &state.packages {
            let dir = package_dir(vendor_dir, name);
            if !dir.is_dir() {
                result.add_failure(name.clone(), format!("{} is missing", dir.display()));
                continue;
            }
            let algorithm = ChecksumAlgorithm::from_checksum(&installed.checksum);
            match hash_tree(&dir, algorithm) {
                Ok(actual) if actual == installed.checksum => result.add_success(name.clone()),
                Ok(actual) => result.add_failure(
                    name.clone(),
                    format!(
                        "Checksum mismatch:\n  Expected: {}\n  Actual:   {}",
                        installed.checksum, actual
                    ),
                ),
                Err(e) => result.add_failure(name.clone(), e.to_string()),
            }
        }

        result
    }
}

/// Hash of a directory tree: every file's relative path and content, in
/// path order. Empty directories don't contribute.
pub fn hash_tree(dir: &Path, algorithm: ChecksumAlgorithm) -> XpmResult<String> {
    let mut hasher = algorithm.hasher();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| XpmError::Path(e.to_string()))?;
        let relative: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        hasher.update(relative.join("/").as_bytes());
        hasher.update(b"\0");
        hasher.update(&fs::read(entry.path())?);
        hasher.update(b"\0");
    }
    Ok(hasher.finalize())
}

/// Result of verification operation
#[derive(Debug, Clone, Default)]
pub struct VerificationResult {
    pub successful: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl VerificationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_success(&mut self, package: String) {
        self.successful.push(package);
    }

    pub fn add_failure(&mut self, package: String, error: String) {
        self.failed.push((package, error));
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total_verified(&self) -> usize {
        self.successful.len() + self.failed.len()
    }
}
