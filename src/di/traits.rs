//! Trait definitions for dependency injection

use crate::core::XpmResult;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use xpm_core::package::RepositorySpec;

/// Trait for configuration access
///
/// Provides read-only access to application configuration.
/// Implementations should be thread-safe (Send + Sync).
pub trait ConfigProvider: Send + Sync {
    /// Get the cache directory path
    fn cache_dir(&self) -> XpmResult<PathBuf>;

    /// Name of the vendor directory inside each extension
    fn vendor_dir(&self) -> &str;

    /// Host application's installed.json, if any
    fn shared_installed(&self) -> Option<PathBuf>;

    /// Repositories consulted after the extension's own
    fn repositories(&self) -> &[RepositorySpec];

    /// Timeout applied to every network request
    fn fetch_timeout(&self) -> Duration;

    fn max_concurrent_fetches(&self) -> usize;

    /// Largest accepted archive in bytes; `None` is unlimited
    fn max_archive_size(&self) -> XpmResult<Option<u64>>;

    /// Check if checksum verification is enabled
    fn verify_checksums(&self) -> bool;

    /// Get the checksum algorithm (e.g., "blake3", "sha256")
    fn checksum_algorithm(&self) -> &str;

    fn max_resolution_steps(&self) -> usize;

    fn show_progress(&self) -> bool;
}

/// Trait for cache operations
///
/// Provides access to the download cache for repository indexes and
/// package archives.
pub trait CacheProvider: Send + Sync {
    /// Get the cache path for a package archive
    fn archive_path(&self, package: &str, version: &str, url: &str) -> PathBuf;

    /// Get the cache path for a repository index
    fn index_path(&self, url: &str) -> PathBuf;

    /// Check if a file exists in the cache
    fn exists(&self, path: &Path) -> bool;

    /// Read a file from the cache
    fn read(&self, path: &Path) -> XpmResult<Vec<u8>>;

    /// Write a file to the cache
    fn write(&self, path: &Path, data: &[u8]) -> XpmResult<()>;

    /// Drop a file from the cache
    fn remove(&self, path: &Path) -> XpmResult<()>;
}

/// Trait for network access
///
/// Everything xpm downloads (repository indexes and package archives) goes
/// through this client so tests can serve content without a network.
#[async_trait]
pub trait PackageClient: Send + Sync {
    /// Download a text document
    async fn fetch_text(&self, url: &str) -> XpmResult<String>;

    /// Download a binary artifact, failing once the body exceeds `max_size` bytes
    async fn fetch_bytes(&self, url: &str, max_size: Option<u64>) -> XpmResult<Vec<u8>>;
}
