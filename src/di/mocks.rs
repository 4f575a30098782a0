//! Mock implementations of service traits for testing

use super::traits::{CacheProvider, ConfigProvider, PackageClient};
use crate::core::version::Version;
use crate::core::{XpmError, XpmResult};
use crate::repository::{Dist, DistKind, PackageMetadata, PackageSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use xpm_core::package::RepositorySpec;

/// Mock configuration provider for testing
///
/// # Example
///
/// ```
/// use xpm::di::mocks::MockConfigProvider;
/// use xpm::di::ConfigProvider;
/// use std::path::PathBuf;
///
/// let mut config = MockConfigProvider::default();
/// config.cache_dir = PathBuf::from("/tmp/test-cache");
/// config.verify_checksums = false;
///
/// assert_eq!(config.verify_checksums(), false);
/// ```
#[derive(Clone)]
pub struct MockConfigProvider {
    pub cache_dir: PathBuf,
    pub vendor_dir: String,
    pub shared_installed: Option<PathBuf>,
    pub repositories: Vec<RepositorySpec>,
    pub fetch_timeout: Duration,
    pub max_concurrent_fetches: usize,
    pub max_archive_size: Option<u64>,
    pub verify_checksums: bool,
    pub checksum_algorithm: String,
    pub max_resolution_steps: usize,
    pub show_progress: bool,
}

impl Default for MockConfigProvider {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("/tmp/xpm-test-cache"),
            vendor_dir: "vendor".to_string(),
            shared_installed: None,
            repositories: Vec::new(),
            fetch_timeout: Duration::from_secs(5),
            max_concurrent_fetches: 4,
            max_archive_size: None,
            verify_checksums: true,
            checksum_algorithm: "blake3".to_string(),
            max_resolution_steps: 10_000,
            show_progress: false,
        }
    }
}

impl ConfigProvider for MockConfigProvider {
    fn cache_dir(&self) -> XpmResult<PathBuf> {
        Ok(self.cache_dir.clone())
    }

    fn vendor_dir(&self) -> &str {
        &self.vendor_dir
    }

    fn shared_installed(&self) -> Option<PathBuf> {
        self.shared_installed.clone()
    }

    fn repositories(&self) -> &[RepositorySpec] {
        &self.repositories
    }

    fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    fn max_concurrent_fetches(&self) -> usize {
        self.max_concurrent_fetches
    }

    fn max_archive_size(&self) -> XpmResult<Option<u64>> {
        Ok(self.max_archive_size)
    }

    fn verify_checksums(&self) -> bool {
        self.verify_checksums
    }

    fn checksum_algorithm(&self) -> &str {
        &self.checksum_algorithm
    }

    fn max_resolution_steps(&self) -> usize {
        self.max_resolution_steps
    }

    fn show_progress(&self) -> bool {
        self.show_progress
    }
}

/// Mock cache provider for testing
///
/// Stores files in memory instead of on disk.
///
/// # Example
///
/// ```
/// use xpm::di::mocks::MockCacheProvider;
/// use xpm::di::CacheProvider;
/// use std::path::PathBuf;
///
/// let cache = MockCacheProvider::new();
/// cache.add_file(PathBuf::from("/test/file.txt"), b"content".to_vec());
///
/// assert!(cache.exists(&PathBuf::from("/test/file.txt")));
/// ```
#[derive(Clone)]
pub struct MockCacheProvider {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
}

impl MockCacheProvider {
    /// Create a new mock cache provider
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Add a file to the mock cache
    pub fn add_file(&self, path: PathBuf, content: Vec<u8>) {
        self.files.lock().unwrap().insert(path, content);
    }

    /// Get all files in the mock cache
    pub fn get_files(&self) -> HashMap<PathBuf, Vec<u8>> {
        self.files.lock().unwrap().clone()
    }
}

impl Default for MockCacheProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheProvider for MockCacheProvider {
    fn archive_path(&self, package: &str, version: &str, url: &str) -> PathBuf {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        PathBuf::from(format!(
            "/tmp/archives/{}/{}-{:x}",
            package.replace('/', "__"),
            version,
            hasher.finish()
        ))
    }

    fn index_path(&self, url: &str) -> PathBuf {
        PathBuf::from(format!("/tmp/indexes/{}.json", url.replace(['/', ':'], "_")))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn read(&self, path: &Path) -> XpmResult<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| XpmError::Cache(format!("File not found: {}", path.display())))
    }

    fn write(&self, path: &Path, data: &[u8]) -> XpmResult<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn remove(&self, path: &Path) -> XpmResult<()> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }
}

/// Mock network client for testing
///
/// Serves pre-registered bodies by URL and records every request.
///
/// # Example
///
/// ```
/// use xpm::di::mocks::MockPackageClient;
///
/// let client = MockPackageClient::new();
/// client.add_response("https://example.com/packages.json", b"{\"packages\":{}}".to_vec());
/// assert_eq!(client.request_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct MockPackageClient {
    responses: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockPackageClient {
    /// Create a new mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the body served for a URL
    pub fn add_response(&self, url: &str, body: Vec<u8>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), body);
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn serve(&self, url: &str) -> XpmResult<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| XpmError::Package(format!("404 Not Found: {}", url)))
    }
}

#[async_trait]
impl PackageClient for MockPackageClient {
    async fn fetch_text(&self, url: &str) -> XpmResult<String> {
        let body = self.serve(url)?;
        String::from_utf8(body)
            .map_err(|e| XpmError::Package(format!("Response from {} is not UTF-8: {}", url, e)))
    }

    async fn fetch_bytes(&self, url: &str, max_size: Option<u64>) -> XpmResult<Vec<u8>> {
        let body = self.serve(url)?;
        if let Some(limit) = max_size {
            if body.len() as u64 > limit {
                return Err(XpmError::Package(format!(
                    "{} exceeds the size limit of {} bytes",
                    url, limit
                )));
            }
        }
        Ok(body)
    }
}

/// Build package metadata for fixtures, with a tarball dist under `https://packages.test/`
///
/// Panics on an invalid version.
pub fn mock_package(name: &str, version: &str, require: &[(&str, &str)]) -> PackageMetadata {
    PackageMetadata {
        name: name.to_string(),
        version: Version::parse(version).unwrap(),
        require: require
            .iter()
            .map(|(n, c)| (n.to_string(), c.to_string()))
            .collect(),
        dist: Some(Dist {
            kind: DistKind::Tar,
            url: format!("https://packages.test/{}-{}.tar.gz", name.replace('/', "-"), version),
            shasum: None,
        }),
        provided: false,
        origin: "mock".to_string(),
    }
}

/// gzip-compressed tarball holding `(path, content)` files
///
/// Panics if the archive cannot be built.
pub fn mock_archive(files: &[(&str, &str)]) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Mock package source for testing
///
/// # Example
///
/// ```
/// use xpm::di::mocks::MockPackageSource;
/// use xpm::repository::PackageSource;
///
/// let source = MockPackageSource::new("fixture")
///     .with_package("acme/log", "1.0.0", &[("psr/log", "^1.0")])
///     .with_package("psr/log", "1.1.4", &[]);
/// assert_eq!(source.name(), "fixture");
/// ```
#[derive(Clone)]
pub struct MockPackageSource {
    name: String,
    optional: bool,
    packages: Vec<PackageMetadata>,
    failure: Option<String>,
}

impl MockPackageSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            optional: true,
            packages: Vec::new(),
            failure: None,
        }
    }

    /// Add a package version with `(name, constraint)` requirements
    ///
    /// Panics on an invalid version; fixtures are expected to be well formed.
    pub fn with_package(mut self, name: &str, version: &str, require: &[(&str, &str)]) -> Self {
        self.packages
            .push(mock_package(name, version, require));
        self
    }

    pub fn with_metadata(mut self, metadata: PackageMetadata) -> Self {
        self.packages.push(metadata);
        self
    }

    /// Make `load` fail with `SourceUnavailable`
    pub fn failing(mut self, reason: &str) -> Self {
        self.failure = Some(reason.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.optional = false;
        self
    }
}

#[async_trait]
impl PackageSource for MockPackageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn optional(&self) -> bool {
        self.optional
    }

    async fn load(&self) -> XpmResult<Vec<PackageMetadata>> {
        match &self.failure {
            Some(reason) => Err(XpmError::SourceUnavailable {
                source_name: self.name.clone(),
                reason: reason.clone(),
            }),
            None => Ok(self.packages.clone()),
        }
    }
}
