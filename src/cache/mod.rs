use crate::core::path::{ensure_dir, flat_name};
use crate::core::{XpmError, XpmResult};
use crate::di::CacheProvider;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Checksum algorithm for verifying package integrity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumAlgorithm {
    /// SHA-256, the format most package indexes publish
    Sha256,
    /// BLAKE3 (default, faster)
    #[default]
    Blake3,
}

impl ChecksumAlgorithm {
    /// Parse an algorithm name as written in the config file
    pub fn parse(name: &str) -> XpmResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "blake3" => Ok(ChecksumAlgorithm::Blake3),
            "sha256" => Ok(ChecksumAlgorithm::Sha256),
            other => Err(XpmError::Config(format!(
                "Unknown checksum algorithm '{}' (expected blake3 or sha256)",
                other
            ))),
        }
    }

    /// Parse algorithm from a prefixed checksum string (unprefixed means BLAKE3)
    pub fn from_checksum(checksum: &str) -> Self {
        if checksum.starts_with("blake3:") {
            ChecksumAlgorithm::Blake3
        } else if checksum.starts_with("sha256:") {
            ChecksumAlgorithm::Sha256
        } else {
            ChecksumAlgorithm::Blake3
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Blake3 => "blake3",
        }
    }

    /// Prefixed digest of a byte slice
    pub fn digest(&self, data: &[u8]) -> String {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }

    /// Incremental hasher for this algorithm
    pub fn hasher(&self) -> ContentHasher {
        match self {
            ChecksumAlgorithm::Sha256 => ContentHasher::Sha256(Sha256::new()),
            ChecksumAlgorithm::Blake3 => ContentHasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }
}

/// Streaming hasher producing prefixed checksums (`blake3:<hex>`)
pub enum ContentHasher {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl ContentHasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            ContentHasher::Sha256(hasher) => hasher.update(data),
            ContentHasher::Blake3(hasher) => {
                hasher.update(data);
            }
        }
    }

    pub fn finalize(self) -> String {
        match self {
            ContentHasher::Sha256(hasher) => {
                format!("sha256:{}", hex::encode(hasher.finalize()))
            }
            ContentHasher::Blake3(hasher) => format!("blake3:{}", hasher.finalize().to_hex()),
        }
    }
}

/// Download cache for package archives and repository indexes
#[derive(Clone)]
pub struct Cache {
    root: PathBuf,
}

impl Cache {
    /// Create a new cache instance
    pub fn new(cache_root: PathBuf) -> XpmResult<Self> {
        ensure_dir(&cache_root)?;
        Ok(Self { root: cache_root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Downloaded package archives
    pub fn archives_dir(&self) -> PathBuf {
        self.root.join("archives")
    }

    /// Last good copy of each remote repository index
    pub fn indexes_dir(&self) -> PathBuf {
        self.root.join("indexes")
    }

    /// Initialize cache directory structure
    pub fn init(&self) -> XpmResult<()> {
        ensure_dir(&self.archives_dir())?;
        ensure_dir(&self.indexes_dir())?;
        Ok(())
    }

    /// Get the cached path for a package archive
    ///
    /// Structure: archives/{vendor__name}/{version}-{url hash}.{ext}
    pub fn archive_path(&self, package: &str, version: &str, url: &str) -> PathBuf {
        let extension = if url.to_ascii_lowercase().ends_with(".zip") {
            "zip"
        } else {
            "tar.gz"
        };
        self.archives_dir().join(flat_name(package)).join(format!(
            "{}-{}.{}",
            version,
            Self::url_hash(url),
            extension
        ))
    }

    /// Get the cached path for a repository index document
    pub fn index_path(&self, url: &str) -> PathBuf {
        self.indexes_dir()
            .join(format!("{}.json", Self::url_hash(url)))
    }

    /// Check if a file exists in cache
    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Read a file from cache
    pub fn read(&self, path: &Path) -> XpmResult<Vec<u8>> {
        fs::read(path).map_err(|e| {
            XpmError::Cache(format!(
                "Failed to read from cache: {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Write a file to cache
    ///
    /// Data goes to a sibling temp file first so readers never see a
    /// truncated entry.
    pub fn write(&self, path: &Path, data: &[u8]) -> XpmResult<()> {
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let tmp = path.with_extension("part");
        let mut file = fs::File::create(&tmp).map_err(|e| {
            XpmError::Cache(format!(
                "Failed to create cache file: {}: {}",
                tmp.display(),
                e
            ))
        })?;
        file.write_all(data).map_err(|e| {
            XpmError::Cache(format!(
                "Failed to write to cache: {}: {}",
                tmp.display(),
                e
            ))
        })?;
        drop(file);
        fs::rename(&tmp, path).map_err(|e| {
            XpmError::Cache(format!(
                "Failed to move cache file into place: {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Drop a cache entry; a missing entry is not an error
    pub fn remove(&self, path: &Path) -> XpmResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(XpmError::Cache(format!(
                "Failed to remove cache file: {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Whether `data` hashes to `expected`
    ///
    /// Accepts `blake3:<hex>`, `sha256:<hex>` and bare hex. A bare 64 character
    /// digest is ambiguous, so both algorithms are tried. Any other prefix is
    /// an error rather than a mismatch.
    pub fn checksum_matches(data: &[u8], expected: &str) -> XpmResult<bool> {
        let expected = expected.trim().to_ascii_lowercase();
        if let Some((prefix, _)) = expected.split_once(':') {
            let algorithm = ChecksumAlgorithm::parse(prefix).map_err(|_| {
                XpmError::Cache(format!("Unsupported checksum algorithm '{}'", prefix))
            })?;
            return Ok(algorithm.digest(data) == expected);
        }

        Ok([ChecksumAlgorithm::Sha256, ChecksumAlgorithm::Blake3]
            .iter()
            .any(|algorithm| {
                let actual = algorithm.digest(data);
                actual.split_once(':').map(|(_, h)| h) == Some(expected.as_str())
            }))
    }

    /// Hash a URL for use as a filename
    fn url_hash(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let hash = hasher.finalize();
        hex::encode(&hash[..16])
    }

    /// Clean old cache entries based on age and size
    pub fn clean(&self, max_age_days: u64, max_size_mb: u64) -> XpmResult<CacheCleanResult> {
        let max_age = Duration::from_secs(max_age_days * 24 * 60 * 60);
        let max_size_bytes = max_size_mb * 1024 * 1024;
        let now = SystemTime::now();

        let mut result = CacheCleanResult::default();
        result += self.clean_directory(&self.archives_dir(), &now, max_age, max_size_bytes)?;
        result += self.clean_directory(&self.indexes_dir(), &now, max_age, max_size_bytes)?;

        Ok(result)
    }

    /// Clean a directory based on age and total size
    fn clean_directory(
        &self,
        dir: &Path,
        now: &SystemTime,
        max_age: Duration,
        max_size_bytes: u64,
    ) -> XpmResult<CacheCleanResult> {
        use walkdir::WalkDir;

        if !dir.exists() {
            return Ok(CacheCleanResult::default());
        }

        let mut files: Vec<(PathBuf, SystemTime, u64)> = Vec::new();
        let mut total_size = 0u64;

        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                if let Ok(metadata) = entry.metadata() {
                    if let Ok(modified) = metadata.modified() {
                        let size = metadata.len();
                        files.push((entry.path().to_path_buf(), modified, size));
                        total_size += size;
                    }
                }
            }
        }

        // Oldest first
        files.sort_by_key(|(_, modified, _)| *modified);

        let mut result = CacheCleanResult::default();

        for (path, modified, size) in &files {
            if let Ok(age) = now.duration_since(*modified) {
                if age > max_age {
                    if let Err(e) = fs::remove_file(path) {
                        tracing::warn!(
                            "Failed to remove old cache file {}: {}",
                            path.display(),
                            e
                        );
                    } else {
                        result.files_removed += 1;
                        result.bytes_freed += size;
                        total_size -= size;
                    }
                }
            }
        }

        if total_size > max_size_bytes {
            for (path, _, size) in &files {
                if total_size <= max_size_bytes {
                    break;
                }
                if path.exists() {
                    if let Err(e) = fs::remove_file(path) {
                        tracing::warn!("Failed to remove cache file {}: {}", path.display(), e);
                    } else {
                        result.files_removed += 1;
                        result.bytes_freed += size;
                        total_size -= size;
                    }
                }
            }
        }

        Ok(result)
    }
}

impl CacheProvider for Cache {
    fn archive_path(&self, package: &str, version: &str, url: &str) -> PathBuf {
        Cache::archive_path(self, package, version, url)
    }

    fn index_path(&self, url: &str) -> PathBuf {
        Cache::index_path(self, url)
    }

    fn exists(&self, path: &Path) -> bool {
        Cache::exists(self, path)
    }

    fn read(&self, path: &Path) -> XpmResult<Vec<u8>> {
        Cache::read(self, path)
    }

    fn write(&self, path: &Path, data: &[u8]) -> XpmResult<()> {
        Cache::write(self, path, data)
    }

    fn remove(&self, path: &Path) -> XpmResult<()> {
        Cache::remove(self, path)
    }
}

/// Result of cache cleaning operation
#[derive(Debug, Default)]
pub struct CacheCleanResult {
    pub files_removed: usize,
    pub bytes_freed: u64,
}

impl std::ops::AddAssign for CacheCleanResult {
    fn add_assign(&mut self, other: Self) {
        self.files_removed += other.files_removed;
        self.bytes_freed += other.bytes_freed;
    }
}
