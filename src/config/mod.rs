use crate::cache::ChecksumAlgorithm;
use crate::core::bytesize::parse_byte_size;
use crate::core::path::{config_file, ensure_dir, DEFAULT_VENDOR_DIR};
use crate::core::{XpmError, XpmResult};
use crate::di::ConfigProvider;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use xpm_core::package::RepositorySpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding one subdirectory per extension (defaults to ./extensions)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions_dir: Option<String>,

    /// Cache directory (defaults to platform-specific cache directory)
    ///
    /// Default locations:
    /// - Windows: %LOCALAPPDATA%\xpm\cache
    /// - Linux: ~/.cache/xpm
    /// - macOS: ~/Library/Caches/xpm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,

    /// Name of the per-extension directory packages are installed into
    #[serde(default = "default_vendor_dir")]
    pub vendor_dir: String,

    /// Host application's installed.json; packages listed there are
    /// provided and never installed into an extension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_installed: Option<String>,

    /// Repositories consulted after those declared by the extension
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<RepositorySpec>,

    /// Per-request timeout for index and archive downloads
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Upper bound on concurrent archive downloads
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Largest archive accepted, php.ini style ("512M", "2G", "-1" for unlimited)
    #[serde(default = "default_max_archive_size")]
    pub max_archive_size: String,

    /// Whether to verify archive checksums published by repositories
    #[serde(default = "default_true")]
    pub verify_checksums: bool,

    /// Checksum algorithm for installed package trees
    /// - "blake3": BLAKE3 (default)
    /// - "sha256": SHA-256
    #[serde(default = "default_checksum_algorithm")]
    pub checksum_algorithm: String,

    /// Resolver gives up after this many search steps
    #[serde(default = "default_max_resolution_steps")]
    pub max_resolution_steps: usize,

    /// Draw download progress bars
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

fn default_vendor_dir() -> String {
    DEFAULT_VENDOR_DIR.to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_max_archive_size() -> String {
    "512M".to_string()
}

fn default_checksum_algorithm() -> String {
    "blake3".to_string()
}

fn default_max_resolution_steps() -> usize {
    100_000
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions_dir: None,
            cache_dir: None,
            vendor_dir: default_vendor_dir(),
            shared_installed: None,
            repositories: Vec::new(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            max_archive_size: default_max_archive_size(),
            verify_checksums: true,
            checksum_algorithm: default_checksum_algorithm(),
            max_resolution_steps: default_max_resolution_steps(),
            show_progress: true,
        }
    }
}

impl Config {
    /// Load config from the platform-specific config directory, creating a
    /// default one if it doesn't exist
    ///
    /// Config locations:
    /// - Windows: %APPDATA%\xpm\config.yaml
    /// - Linux: ~/.config/xpm/config.yaml
    /// - macOS: ~/Library/Application Support/xpm/config.yaml
    pub fn load() -> XpmResult<Self> {
        let config_path = config_file()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load config from an explicit path; the file must exist
    pub fn load_from(path: &Path) -> XpmResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            XpmError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| XpmError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the platform-specific config directory
    pub fn save(&self) -> XpmResult<()> {
        self.save_to(&config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> XpmResult<()> {
        let config_dir = path
            .parent()
            .ok_or_else(|| XpmError::Path("Invalid config path".to_string()))?;
        ensure_dir(config_dir)?;

        let content = serde_yaml::to_string(self)
            .map_err(|e| XpmError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)?;
        Ok(())
    }

    /// Reject values that would only fail later, mid-run
    pub fn validate(&self) -> XpmResult<()> {
        parse_byte_size(&self.max_archive_size)?;
        ChecksumAlgorithm::parse(&self.checksum_algorithm)?;
        if self.max_concurrent_fetches == 0 {
            return Err(XpmError::Config(
                "max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if self.vendor_dir.trim().is_empty() || self.vendor_dir.contains("..") {
            return Err(XpmError::Config(format!(
                "Invalid vendor_dir '{}'",
                self.vendor_dir
            )));
        }
        Ok(())
    }

    /// Get the cache directory path
    pub fn get_cache_dir(&self) -> XpmResult<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            Ok(PathBuf::from(dir))
        } else {
            crate::core::path::cache_dir()
        }
    }

    /// Get the extensions directory path
    pub fn get_extensions_dir(&self) -> XpmResult<PathBuf> {
        if let Some(ref dir) = self.extensions_dir {
            Ok(PathBuf::from(dir))
        } else {
            let current = std::env::current_dir().map_err(|e| {
                XpmError::Path(format!("Failed to get current directory: {}", e))
            })?;
            Ok(current.join("extensions"))
        }
    }
}

impl ConfigProvider for Config {
    fn cache_dir(&self) -> XpmResult<PathBuf> {
        self.get_cache_dir()
    }

    fn vendor_dir(&self) -> &str {
        &self.vendor_dir
    }

    fn shared_installed(&self) -> Option<PathBuf> {
        self.shared_installed.as_ref().map(PathBuf::from)
    }

    fn repositories(&self) -> &[RepositorySpec] {
        &self.repositories
    }

    fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    fn max_concurrent_fetches(&self) -> usize {
        self.max_concurrent_fetches
    }

    fn max_archive_size(&self) -> XpmResult<Option<u64>> {
        parse_byte_size(&self.max_archive_size)
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
