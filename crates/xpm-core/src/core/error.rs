use std::path::PathBuf;
use thiserror::Error;

pub type XpmResult<T> = Result<T, XpmError>;

#[derive(Error, Debug)]
pub enum XpmError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WalkDir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Path error: {0}")]
    Path(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Package error: {0}")]
    Package(String),

    #[error("Version error: {0}")]
    Version(String),

    #[error("Cache error: {0}")]
    Cache(String),

    /// The extension manifest is missing, malformed or declares invalid constraints.
    #[error("Invalid manifest: {0}")]
    ManifestInvalid(String),

    /// A package source could not be reached or read.
    #[error("Source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// No set of versions satisfies the constraints.
    #[error("Unable to resolve '{package}':\n{chain}")]
    Unsatisfiable { package: String, chain: String },

    /// The lock record does not match the current constraints.
    #[error("Lock file is out of date: {0}")]
    LockMismatch(String),

    /// The lock file exists but cannot be parsed.
    #[error("Invalid lock file {}: {reason}", path.display())]
    LockInvalid { path: PathBuf, reason: String },

    #[error("Failed to fetch {package}: {cause}")]
    PackageFetchFailed { package: String, cause: String },

    #[error("Failed to verify {package}: {cause}")]
    PackageVerifyFailed { package: String, cause: String },

    /// Another run holds the lock on the target directory.
    #[error("Another xpm process is running against {}", path.display())]
    AlreadyRunning { path: PathBuf },

    #[error("Operation cancelled")]
    Cancelled,
}

impl XpmError {
    /// Name of the package this error is about, if any.
    pub fn package(&self) -> Option<&str> {
        match self {
            XpmError::Unsatisfiable { package, .. }
            | XpmError::PackageFetchFailed { package, .. }
            | XpmError::PackageVerifyFailed { package, .. } => Some(package),
            _ => None,
        }
    }
}
