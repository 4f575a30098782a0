use crate::core::error::{XpmError, XpmResult};
use std::path::{Path, PathBuf};

/// File name of the extension manifest
pub const MANIFEST_FILE: &str = "extension.json";

/// File name of the lock record, next to the manifest
pub const LOCK_FILE: &str = "extension.lock";

/// Default name of the per-extension vendor directory
pub const DEFAULT_VENDOR_DIR: &str = "vendor";

/// Get the xpm home directory
///
/// Platform-specific locations:
/// - Windows: %APPDATA%\xpm
/// - Linux: ~/.config/xpm
/// - macOS: ~/Library/Application Support/xpm
pub fn xpm_home() -> XpmResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| XpmError::Path("Could not determine config directory".to_string()))?;
    Ok(config_dir.join("xpm"))
}

/// Get the cache directory
///
/// Platform-specific locations:
/// - Windows: %LOCALAPPDATA%\xpm\cache
/// - Linux: ~/.cache/xpm
/// - macOS: ~/Library/Caches/xpm
pub fn cache_dir() -> XpmResult<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| XpmError::Path("Could not determine cache directory".to_string()))?;
    Ok(cache_dir.join("xpm"))
}

/// Get the config file path (`<xpm_home>/config.yaml`)
pub fn config_file() -> XpmResult<PathBuf> {
    Ok(xpm_home()?.join("config.yaml"))
}

/// Resolve an extension directory from its name.
///
/// Names are single path components; anything that could escape
/// `extensions_dir` is rejected.
pub fn extension_dir(extensions_dir: &Path, name: &str) -> XpmResult<PathBuf> {
    let name = name.trim();
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(XpmError::Path(format!("Invalid extension name '{}'", name)));
    }
    Ok(extensions_dir.join(name))
}

/// `<extension>/extension.json`
pub fn manifest_file(extension_dir: &Path) -> PathBuf {
    extension_dir.join(MANIFEST_FILE)
}

/// `<extension>/extension.lock`
pub fn lock_file(extension_dir: &Path) -> PathBuf {
    extension_dir.join(LOCK_FILE)
}

/// `<extension>/<vendor_dir>`
pub fn vendor_dir(extension_dir: &Path, vendor_dir_name: &str) -> PathBuf {
    extension_dir.join(vendor_dir_name)
}

/// Get the xpm metadata directory (`<vendor>/.xpm`)
pub fn metadata_dir(vendor_dir: &Path) -> PathBuf {
    vendor_dir.join(".xpm")
}

/// `<vendor>/.xpm/installed.json`
pub fn installed_file(vendor_dir: &Path) -> PathBuf {
    metadata_dir(vendor_dir).join("installed.json")
}

/// `<vendor>/.xpm/run.lock`
pub fn run_lock_file(vendor_dir: &Path) -> PathBuf {
    metadata_dir(vendor_dir).join("run.lock")
}

/// Scratch area where archives are unpacked before placement
pub fn staging_dir(vendor_dir: &Path) -> PathBuf {
    metadata_dir(vendor_dir).join("staging")
}

/// Previous package directories are parked here during updates
pub fn trash_dir(vendor_dir: &Path) -> PathBuf {
    metadata_dir(vendor_dir).join("trash")
}

/// Directory a package is materialized into (`vendor/acme/log` for `acme/log`)
pub fn package_dir(vendor_dir: &Path, package: &str) -> PathBuf {
    package.split('/').fold(vendor_dir.to_path_buf(), |dir, part| dir.join(part))
}

/// Flatten a package name into a single path component
pub fn flat_name(package: &str) -> String {
    package.replace('/', "__")
}

/// Create a directory (and parents) if it does not exist
pub fn ensure_dir(path: &Path) -> XpmResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| {
            XpmError::Path(format!(
                "Failed to create directory {}: {}",
                path.display(),
                e
            ))
        })?;
    }
    Ok(())
}

/// Replace `path` with `data` via a sibling temp file and a rename, so
/// readers see either the old or the new content
pub fn write_atomic(path: &Path, data: &[u8]) -> XpmResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| XpmError::Path(format!("No parent directory: {}", path.display())))?;
    ensure_dir(parent)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| XpmError::Path(format!("Invalid file name: {}", path.display())))?;
    let tmp = parent.join(format!(".{}.tmp-{}", file_name, std::process::id()));

    std::fs::write(&tmp, data)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
