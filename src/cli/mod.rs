pub mod clean;
pub mod install;
pub mod list;
pub mod verify;

use std::path::{Path, PathBuf};
use xpm::config::Config;
use xpm::core::path::{extension_dir, vendor_dir};
use xpm::core::XpmResult;

/// Flags accepted by every subcommand
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub extensions_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl GlobalOptions {
    /// Config file (explicit or default) with command-line overrides applied
    pub fn load_config(&self) -> XpmResult<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        if let Some(dir) = &self.extensions_dir {
            config.extensions_dir = Some(dir.to_string_lossy().to_string());
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.to_string_lossy().to_string());
        }
        Ok(config)
    }
}

/// An extension given by name (under the extensions directory) or by path
pub fn resolve_extension(config: &Config, extension: &str) -> XpmResult<PathBuf> {
    let as_path = Path::new(extension);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        return Ok(as_path.to_path_buf());
    }
    extension_dir(&config.get_extensions_dir()?, extension)
}

/// Vendor directory of an extension under the configured name
pub fn extension_vendor_dir(config: &Config, extension_dir: &Path) -> PathBuf {
    vendor_dir(extension_dir, &config.vendor_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_extension_by_name_and_path() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            extensions_dir: Some(temp.path().to_string_lossy().to_string()),
            ..Default::default()
        };

        assert_eq!(
            resolve_extension(&config, "blog").unwrap(),
            temp.path().join("blog")
        );
        let explicit = temp.path().join("elsewhere/blog");
        assert_eq!(
            resolve_extension(&config, &explicit.to_string_lossy()).unwrap(),
            explicit
        );
        assert!(resolve_extension(&config, "..").is_err());
    }

    #[test]
    fn test_overrides_apply_on_top_of_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        Config::default().save_to(&path).unwrap();

        let options = GlobalOptions {
            extensions_dir: Some(temp.path().join("ext")),
            cache_dir: Some(temp.path().join("cache")),
            config: Some(path),
        };
        let config = options.load_config().unwrap();
        assert_eq!(config.get_extensions_dir().unwrap(), temp.path().join("ext"));
        assert_eq!(config.get_cache_dir().unwrap(), temp.path().join("cache"));
    }
}
