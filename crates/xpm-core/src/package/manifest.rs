//! Extension manifest (`extension.json`).
//!
//! Only the `packages` section matters to xpm; other keys belong to the host
//! application and are ignored.

use crate::core::error::{XpmError, XpmResult};
use crate::core::path::manifest_file;
use crate::core::version::{parse_compound_constraint, VersionConstraint};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

fn package_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9]+([._-][a-z0-9]+)*(/[a-z0-9]+([._-][a-z0-9]+)*)?$")
            .expect("package name pattern is valid")
    })
}

/// `vendor/name` or `name`, lowercase, single separators.
pub fn is_valid_package_name(name: &str) -> bool {
    package_name_pattern().is_match(name)
}

/// A version requirement on a named package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageConstraint {
    pub name: String,
    /// The expression as written
    pub expression: String,
    pub constraint: VersionConstraint,
}

impl PackageConstraint {
    pub fn parse(name: &str, expression: &str) -> XpmResult<Self> {
        if !is_valid_package_name(name) {
            return Err(XpmError::ManifestInvalid(format!(
                "Invalid package name '{}'",
                name
            )));
        }
        let constraint = parse_compound_constraint(expression).map_err(|e| {
            XpmError::ManifestInvalid(format!(
                "Invalid constraint '{}' for '{}': {}",
                expression, name, e
            ))
        })?;
        Ok(Self {
            name: name.to_string(),
            expression: expression.trim().to_string(),
            constraint,
        })
    }

    /// Whitespace- and precision-insensitive form of the constraint
    pub fn normalized(&self) -> String {
        self.constraint.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKind {
    /// Remote JSON index served over HTTP
    Index,
    /// Local directory holding a `packages.json` index
    Path,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySpec {
    #[serde(rename = "type")]
    pub kind: RepositoryKind,
    pub url: String,
    /// Optional sources may be unreachable without failing the run
    #[serde(default = "default_true")]
    pub optional: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagesSection {
    #[serde(default)]
    pub require: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<RepositorySpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Older manifests name this section `composer`
    #[serde(default, alias = "composer", skip_serializing_if = "Option::is_none")]
    pub packages: Option<PackagesSection>,
}

impl ExtensionManifest {
    /// Build a manifest from `(name, expression)` pairs
    pub fn with_requirements<I, N, E>(requirements: I) -> Self
    where
        I: IntoIterator<Item = (N, E)>,
        N: Into<String>,
        E: Into<String>,
    {
        Self {
            name: None,
            packages: Some(PackagesSection {
                require: requirements
                    .into_iter()
                    .map(|(n, e)| (n.into(), e.into()))
                    .collect(),
                repositories: Vec::new(),
            }),
        }
    }

    /// Load and validate `extension.json` from an extension directory
    pub fn load(extension_dir: &Path) -> XpmResult<Self> {
        if !extension_dir.is_dir() {
            return Err(XpmError::ManifestInvalid(format!(
                "Extension directory does not exist: {}",
                extension_dir.display()
            )));
        }

        let path = manifest_file(extension_dir);
        let content = fs::read_to_string(&path).map_err(|e| {
            XpmError::ManifestInvalid(format!("Cannot read {}: {}", path.display(), e))
        })?;

        let manifest = Self::from_json_str(&content)
            .map_err(|e| XpmError::ManifestInvalid(format!("{}: {}", path.display(), e)))?;
        Ok(manifest)
    }

    pub fn from_json_str(content: &str) -> XpmResult<Self> {
        let manifest: ExtensionManifest = serde_json::from_str(content)
            .map_err(|e| XpmError::ManifestInvalid(format!("Malformed JSON: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Fail unless there is at least one requirement and every entry parses
    pub fn validate(&self) -> XpmResult<()> {
        self.constraints().map(|_| ())
    }

    /// Root constraints, sorted by package name
    pub fn constraints(&self) -> XpmResult<Vec<PackageConstraint>> {
        let section = self.packages.as_ref().ok_or_else(|| {
            XpmError::ManifestInvalid("No \"packages\" section defined".to_string())
        })?;

        if section.require.is_empty() {
            return Err(XpmError::ManifestInvalid(
                "\"packages.require\" is empty".to_string(),
            ));
        }

        section
            .require
            .iter()
            .map(|(name, expression)| PackageConstraint::parse(name, expression))
            .collect()
    }

    pub fn repositories(&self) -> &[RepositorySpec] {
        self.packages
            .as_ref()
            .map(|p| p.repositories.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_package_names() {
        assert!(is_valid_package_name("acme/log"));
        assert!(is_valid_package_name("acme-corp/http.client"));
        assert!(is_valid_package_name("standalone"));
        assert!(!is_valid_package_name("Acme/Log"));
        assert!(!is_valid_package_name("acme//log"));
        assert!(!is_valid_package_name("acme/log/extra"));
        assert!(!is_valid_package_name("-acme"));
        assert!(!is_valid_package_name(""));
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = ExtensionManifest::from_json_str(
            r#"{
                "name": "blog",
                "title": "Blog",
                "packages": {
                    "require": {"acme/log": ">=1.0,<2.0", "acme/http": "^2.1"},
                    "repositories": [{"type": "path", "url": "../repo"}]
                }
            }"#,
        )
        .unwrap();

        let constraints = manifest.constraints().unwrap();
        assert_eq!(constraints.len(), 2);
        assert_eq!(constraints[0].name, "acme/http");
        assert_eq!(constraints[1].expression, ">=1.0,<2.0");
        assert_eq!(manifest.repositories().len(), 1);
        assert!(manifest.repositories()[0].optional);
        assert_eq!(manifest.repositories()[0].kind, RepositoryKind::Path);
    }

    #[test]
    fn test_composer_section_is_accepted() {
        let manifest = ExtensionManifest::from_json_str(
            r#"{"name": "blog", "composer": {"require": {"acme/log": "^1.0"}}}"#,
        )
        .unwrap();
        let constraints = manifest.constraints().unwrap();
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0].name, "acme/log");

        // Written back under the current name
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.contains("\"packages\""));
        assert!(!json.contains("composer"));
    }

    #[test]
    fn test_missing_packages_section() {
        let err = ExtensionManifest::from_json_str(r#"{"name": "blog"}"#).unwrap_err();
        assert!(matches!(err, XpmError::ManifestInvalid(_)));
        assert!(err.to_string().contains("packages"));
    }

    #[test]
    fn test_empty_require() {
        let err =
            ExtensionManifest::from_json_str(r#"{"packages": {"require": {}}}"#).unwrap_err();
        assert!(matches!(err, XpmError::ManifestInvalid(_)));
    }

    #[test]
    fn test_invalid_constraint_names_package() {
        let err = ExtensionManifest::from_json_str(
            r#"{"packages": {"require": {"acme/log": "not a version"}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("acme/log"));
    }

    #[test]
    fn test_malformed_json() {
        let err = ExtensionManifest::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, XpmError::ManifestInvalid(_)));
    }

    #[test]
    fn test_load_missing_directory() {
        let temp = TempDir::new().unwrap();
        let err = ExtensionManifest::load(&temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, XpmError::ManifestInvalid(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("extension.json"),
            r#"{"packages": {"require": {"acme/log": "1.0"}}}"#,
        )
        .unwrap();
        let manifest = ExtensionManifest::load(temp.path()).unwrap();
        assert_eq!(manifest.constraints().unwrap()[0].name, "acme/log");
    }

    #[test]
    fn test_normalized_expression() {
        let a = PackageConstraint::parse("acme/log", ">= 1.0, <2").unwrap();
        let b = PackageConstraint::parse("acme/log", ">=1.0.0,<2.0.0").unwrap();
        assert_eq!(a.normalized(), b.normalized());
    }
}
