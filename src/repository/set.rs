use super::metadata::PackageMetadata;
use super::PackageSource;
use crate::core::version::Version;
use crate::core::{XpmError, XpmResult};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Package metadata merged from ordered sources
///
/// For the same `name@version` the first source wins. Names supplied by a
/// provided (host) entry only ever resolve to the provided versions.
#[derive(Debug, Default)]
pub struct RepositorySet {
    packages: BTreeMap<String, BTreeMap<Version, PackageMetadata>>,
    provided: BTreeSet<String>,
    warnings: Vec<String>,
}

impl RepositorySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from in-memory layers, earliest first
    pub fn from_layers<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Vec<PackageMetadata>>,
    {
        let mut set = Self::new();
        for layer in layers {
            for package in layer {
                set.add(package);
            }
        }
        set
    }

    /// Load every source in order
    ///
    /// An unavailable source is recorded as a warning unless it is required.
    /// The load only fails when not a single source could be read; missing
    /// packages are left for the resolver to report.
    pub async fn load(sources: &[Arc<dyn PackageSource>]) -> XpmResult<Self> {
        let mut set = Self::new();
        let mut loaded = 0usize;
        let mut failures = Vec::new();

        for source in sources {
            match source.load().await {
                Ok(packages) => {
                    tracing::debug!("{}: {} package versions", source.name(), packages.len());
                    loaded += 1;
                    for package in packages {
                        set.add(package);
                    }
                }
                Err(e) => {
                    let error = match e {
                        XpmError::SourceUnavailable { .. } => e,
                        other => XpmError::SourceUnavailable {
                            source_name: source.name().to_string(),
                            reason: other.to_string(),
                        },
                    };
                    if !source.optional() {
                        return Err(error);
                    }
                    tracing::warn!("{}", error);
                    set.warnings.push(error.to_string());
                    failures.push(error.to_string());
                }
            }
        }

        if loaded == 0 && !failures.is_empty() {
            return Err(XpmError::SourceUnavailable {
                source_name: "all sources".to_string(),
                reason: failures.join("; "),
            });
        }

        Ok(set)
    }

    /// Merge one entry, keeping the existing one on a `name@version` clash
    pub fn add(&mut self, package: PackageMetadata) {
        if let Err(e) = package.validate() {
            let message = format!("{}: skipping {}: {}", package.origin, package.id(), e);
            tracing::warn!("{}", message);
            self.warnings.push(message);
            return;
        }

        if package.provided {
            if self.provided.insert(package.name.clone()) {
                // Provided versions replace anything seen earlier
                self.packages.remove(&package.name);
            }
        } else if self.provided.contains(&package.name) {
            return;
        }

        self.packages
            .entry(package.name.clone())
            .or_default()
            .entry(package.version.clone())
            .or_insert(package);
    }

    /// All versions of `name`, newest first
    pub fn find(&self, name: &str) -> Vec<&PackageMetadata> {
        self.packages
            .get(name)
            .map(|versions| versions.values().rev().collect())
            .unwrap_or_default()
    }

    /// Problems met while loading (unavailable sources, skipped entries)
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Number of distinct package names
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::mocks::{mock_package, MockPackageSource};
    use crate::package::InstalledState;
    use crate::repository::InstalledSource;
    use crate::resolver::DependencyResolver;
    use xpm_core::package::PackageConstraint;

    fn versions(set: &RepositorySet, name: &str) -> Vec<String> {
        set.find(name).iter().map(|p| p.version.to_string()).collect()
    }

    #[test]
    fn test_find_newest_first() {
        let set = RepositorySet::from_layers([vec![
            mock_package("acme/log", "1.0.0", &[]),
            mock_package("acme/log", "2.0.0", &[]),
            mock_package("acme/log", "1.5.0", &[]),
        ]]);
        assert_eq!(versions(&set, "acme/log"), vec!["2.0.0", "1.5.0", "1.0.0"]);
        assert!(set.find("acme/unknown").is_empty());
    }

    #[test]
    fn test_first_source_wins() {
        let mut first = mock_package("acme/log", "1.0.0", &[]);
        first.origin = "first".to_string();
        let mut second = mock_package("acme/log", "1.0.0", &[("psr/log", "^1.0")]);
        second.origin = "second".to_string();

        let set = RepositorySet::from_layers([vec![first], vec![second]]);
        let found = set.find("acme/log");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].origin, "first");
        assert!(found[0].require.is_empty());
    }

    #[test]
    fn test_provided_packages_pin_their_name() {
        let mut host = mock_package("psr/log", "1.1.4", &[]);
        host.provided = true;
        host.dist = None;

        let set = RepositorySet::from_layers([
            vec![host],
            vec![
                mock_package("psr/log", "3.0.0", &[]),
                mock_package("psr/log", "1.1.4", &[]),
            ],
        ]);
        let found = set.find("psr/log");
        assert_eq!(found.len(), 1);
        assert!(found[0].provided);
    }

    #[test]
    fn test_invalid_requirements_are_skipped() {
        let set = RepositorySet::from_layers([vec![
            mock_package("acme/log", "1.0.0", &[("psr/log", "not a version")]),
            mock_package("acme/log", "1.1.0", &[]),
        ]]);
        assert_eq!(versions(&set, "acme/log"), vec!["1.1.0"]);
        assert_eq!(set.warnings().len(), 1);
    }

    #[tokio::test]
    async fn test_load_tolerates_optional_failures() {
        let sources: Vec<Arc<dyn PackageSource>> = vec![
            Arc::new(MockPackageSource::new("down").failing("connection refused")),
            Arc::new(MockPackageSource::new("up").with_package("acme/log", "1.0.0", &[])),
        ];
        let set = RepositorySet::load(&sources).await.unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.warnings().len(), 1);
        assert!(set.warnings()[0].contains("connection refused"));
    }

    #[tokio::test]
    async fn test_load_fails_when_required_source_fails() {
        let sources: Vec<Arc<dyn PackageSource>> = vec![
            Arc::new(MockPackageSource::new("up").with_package("acme/log", "1.0.0", &[])),
            Arc::new(MockPackageSource::new("down").failing("timeout").required()),
        ];
        let err = RepositorySet::load(&sources).await.unwrap_err();
        assert!(matches!(err, XpmError::SourceUnavailable { ref source_name, .. } if source_name == "down"));
    }

    #[tokio::test]
    async fn test_installed_snapshot_survives_unreachable_repository() {
        let mut state = InstalledState::default();
        state.record(&mock_package("psr/log", "1.0.0", &[]), "blake3:00".to_string());
        let sources: Vec<Arc<dyn PackageSource>> = vec![
            Arc::new(InstalledSource::new(&state)),
            Arc::new(MockPackageSource::new("index").failing("connection refused")),
        ];

        let set = RepositorySet::load(&sources).await.unwrap();
        assert_eq!(versions(&set, "psr/log"), vec!["1.0.0"]);
        assert_eq!(set.warnings().len(), 1);

        let root = [PackageConstraint::parse("psr/log", "^1.0").unwrap()];
        let resolved = DependencyResolver::new(&set).resolve(&root).unwrap();
        assert_eq!(resolved.get("psr/log").unwrap().version.to_string(), "1.0.0");

        let missing = [PackageConstraint::parse("acme/http", "^2.0").unwrap()];
        assert!(matches!(
            DependencyResolver::new(&set).resolve(&missing),
            Err(XpmError::Unsatisfiable { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_fails_when_every_source_fails() {
        let sources: Vec<Arc<dyn PackageSource>> = vec![
            Arc::new(MockPackageSource::new("a").failing("timeout")),
            Arc::new(MockPackageSource::new("b").failing("404")),
        ];
        let err = RepositorySet::load(&sources).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("timeout") && message.contains("404"));
    }

    #[tokio::test]
    async fn test_load_with_no_sources_is_empty() {
        let set = RepositorySet::load(&[]).await.unwrap();
        assert!(set.is_empty());
    }
}
