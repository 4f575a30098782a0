use crate::repository::PackageMetadata;
use std::collections::BTreeMap;

/// One exact version per package, keyed and iterated by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSet {
    packages: BTreeMap<String, PackageMetadata>,
}

impl ResolvedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_packages<I>(packages: I) -> Self
    where
        I: IntoIterator<Item = PackageMetadata>,
    {
        Self {
            packages: packages
                .into_iter()
                .map(|package| (package.name.clone(), package))
                .collect(),
        }
    }

    /// Insert or replace the entry for the package's name
    pub fn insert(&mut self, package: PackageMetadata) {
        self.packages.insert(package.name.clone(), package);
    }

    pub fn get(&self, name: &str) -> Option<&PackageMetadata> {
        self.packages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageMetadata> {
        self.packages.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Entries that the installer materializes (everything not provided)
    pub fn installable(&self) -> impl Iterator<Item = &PackageMetadata> {
        self.packages.values().filter(|p| !p.provided)
    }

    /// Requirements inside the set that the set itself does not satisfy
    ///
    /// Each entry reads `a@1.0.0 requires b ^2.0 (found 1.4.0)`. Provided
    /// packages are exempt, their dependencies belong to the host.
    pub fn unsatisfied(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for package in self.installable() {
            let requirements = match package.requirements() {
                Ok(requirements) => requirements,
                Err(e) => {
                    problems.push(e.to_string());
                    continue;
                }
            };
            for requirement in requirements {
                match self.packages.get(&requirement.name) {
                    Some(dep) if dep.version.satisfies(&requirement.constraint) => {}
                    Some(dep) => problems.push(format!(
                        "{} requires {} {} (found {})",
                        package.id(),
                        requirement.name,
                        requirement.expression,
                        dep.version
                    )),
                    None => problems.push(format!(
                        "{} requires {} {} (missing)",
                        package.id(),
                        requirement.name,
                        requirement.expression
                    )),
                }
            }
        }
        problems
    }

    pub fn into_packages(self) -> Vec<PackageMetadata> {
        self.packages.into_values().collect()
    }
}

impl<'a> IntoIterator for &'a ResolvedSet {
    type Item = &'a PackageMetadata;
    type IntoIter = std::collections::btree_map::Values<'a, String, PackageMetadata>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.values()
    }
}
