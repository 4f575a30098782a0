//! Reconciliation plan: what has to change for the vendor directory to
//! match a resolved set.

use super::installed::InstalledState;
use crate::core::path::package_dir;
use crate::core::version::Version;
use crate::repository::PackageMetadata;
use crate::resolver::{DependencyGraph, ResolvedSet};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Install(PackageMetadata),
    Update {
        from: Version,
        package: PackageMetadata,
    },
    Remove {
        name: String,
        version: Version,
    },
}

impl Operation {
    pub fn name(&self) -> &str {
        match self {
            Operation::Install(package) | Operation::Update { package, .. } => &package.name,
            Operation::Remove { name, .. } => name,
        }
    }

    /// The package to materialize, if any
    pub fn package(&self) -> Option<&PackageMetadata> {
        match self {
            Operation::Install(package) | Operation::Update { package, .. } => Some(package),
            Operation::Remove { .. } => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Install(package) => write!(f, "install {}", package.id()),
            Operation::Update { from, package } => {
                write!(f, "update {} ({} -> {})", package.name, from, package.version)
            }
            Operation::Remove { name, version } => write!(f, "remove {}@{}", name, version),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallPlan {
    /// Installs and updates in dependency order, then removals by name
    pub operations: Vec<Operation>,
    /// Host-provided packages of the target (`name@version`)
    pub provided: Vec<String>,
    /// Removals left out because a target package still depends on them
    pub skipped_removals: Vec<String>,
}

impl InstallPlan {
    /// Compare the target set with what is installed under `vendor_dir`
    pub fn build(target: &ResolvedSet, state: &InstalledState, vendor_dir: &Path) -> Self {
        let graph = DependencyGraph::from_resolved(target);
        if let Err(e) = graph.detect_circular_dependencies() {
            tracing::debug!("{}, installing the cycle in name order", e);
        }
        let mut plan = InstallPlan {
            provided: target
                .iter()
                .filter(|p| p.provided)
                .map(PackageMetadata::id)
                .collect(),
            ..Default::default()
        };

        for name in graph.install_order() {
            let Some(package) = target.get(&name) else {
                continue;
            };
            if package.provided {
                continue;
            }
            let present = package_dir(vendor_dir, &name).is_dir();
            match state.get(&name) {
                Some(installed) if installed.version == package.version && present => {}
                Some(installed) if installed.version != package.version => {
                    plan.operations.push(Operation::Update {
                        from: installed.version.clone(),
                        package: package.clone(),
                    })
                }
                _ => plan.operations.push(Operation::Install(package.clone())),
            }
        }

        for (name, installed) in &state.packages {
            if target.installable().any(|p| &p.name == name) {
                continue;
            }
            let dependents = graph.dependents_of(name);
            if !dependents.is_empty() {
                tracing::warn!(
                    "Keeping {}@{}: still required by {}",
                    name,
                    installed.version,
                    dependents.join(", ")
                );
                plan.skipped_removals.push(name.clone());
                continue;
            }
            plan.operations.push(Operation::Remove {
                name: name.clone(),
                version: installed.version.clone(),
            });
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
