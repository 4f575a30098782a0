//! Conflict explanations for failed resolutions.

use crate::core::version::Version;
use crate::repository::PackageMetadata;
use std::fmt;
use xpm_core::package::manifest::PackageConstraint;

/// Who asked for a requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requester {
    Root,
    Package { name: String, version: Version },
}

impl Requester {
    pub fn of(package: &PackageMetadata) -> Self {
        Requester::Package {
            name: package.name.clone(),
            version: package.version.clone(),
        }
    }
}

impl fmt::Display for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requester::Root => write!(f, "root"),
            Requester::Package { name, version } => write!(f, "{}@{}", name, version),
        }
    }
}

/// A constraint together with the package (or root) that declared it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub constraint: PackageConstraint,
    pub required_by: Requester,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requires {} {}",
            self.required_by, self.constraint.name, self.constraint.expression
        )
    }
}

/// The requirements that could not be met for one package
#[derive(Debug, Clone)]
pub struct Conflict {
    pub package: String,
    pub requirements: Vec<Requirement>,
    /// How each requesting package was itself pulled in, root first
    pub ancestry: Vec<Requirement>,
}

impl Conflict {
    /// Shrink the requirements by greedy deletion while no available
    /// version satisfies what is left
    ///
    /// If the full set is satisfiable on its own the conflict lies deeper in
    /// the graph and the requirements are kept as they are.
    pub fn minimize(&mut self, available: &[&PackageMetadata]) {
        if Self::satisfiable(&self.requirements, available) {
            return;
        }
        let mut index = 0;
        while index < self.requirements.len() {
            let mut candidate = self.requirements.clone();
            candidate.remove(index);
            if !candidate.is_empty() && !Self::satisfiable(&candidate, available) {
                self.requirements = candidate;
            } else {
                index += 1;
            }
        }
    }

    fn satisfiable(requirements: &[Requirement], available: &[&PackageMetadata]) -> bool {
        available.iter().any(|package| {
            requirements
                .iter()
                .all(|r| package.version.satisfies(&r.constraint.constraint))
        })
    }

    /// Multi-line chain: how the requesters were reached, the clashing
    /// requirements, then the versions that were on offer
    pub fn render(&self, available: &[&PackageMetadata]) -> String {
        let mut lines: Vec<String> = Vec::new();
        for requirement in self.ancestry.iter().chain(&self.requirements) {
            let line = format!("  {}", requirement);
            if !lines.contains(&line) {
                lines.push(line);
            }
        }
        if available.is_empty() {
            lines.push(format!("  no versions of {} are available", self.package));
        } else {
            let versions: Vec<String> = available.iter().map(|p| p.version.to_string()).collect();
            lines.push(format!(
                "  available versions of {}: {}",
                self.package,
                versions.join(", ")
            ));
        }
        lines.join("\n")
    }
}
