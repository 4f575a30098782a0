//! Backtracking dependency resolver

use super::conflict::{Conflict, Requester, Requirement};
use super::resolved::ResolvedSet;
use crate::core::version::Version;
use crate::core::{CancelFlag, XpmError, XpmResult};
use crate::repository::{PackageMetadata, RepositorySet};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use xpm_core::package::manifest::PackageConstraint;

/// Default bound on resolver steps
pub const DEFAULT_MAX_STEPS: usize = 100_000;

/// Partial assignment plus every requirement collected so far
#[derive(Debug, Clone, Default)]
struct SearchState<'a> {
    assigned: BTreeMap<String, &'a PackageMetadata>,
    requirements: BTreeMap<String, Vec<Requirement>>,
}

impl SearchState<'_> {
    fn into_resolved(self) -> ResolvedSet {
        ResolvedSet::from_packages(self.assigned.into_values().cloned())
    }
}

/// A decision that can be revisited: the state before choosing `package`
/// and the candidates not tried yet
struct ChoicePoint<'a> {
    package: String,
    remaining: VecDeque<&'a PackageMetadata>,
    state: SearchState<'a>,
}

enum Selection<'a> {
    /// Every required package is assigned
    Done,
    Choose {
        package: String,
        candidates: Vec<&'a PackageMetadata>,
    },
    Conflict(Conflict),
}

/// Resolves root constraints against a [`RepositorySet`]
///
/// The search is iterative with an explicit stack of choice points. At each
/// step the unassigned package with the fewest remaining candidates is
/// decided next (ties go to the smaller name); candidates are tried newest
/// first, except that a pinned version is tried before the others. A
/// conflict returns to the most recent choice point with untried candidates.
pub struct DependencyResolver<'a> {
    repository: &'a RepositorySet,
    pins: BTreeMap<String, Version>,
    max_steps: usize,
    cancel: CancelFlag,
}

impl<'a> DependencyResolver<'a> {
    /// Create a new resolver
    pub fn new(repository: &'a RepositorySet) -> Self {
        Self {
            repository,
            pins: BTreeMap::new(),
            max_steps: DEFAULT_MAX_STEPS,
            cancel: CancelFlag::new(),
        }
    }

    /// Prefer these versions when they are still acceptable
    pub fn with_pins(mut self, pins: BTreeMap<String, Version>) -> Self {
        self.pins = pins;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Resolve the root constraints into one consistent set of versions
    ///
    /// Fails `Unsatisfiable` when no combination works (or the step budget
    /// runs out) and `Cancelled` when the cancel flag is raised.
    pub fn resolve(&self, root: &[PackageConstraint]) -> XpmResult<ResolvedSet> {
        let mut state = SearchState::default();
        for constraint in root {
            state
                .requirements
                .entry(constraint.name.clone())
                .or_default()
                .push(Requirement {
                    constraint: constraint.clone(),
                    required_by: Requester::Root,
                });
        }

        let mut stack: Vec<ChoicePoint<'a>> = Vec::new();
        let mut steps = 0usize;
        let mut last_conflict: Option<Conflict> = None;

        loop {
            self.tick(&mut steps, root)?;

            match self.select(&state) {
                Selection::Done => {
                    tracing::debug!(
                        "Resolved {} packages in {} steps",
                        state.assigned.len(),
                        steps
                    );
                    return Ok(state.into_resolved());
                }
                Selection::Choose {
                    package,
                    candidates,
                } => {
                    tracing::debug!("Deciding {} ({} candidates)", package, candidates.len());
                    stack.push(ChoicePoint {
                        package,
                        remaining: candidates.into(),
                        state: state.clone(),
                    });
                }
                Selection::Conflict(conflict) => {
                    tracing::debug!("Conflict on {}", conflict.package);
                    last_conflict = Some(conflict);
                }
            }

            match self.advance(&mut stack, &mut steps, &mut last_conflict, root)? {
                Some(next) => state = next,
                None => return Err(self.unsatisfiable(last_conflict, root)),
            }
        }
    }

    /// Count a step, enforcing the budget and honouring cancellation
    fn tick(&self, steps: &mut usize, root: &[PackageConstraint]) -> XpmResult<()> {
        self.cancel.check()?;
        *steps += 1;
        if *steps > self.max_steps {
            return Err(XpmError::Unsatisfiable {
                package: root_names(root),
                chain: format!(
                    "  resolution gave up after {} steps (max_resolution_steps)",
                    self.max_steps
                ),
            });
        }
        Ok(())
    }

    fn select(&self, state: &SearchState<'a>) -> Selection<'a> {
        let mut best: Option<(&String, Vec<&'a PackageMetadata>)> = None;

        for (name, requirements) in &state.requirements {
            if state.assigned.contains_key(name) {
                continue;
            }
            let candidates = self.candidates(name, requirements);
            if candidates.is_empty() {
                return Selection::Conflict(self.conflict(state, name));
            }
            let better = best
                .as_ref()
                .map_or(true, |(_, current)| candidates.len() < current.len());
            if better {
                best = Some((name, candidates));
            }
        }

        match best {
            None => Selection::Done,
            Some((name, candidates)) => Selection::Choose {
                package: name.clone(),
                candidates,
            },
        }
    }

    /// Versions of `name` meeting every requirement, in trial order
    fn candidates(&self, name: &str, requirements: &[Requirement]) -> Vec<&'a PackageMetadata> {
        let repository: &'a RepositorySet = self.repository;
        let mut candidates: Vec<&'a PackageMetadata> = repository
            .find(name)
            .into_iter()
            .filter(|package| {
                requirements
                    .iter()
                    .all(|r| package.version.satisfies(&r.constraint.constraint))
            })
            .collect();

        if let Some(pin) = self.pins.get(name) {
            if let Some(position) = candidates.iter().position(|p| &p.version == pin) {
                let pinned = candidates.remove(position);
                candidates.insert(0, pinned);
            }
        }
        candidates
    }

    /// Try the next untried candidate, unwinding exhausted choice points
    fn advance(
        &self,
        stack: &mut Vec<ChoicePoint<'a>>,
        steps: &mut usize,
        last_conflict: &mut Option<Conflict>,
        root: &[PackageConstraint],
    ) -> XpmResult<Option<SearchState<'a>>> {
        while let Some(point) = stack.last_mut() {
            while let Some(candidate) = point.remaining.pop_front() {
                let mut next = point.state.clone();
                match self.assign(&mut next, candidate) {
                    Ok(()) => {
                        tracing::debug!("Trying {}", candidate.id());
                        return Ok(Some(next));
                    }
                    Err(conflict) => {
                        tracing::debug!("{} conflicts on {}", candidate.id(), conflict.package);
                        *last_conflict = Some(conflict);
                        self.tick(steps, root)?;
                    }
                }
            }
            tracing::debug!("No candidates left for {}, backtracking", point.package);
            stack.pop();
        }
        Ok(None)
    }

    /// Assign `candidate` and add its requirements
    ///
    /// Fails when a new requirement rules out a package that is already
    /// assigned. Provided packages bring no requirements.
    fn assign(
        &self,
        state: &mut SearchState<'a>,
        candidate: &'a PackageMetadata,
    ) -> Result<(), Conflict> {
        state.assigned.insert(candidate.name.clone(), candidate);
        if candidate.provided {
            return Ok(());
        }

        // Entries were validated when the repository set was built
        let dependencies = candidate.requirements().unwrap_or_default();
        for constraint in dependencies {
            let name = constraint.name.clone();
            let violated = state
                .assigned
                .get(&name)
                .map_or(false, |assigned| !assigned.version.satisfies(&constraint.constraint));
            state
                .requirements
                .entry(name.clone())
                .or_default()
                .push(Requirement {
                    constraint,
                    required_by: Requester::of(candidate),
                });
            if violated {
                return Err(self.conflict(state, &name));
            }
        }
        Ok(())
    }

    fn conflict(&self, state: &SearchState<'a>, name: &str) -> Conflict {
        let mut conflict = Conflict {
            package: name.to_string(),
            requirements: state.requirements.get(name).cloned().unwrap_or_default(),
            ancestry: Vec::new(),
        };
        conflict.minimize(&self.repository.find(name));
        conflict.ancestry = ancestry(state, &conflict.requirements);
        conflict
    }

    fn unsatisfiable(&self, conflict: Option<Conflict>, root: &[PackageConstraint]) -> XpmError {
        match conflict {
            Some(conflict) => {
                let available = self.repository.find(&conflict.package);
                XpmError::Unsatisfiable {
                    chain: conflict.render(&available),
                    package: conflict.package,
                }
            }
            None => XpmError::Unsatisfiable {
                package: root_names(root),
                chain: "  no combination of versions satisfies the requirements".to_string(),
            },
        }
    }
}

/// Requirements that pulled in each requester, root first
fn ancestry(state: &SearchState<'_>, requirements: &[Requirement]) -> Vec<Requirement> {
    let mut lines = Vec::new();
    for requirement in requirements {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut requester = &requirement.required_by;
        while let Requester::Package { name, .. } = requester {
            if !seen.insert(name.clone()) {
                break;
            }
            match state.requirements.get(name).and_then(|r| r.first()) {
                Some(parent) => {
                    chain.push(parent.clone());
                    requester = &parent.required_by;
                }
                None => break,
            }
        }
        chain.reverse();
        for line in chain {
            if !lines.contains(&line) {
                lines.push(line);
            }
        }
    }
    lines
}

fn root_names(root: &[PackageConstraint]) -> String {
    root.iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::mocks::mock_package;

    fn constraints(pairs: &[(&str, &str)]) -> Vec<PackageConstraint> {
        pairs
            .iter()
            .map(|(n, e)| PackageConstraint::parse(n, e).unwrap())
            .collect()
    }

    fn version_of(set: &ResolvedSet, name: &str) -> String {
        set.get(name).unwrap().version.to_string()
    }

    #[test]
    fn test_range_picks_newest_match() {
        let repo = RepositorySet::from_layers([vec![
            mock_package("a", "1.0", &[]),
            mock_package("a", "1.5", &[]),
            mock_package("a", "2.0", &[]),
        ]]);
        let set = DependencyResolver::new(&repo)
            .resolve(&constraints(&[("a", ">=1.0,<2.0")]))
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(version_of(&set, "a"), "1.5.0");
    }

    #[test]
    fn test_conflicting_transitive_requirements_are_unsatisfiable() {
        let repo = RepositorySet::from_layers([vec![
            mock_package("a", "1.0", &[("c", ">=2.0")]),
            mock_package("b", "1.0", &[("c", "<2.0")]),
            mock_package("c", "1.0", &[]),
            mock_package("c", "2.0", &[]),
        ]]);
        let err = DependencyResolver::new(&repo)
            .resolve(&constraints(&[("a", "1.0"), ("b", "1.0")]))
            .unwrap_err();

        match err {
            XpmError::Unsatisfiable { package, chain } => {
                assert_eq!(package, "c");
                assert!(chain.contains("root requires a 1.0"), "{}", chain);
                assert!(chain.contains("root requires b 1.0"), "{}", chain);
                assert!(chain.contains("a@1.0.0 requires c >=2.0"), "{}", chain);
                assert!(chain.contains("b@1.0.0 requires c <2.0"), "{}", chain);
                assert!(chain.contains("available versions of c: 2.0.0, 1.0.0"));
            }
            other => panic!("expected Unsatisfiable, got {}", other),
        }
    }

    #[test]
    fn test_backtracks_to_older_version() {
        let repo = RepositorySet::from_layers([vec![
            mock_package("app", "1.0", &[("lib", "*"), ("util", "*")]),
            mock_package("lib", "2.0", &[("util", "^2.0")]),
            mock_package("lib", "1.0", &[("util", "^1.0")]),
            mock_package("util", "1.3", &[]),
        ]]);
        let set = DependencyResolver::new(&repo)
            .resolve(&constraints(&[("app", "*")]))
            .unwrap();

        assert_eq!(version_of(&set, "lib"), "1.0.0");
        assert_eq!(version_of(&set, "util"), "1.3.0");
        assert!(set.unsatisfied().is_empty());
    }

    #[test]
    fn test_backtracks_when_assigned_package_is_ruled_out() {
        // x is decided before z's requirement on it is known
        let repo = RepositorySet::from_layers([vec![
            mock_package("x", "2.0", &[]),
            mock_package("x", "1.0", &[]),
            mock_package("y", "1.0", &[("z", "*")]),
            mock_package("z", "2.0", &[("x", "^2.0"), ("w", "*")]),
            mock_package("z", "1.0", &[("x", "^1.0")]),
        ]]);
        let set = DependencyResolver::new(&repo)
            .resolve(&constraints(&[("x", "*"), ("y", "*")]))
            .unwrap();

        assert_eq!(version_of(&set, "z"), "1.0.0");
        assert_eq!(version_of(&set, "x"), "1.0.0");
        assert!(set.unsatisfied().is_empty());
    }

    #[test]
    fn test_pins_are_tried_first() {
        let repo = RepositorySet::from_layers([vec![
            mock_package("a", "1.0", &[]),
            mock_package("a", "1.5", &[]),
        ]]);
        let root = constraints(&[("a", "^1.0")]);

        let pinned = DependencyResolver::new(&repo)
            .with_pins(BTreeMap::from([("a".to_string(), Version::new(1, 0, 0))]))
            .resolve(&root)
            .unwrap();
        assert_eq!(version_of(&pinned, "a"), "1.0.0");

        // A pin that no longer satisfies the constraints is ignored
        let stale = DependencyResolver::new(&repo)
            .with_pins(BTreeMap::from([("a".to_string(), Version::new(0, 9, 0))]))
            .resolve(&root)
            .unwrap();
        assert_eq!(version_of(&stale, "a"), "1.5.0");
    }

    #[test]
    fn test_provided_packages_satisfy_requirements() {
        let mut host = mock_package("psr/log", "1.1.4", &[("php", ">=5.3")]);
        host.provided = true;
        let repo = RepositorySet::from_layers([
            vec![host],
            vec![
                mock_package("acme/logger", "1.0", &[("psr/log", "^1.0")]),
                mock_package("psr/log", "3.0.0", &[]),
            ],
        ]);

        let set = DependencyResolver::new(&repo)
            .resolve(&constraints(&[("acme/logger", "*")]))
            .unwrap();
        assert!(set.get("psr/log").unwrap().provided);
        assert!(set.get("php").is_none());

        let err = DependencyResolver::new(&repo)
            .resolve(&constraints(&[("psr/log", "^3.0")]))
            .unwrap_err();
        assert!(matches!(err, XpmError::Unsatisfiable { .. }));
    }

    #[test]
    fn test_unknown_package() {
        let repo = RepositorySet::from_layers([vec![mock_package("a", "1.0", &[("ghost", "^1.0")])]]);
        let err = DependencyResolver::new(&repo)
            .resolve(&constraints(&[("a", "*")]))
            .unwrap_err();
        match err {
            XpmError::Unsatisfiable { package, chain } => {
                assert_eq!(package, "ghost");
                assert!(chain.contains("no versions of ghost are available"));
                assert!(chain.contains("a@1.0.0 requires ghost ^1.0"));
            }
            other => panic!("expected Unsatisfiable, got {}", other),
        }
    }

    #[test]
    fn test_cycles_resolve() {
        let repo = RepositorySet::from_layers([vec![
            mock_package("a", "1.0", &[("b", "^1.0")]),
            mock_package("b", "1.0", &[("a", "^1.0")]),
        ]]);
        let set = DependencyResolver::new(&repo)
            .resolve(&constraints(&[("a", "*")]))
            .unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_step_budget() {
        let repo = RepositorySet::from_layers([vec![
            mock_package("a", "1.0", &[("b", "^1.0")]),
            mock_package("b", "1.0", &[]),
        ]]);
        let err = DependencyResolver::new(&repo)
            .with_max_steps(1)
            .resolve(&constraints(&[("a", "*")]))
            .unwrap_err();
        assert!(err.to_string().contains("gave up after 1 steps"));
    }

    #[test]
    fn test_cancelled() {
        let repo = RepositorySet::from_layers([vec![mock_package("a", "1.0", &[])]]);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = DependencyResolver::new(&repo)
            .with_cancel_flag(cancel)
            .resolve(&constraints(&[("a", "*")]))
            .unwrap_err();
        assert!(matches!(err, XpmError::Cancelled));
    }

    #[test]
    fn test_deterministic() {
        let repo = RepositorySet::from_layers([vec![
            mock_package("a", "1.0", &[("c", "*")]),
            mock_package("b", "1.0", &[("c", "<2.0")]),
            mock_package("c", "1.0", &[]),
            mock_package("c", "1.9", &[]),
            mock_package("c", "2.0", &[]),
        ]]);
        let root = constraints(&[("a", "*"), ("b", "*")]);
        let first = DependencyResolver::new(&repo).resolve(&root).unwrap();
        let second = DependencyResolver::new(&repo).resolve(&root).unwrap();
        assert_eq!(first, second);
        assert_eq!(version_of(&first, "c"), "1.9.0");
    }
}
