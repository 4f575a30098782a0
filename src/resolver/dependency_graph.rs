//! Dependency graph over a resolved set, for ordering and removal checks

use super::resolved::ResolvedSet;
use crate::core::version::Version;
use crate::core::{XpmError, XpmResult};
use std::collections::{BTreeMap, BTreeSet};

/// Node in the dependency graph
#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub name: String,
    pub version: Version,
    pub dependencies: Vec<String>,
}

/// Dependency graph for tracking package relationships
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, DependencyNode>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph of a resolved set; edges point from a package to the packages
    /// it requires. Provided packages contribute no edges.
    pub fn from_resolved(set: &ResolvedSet) -> Self {
        let mut graph = Self::new();
        for package in set {
            graph.add_node(package.name.clone(), package.version.clone());
        }
        for package in set.installable() {
            for name in package.require.keys() {
                if set.contains(name) {
                    // Both ends were added above
                    let _ = graph.add_dependency(&package.name, name.clone());
                }
            }
        }
        graph
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, name: String, version: Version) {
        self.nodes.insert(
            name.clone(),
            DependencyNode {
                name,
                version,
                dependencies: Vec::new(),
            },
        );
    }

    /// Add a dependency edge between two nodes
    pub fn add_dependency(&mut self, from: &str, to: String) -> XpmResult<()> {
        if let Some(node) = self.nodes.get_mut(from) {
            if !node.dependencies.contains(&to) {
                node.dependencies.push(to);
                node.dependencies.sort();
            }
            Ok(())
        } else {
            Err(XpmError::Package(format!(
                "Package '{}' not found in dependency graph",
                from
            )))
        }
    }

    /// Get a node from the graph
    pub fn get_node(&self, name: &str) -> Option<&DependencyNode> {
        self.nodes.get(name)
    }

    /// Get all node names
    pub fn node_names(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Packages that depend directly on `name`
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.nodes
            .values()
            .filter(|node| node.dependencies.iter().any(|d| d == name))
            .map(|node| node.name.clone())
            .collect()
    }

    /// Every node, dependencies before dependents
    ///
    /// Depth-first post-order visiting names in sorted order, so the result
    /// is deterministic. A cycle is broken where the walk re-enters it.
    pub fn install_order(&self) -> Vec<String> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited = BTreeSet::new();

        for name in self.nodes.keys() {
            if visited.contains(name) {
                continue;
            }
            // Explicit stack of (node, next dependency index)
            let mut stack: Vec<(&str, usize)> = vec![(name.as_str(), 0)];
            visited.insert(name.clone());

            while let Some((current, index)) = stack.pop() {
                let dependencies = self
                    .nodes
                    .get(current)
                    .map(|n| n.dependencies.as_slice())
                    .unwrap_or(&[]);
                if let Some(dep) = dependencies.get(index) {
                    stack.push((current, index + 1));
                    if self.nodes.contains_key(dep) && visited.insert(dep.clone()) {
                        stack.push((dep.as_str(), 0));
                    }
                } else {
                    order.push(current.to_string());
                }
            }
        }
        order
    }

    /// Detect circular dependencies using depth-first search
    pub fn detect_circular_dependencies(&self) -> XpmResult<()> {
        let mut visited = BTreeSet::new();
        let mut rec_stack = BTreeSet::new();

        for name in self.nodes.keys() {
            if !visited.contains(name) {
                self.detect_cycle_dfs(name, &mut visited, &mut rec_stack)?;
            }
        }

        Ok(())
    }

    /// DFS helper for cycle detection
    fn detect_cycle_dfs(
        &self,
        node: &str,
        visited: &mut BTreeSet<String>,
        rec_stack: &mut BTreeSet<String>,
    ) -> XpmResult<()> {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());

        if let Some(node_data) = self.nodes.get(node) {
            for dep in &node_data.dependencies {
                if !visited.contains(dep) {
                    self.detect_cycle_dfs(dep, visited, rec_stack)?;
                } else if rec_stack.contains(dep) {
                    return Err(XpmError::Package(format!(
                        "Circular dependency detected: {} -> {}",
                        node, dep
                    )));
                }
            }
        }

        rec_stack.remove(node);
        Ok(())
    }
}
