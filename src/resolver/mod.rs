//! Dependency resolution.

pub mod conflict;
pub mod dependency_graph;
pub mod dependency_resolver;
pub mod resolved;

pub use conflict::{Conflict, Requester, Requirement};
pub use dependency_graph::DependencyGraph;
pub use dependency_resolver::{DependencyResolver, DEFAULT_MAX_STEPS};
pub use resolved::ResolvedSet;
