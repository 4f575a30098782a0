//! Package metadata sources and the merged repository set.

pub mod client;
pub mod index;
pub mod installed;
pub mod local;
pub mod metadata;
pub mod set;

pub use index::IndexSource;
pub use installed::{HostSource, InstalledSource};
pub use local::PathSource;
pub use metadata::{Dist, DistKind, IndexDocument, IndexEntry, PackageMetadata};
pub use set::RepositorySet;

use crate::core::XpmResult;
use async_trait::async_trait;

/// A place package metadata comes from
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Human-readable name used in warnings and errors
    fn name(&self) -> &str;

    /// Whether the run may continue when this source is unavailable
    fn optional(&self) -> bool {
        true
    }

    async fn load(&self) -> XpmResult<Vec<PackageMetadata>>;
}
