//! Dependency injection infrastructure for xpm
//!
//! This module provides trait-based dependency injection to improve testability,
//! reduce coupling, and enable better architectural boundaries.
//!
//! # Example (Production)
//! ```no_run
//! use xpm::config::Config;
//! use xpm::di::ServiceContainer;
//!
//! # fn example() -> xpm::core::XpmResult<()> {
//! let container = ServiceContainer::new(Config::load()?)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example (Testing)
//! ```
//! use xpm::di::{ServiceContainer, mocks::*};
//! use std::sync::Arc;
//!
//! let config = Arc::new(MockConfigProvider::default());
//! let cache = Arc::new(MockCacheProvider::new());
//! let client = Arc::new(MockPackageClient::new());
//!
//! let container = ServiceContainer::with_providers(config, cache, client);
//! ```

pub mod container;
pub mod mocks;
pub mod traits;

// Re-export key types
pub use container::ServiceContainer;
pub use traits::{CacheProvider, ConfigProvider, PackageClient};
