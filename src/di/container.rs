//! Service container for dependency injection

use super::traits::{CacheProvider, ConfigProvider, PackageClient};
use crate::cache::Cache;
use crate::config::Config;
use crate::core::XpmResult;
use crate::repository::client::HttpClient;
use std::sync::Arc;

/// Service container for dependency injection
///
/// This container holds all core services and provides access to them
/// through trait objects. It uses `Arc<dyn Trait>` for runtime polymorphism,
/// allowing easy swapping of implementations for testing.
///
/// # Example (Testing)
///
/// ```
/// use xpm::di::{ServiceContainer, mocks::*};
/// use std::sync::Arc;
///
/// let config = Arc::new(MockConfigProvider::default());
/// let cache = Arc::new(MockCacheProvider::new());
/// let client = Arc::new(MockPackageClient::new());
///
/// let container = ServiceContainer::with_providers(config, cache, client);
/// assert_eq!(container.config().vendor_dir(), "vendor");
/// ```
#[derive(Clone)]
pub struct ServiceContainer {
    pub config: Arc<dyn ConfigProvider>,
    pub cache: Arc<dyn CacheProvider>,
    pub package_client: Arc<dyn PackageClient>,
}

impl ServiceContainer {
    /// Create a new service container with production implementations
    ///
    /// - Creates the cache in the configured directory
    /// - Builds an HTTP client honouring the configured timeout
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config holds values that cannot be used
    /// - Cache directory cannot be created
    /// - The HTTP client cannot be built
    pub fn new(config: Config) -> XpmResult<Self> {
        config.validate()?;
        let cache = Cache::new(config.get_cache_dir()?)?;
        cache.init()?;
        let client = HttpClient::new(config.fetch_timeout())?;

        Ok(Self {
            config: Arc::new(config),
            cache: Arc::new(cache),
            package_client: Arc::new(client),
        })
    }

    /// Create a service container with custom provider implementations
    ///
    /// This is primarily useful for testing, where you can inject mock
    /// implementations of each service.
    pub fn with_providers(
        config: Arc<dyn ConfigProvider>,
        cache: Arc<dyn CacheProvider>,
        package_client: Arc<dyn PackageClient>,
    ) -> Self {
        Self {
            config,
            cache,
            package_client,
        }
    }

    /// Get the configuration provider
    pub fn config(&self) -> &dyn ConfigProvider {
        self.config.as_ref()
    }
}
