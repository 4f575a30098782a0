use super::metadata::{IndexDocument, PackageMetadata};
use super::PackageSource;
use crate::core::{XpmError, XpmResult};
use crate::di::{CacheProvider, PackageClient};
use async_trait::async_trait;
use std::sync::Arc;

/// Remote repository serving `<url>/packages.json`
///
/// The last good index is kept in the cache and used when the remote cannot
/// be reached.
pub struct IndexSource {
    url: String,
    optional: bool,
    client: Arc<dyn PackageClient>,
    cache: Arc<dyn CacheProvider>,
}

impl IndexSource {
    pub fn new(
        url: &str,
        optional: bool,
        client: Arc<dyn PackageClient>,
        cache: Arc<dyn CacheProvider>,
    ) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            optional,
            client,
            cache,
        }
    }

    /// URL of the index document
    pub fn index_url(&self) -> String {
        if self.url.ends_with(".json") {
            self.url.clone()
        } else {
            format!("{}/packages.json", self.url)
        }
    }

    /// Base that relative dist URLs are joined to
    fn base_url(&self) -> &str {
        if self.url.ends_with(".json") {
            self.url
                .rsplit_once('/')
                .map(|(base, _)| base)
                .unwrap_or(&self.url)
        } else {
            &self.url
        }
    }

    fn unavailable(&self, reason: String) -> XpmError {
        XpmError::SourceUnavailable {
            source_name: self.url.clone(),
            reason,
        }
    }

    async fn fetch_document(&self) -> XpmResult<IndexDocument> {
        let index_url = self.index_url();
        let cache_path = self.cache.index_path(&index_url);

        match self.client.fetch_text(&index_url).await {
            Ok(content) => {
                let document = IndexDocument::parse(&content)
                    .map_err(|e| self.unavailable(format!("malformed index: {}", e)))?;
                if let Err(e) = self.cache.write(&cache_path, content.as_bytes()) {
                    tracing::warn!("Could not cache index {}: {}", index_url, e);
                }
                Ok(document)
            }
            Err(e) if self.cache.exists(&cache_path) => {
                tracing::warn!("{} unreachable ({}), using cached index", index_url, e);
                let content = self.cache.read(&cache_path)?;
                let content = String::from_utf8(content)
                    .map_err(|e| self.unavailable(format!("cached index is not UTF-8: {}", e)))?;
                IndexDocument::parse(&content)
                    .map_err(|e| self.unavailable(format!("malformed cached index: {}", e)))
            }
            Err(e) => Err(self.unavailable(e.to_string())),
        }
    }
}

#[async_trait]
impl PackageSource for IndexSource {
    fn name(&self) -> &str {
        &self.url
    }

    fn optional(&self) -> bool {
        self.optional
    }

    async fn load(&self) -> XpmResult<Vec<PackageMetadata>> {
        let document = self.fetch_document().await?;
        let mut packages = document.into_metadata(&self.url);
        for package in &mut packages {
            if let Some(dist) = package.dist.as_mut() {
                if !dist.url.contains("://") && !dist.url.starts_with('/') {
                    dist.url = format!("{}/{}", self.base_url(), dist.url.trim_start_matches("./"));
                }
            }
        }
        Ok(packages)
    }
}
