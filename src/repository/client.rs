use crate::core::{XpmError, XpmResult};
use crate::di::PackageClient;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// HTTP client used for repository indexes and package archives
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a client whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> XpmResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("xpm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Download a text document
    pub async fn fetch_text(&self, url: &str) -> XpmResult<String> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Download a binary artifact, stopping as soon as it grows past `max_size`
    pub async fn fetch_bytes(&self, url: &str, max_size: Option<u64>) -> XpmResult<Vec<u8>> {
        tracing::debug!("GET {}", url);
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        let too_large = |limit: u64| {
            XpmError::Package(format!(
                "{} exceeds the size limit of {} bytes",
                url, limit
            ))
        };

        if let (Some(limit), Some(length)) = (max_size, response.content_length()) {
            if length > limit {
                return Err(too_large(limit));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if let Some(limit) = max_size {
                if body.len() as u64 > limit {
                    return Err(too_large(limit));
                }
            }
        }
        Ok(body)
    }
}

#[async_trait]
impl PackageClient for HttpClient {
    async fn fetch_text(&self, url: &str) -> XpmResult<String> {
        self.fetch_text(url).await
    }

    async fn fetch_bytes(&self, url: &str, max_size: Option<u64>) -> XpmResult<Vec<u8>> {
        self.fetch_bytes(url, max_size).await
    }
}
