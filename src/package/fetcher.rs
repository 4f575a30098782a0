//! Bounded parallel fetching of package artifacts.

use super::verifier::PackageVerifier;
use crate::core::{XpmError, XpmResult};
use crate::di::{CacheProvider, PackageClient};
use crate::repository::{DistKind, PackageMetadata};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// What a fetch produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Archive bytes still to be verified and unpacked
    Archive { kind: DistKind, bytes: Vec<u8> },
    /// A local directory to copy as-is
    Directory(PathBuf),
}

#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    pub package: PackageMetadata,
    pub artifact: Artifact,
}

/// Where a dist URL points on the local filesystem, `None` for http(s)
fn local_path(url: &str) -> XpmResult<Option<PathBuf>> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(None);
    }
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(Some(PathBuf::from(path)));
    }
    if url.contains("://") {
        return Err(XpmError::Package(format!("Unsupported URL scheme: {}", url)));
    }
    Ok(Some(PathBuf::from(url)))
}

/// Fetches artifacts with at most `max_concurrent` requests in flight
pub struct ParallelFetcher {
    client: Arc<dyn PackageClient>,
    cache: Arc<dyn CacheProvider>,
    max_concurrent: usize,
    timeout: Duration,
    max_size: Option<u64>,
    verifier: Option<PackageVerifier>,
    show_progress: bool,
}

impl ParallelFetcher {
    pub fn new(
        client: Arc<dyn PackageClient>,
        cache: Arc<dyn CacheProvider>,
        max_concurrent: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            cache,
            max_concurrent: max_concurrent.max(1),
            timeout,
            max_size: None,
            verifier: None,
            show_progress: false,
        }
    }

    /// Abort downloads larger than `max_size` bytes
    pub fn with_max_size(mut self, max_size: Option<u64>) -> Self {
        self.max_size = max_size;
        self
    }

    /// Only cache remote archives `verifier` accepts, and drop cached ones it
    /// rejects
    pub fn with_verifier(mut self, verifier: PackageVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Fetch every package, returning one result per name
    ///
    /// Failures are `PackageFetchFailed`; one package failing does not stop
    /// the others.
    pub async fn fetch_all(
        &self,
        packages: Vec<PackageMetadata>,
    ) -> BTreeMap<String, XpmResult<FetchedArtifact>> {
        let names: Vec<String> = packages.iter().map(|p| p.name.clone()).collect();
        let mut results = BTreeMap::new();
        if packages.is_empty() {
            return results;
        }

        let progress = if self.show_progress {
            let pb = ProgressBar::new(packages.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} packages")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut join_set = JoinSet::new();
        for package in packages {
            if join_set.len() >= self.max_concurrent {
                if let Some(joined) = join_set.join_next().await {
                    Self::collect(joined, &mut results, &progress);
                }
            }

            let client = Arc::clone(&self.client);
            let cache = Arc::clone(&self.cache);
            let timeout = self.timeout;
            let max_size = self.max_size;
            let verifier = self.verifier.clone();
            join_set.spawn(async move {
                let name = package.name.clone();
                let result =
                    Self::fetch_with_timeout(client, cache, verifier, package, timeout, max_size)
                        .await;
                (name, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            Self::collect(joined, &mut results, &progress);
        }
        progress.finish_and_clear();

        // A panicked task leaves no result behind
        for name in names {
            results.entry(name.clone()).or_insert_with(|| {
                Err(XpmError::PackageFetchFailed {
                    package: name,
                    cause: "fetch task aborted".to_string(),
                })
            });
        }
        results
    }

    fn collect(
        joined: Result<(String, XpmResult<FetchedArtifact>), tokio::task::JoinError>,
        results: &mut BTreeMap<String, XpmResult<FetchedArtifact>>,
        progress: &ProgressBar,
    ) {
        match joined {
            Ok((name, result)) => {
                progress.inc(1);
                match &result {
                    Ok(_) => progress.println(format!("  ✓ {}", name)),
                    Err(e) => progress.println(format!("  ✗ {} ({})", name, e)),
                }
                results.insert(name, result);
            }
            Err(e) => tracing::warn!("Fetch task failed: {}", e),
        }
    }

    async fn fetch_with_timeout(
        client: Arc<dyn PackageClient>,
        cache: Arc<dyn CacheProvider>,
        verifier: Option<PackageVerifier>,
        package: PackageMetadata,
        timeout: Duration,
        max_size: Option<u64>,
    ) -> XpmResult<FetchedArtifact> {
        let name = package.name.clone();
        let fetch = Self::fetch_one(
            client.as_ref(),
            cache.as_ref(),
            verifier.as_ref(),
            package,
            max_size,
        );
        match tokio::time::timeout(timeout, fetch).await {
            Ok(Ok(artifact)) => Ok(artifact),
            Ok(Err(XpmError::PackageFetchFailed { package, cause })) => {
                Err(XpmError::PackageFetchFailed { package, cause })
            }
            Ok(Err(e)) => Err(XpmError::PackageFetchFailed {
                package: name,
                cause: e.to_string(),
            }),
            Err(_) => Err(XpmError::PackageFetchFailed {
                package: name,
                cause: format!("timed out after {}s", timeout.as_secs()),
            }),
        }
    }

    /// Fetch a single package's artifact
    ///
    /// Remote archives go through the cache; local archives and directories
    /// are read in place. With a verifier, a cached archive that fails it is
    /// evicted and downloaded again, and a download that fails it is returned
    /// without being cached.
    pub async fn fetch_one(
        client: &dyn PackageClient,
        cache: &dyn CacheProvider,
        verifier: Option<&PackageVerifier>,
        package: PackageMetadata,
        max_size: Option<u64>,
    ) -> XpmResult<FetchedArtifact> {
        let dist = package.dist.clone().ok_or_else(|| XpmError::PackageFetchFailed {
            package: package.name.clone(),
            cause: "no dist information".to_string(),
        })?;
        tracing::debug!("Fetching {} from {}", package.id(), dist.url);

        let artifact = match (dist.kind, local_path(&dist.url)?) {
            (DistKind::Path, Some(path)) => {
                if !path.is_dir() {
                    return Err(XpmError::PackageFetchFailed {
                        package: package.name.clone(),
                        cause: format!("{} is not a directory", path.display()),
                    });
                }
                Artifact::Directory(path)
            }
            (DistKind::Path, None) => {
                return Err(XpmError::PackageFetchFailed {
                    package: package.name.clone(),
                    cause: format!("path dist cannot be remote: {}", dist.url),
                });
            }
            (kind, Some(path)) => Artifact::Archive {
                kind,
                bytes: tokio::fs::read(&path).await?,
            },
            (kind, None) => {
                let cached = cache.archive_path(&package.name, &package.version.to_string(), &dist.url);
                if cache.exists(&cached) {
                    let bytes = cache.read(&cached)?;
                    match verifier.map(|v| v.verify_archive(&package, &bytes)) {
                        Some(Err(e)) => {
                            tracing::warn!("Discarding cached archive {}: {}", cached.display(), e);
                            cache.remove(&cached)?;
                        }
                        _ => {
                            tracing::debug!("Using cached archive {}", cached.display());
                            return Ok(FetchedArtifact {
                                package,
                                artifact: Artifact::Archive { kind, bytes },
                            });
                        }
                    }
                }

                let bytes = client.fetch_bytes(&dist.url, max_size).await?;
                match verifier.map(|v| v.verify_archive(&package, &bytes)) {
                    Some(Err(e)) => tracing::warn!("Not caching {}: {}", dist.url, e),
                    _ => cache.write(&cached, &bytes)?,
                }
                Artifact::Archive { kind, bytes }
            }
        };

        Ok(FetchedArtifact { package, artifact })
    }
}
