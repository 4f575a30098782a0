//! Reconciles a vendor directory with a resolved set

use super::extractor::{PackageExtractor, StagedPackage};
use super::fetcher::{Artifact, FetchedArtifact, ParallelFetcher};
use super::installed::InstalledState;
use super::plan::{InstallPlan, Operation};
use super::step::{FailedPackage, PackageProgress, PackageStep};
use super::verifier::PackageVerifier;
use crate::cache::ChecksumAlgorithm;
use crate::core::path::{ensure_dir, flat_name, package_dir, staging_dir, trash_dir};
use crate::core::{CancelFlag, XpmError, XpmResult};
use crate::di::ServiceContainer;
use crate::repository::PackageMetadata;
use crate::resolver::ResolvedSet;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// What a reconciliation did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOutcome {
    /// `name@version` of fresh installs
    pub installed: Vec<String>,
    /// `name@old -> new`
    pub updated: Vec<String>,
    /// `name@version` of removed packages
    pub removed: Vec<String>,
    pub provided: Vec<String>,
    pub skipped_removals: Vec<String>,
    pub failed: Option<FailedPackage>,
}

impl InstallOutcome {
    /// Whether anything under the vendor directory changed
    pub fn changed(&self) -> bool {
        !(self.installed.is_empty() && self.updated.is_empty() && self.removed.is_empty())
    }
}

/// Installs, updates and removes packages under `<extension>/<vendor>`
pub struct PackageInstaller {
    vendor_dir: PathBuf,
    fetcher: ParallelFetcher,
    verifier: PackageVerifier,
    extractor: PackageExtractor,
    cancel: CancelFlag,
}

impl PackageInstaller {
    pub fn new(vendor_dir: &Path, fetcher: ParallelFetcher, verifier: PackageVerifier) -> Self {
        Self {
            vendor_dir: vendor_dir.to_path_buf(),
            fetcher,
            verifier,
            extractor: PackageExtractor::new(staging_dir(vendor_dir)),
            cancel: CancelFlag::new(),
        }
    }

    /// Installer wired from the container's configuration and services
    pub fn from_container(container: &ServiceContainer, vendor_dir: &Path) -> XpmResult<Self> {
        let config = container.config();
        let max_size = config.max_archive_size()?;
        let verifier = PackageVerifier::new(
            ChecksumAlgorithm::parse(config.checksum_algorithm())?,
            config.verify_checksums(),
            max_size,
        );
        let fetcher = ParallelFetcher::new(
            container.package_client.clone(),
            container.cache.clone(),
            config.max_concurrent_fetches(),
            config.fetch_timeout(),
        )
        .with_max_size(max_size)
        .with_verifier(verifier.clone())
        .with_progress(config.show_progress());
        Ok(Self::new(vendor_dir, fetcher, verifier))
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn vendor_dir(&self) -> &Path {
        &self.vendor_dir
    }

    /// Bring the vendor directory in line with `target`
    ///
    /// Stops at the first package that fails and reports it in the outcome;
    /// the saved state then lists only packages that were fully recorded.
    /// Cancellation between packages returns `Cancelled`.
    pub async fn reconcile(&self, target: &ResolvedSet) -> XpmResult<InstallOutcome> {
        let mut state = InstalledState::load(&self.vendor_dir)?;
        let plan = InstallPlan::build(target, &state, &self.vendor_dir);
        let mut outcome = InstallOutcome {
            provided: plan.provided.clone(),
            skipped_removals: plan.skipped_removals.clone(),
            ..Default::default()
        };
        if plan.is_empty() {
            tracing::debug!("Nothing to install, update or remove");
            return Ok(outcome);
        }
        self.cancel.check()?;

        let to_fetch: Vec<PackageMetadata> = plan
            .operations
            .iter()
            .filter_map(|op| op.package().cloned())
            .collect();
        let mut fetched = self.fetcher.fetch_all(to_fetch).await;

        let result = self.apply(&plan, &mut fetched, &mut state, &mut outcome);
        self.cleanup();
        result.map(|_| outcome)
    }

    fn apply(
        &self,
        plan: &InstallPlan,
        fetched: &mut BTreeMap<String, XpmResult<FetchedArtifact>>,
        state: &mut InstalledState,
        outcome: &mut InstallOutcome,
    ) -> XpmResult<()> {
        for operation in &plan.operations {
            self.cancel.check()?;
            tracing::info!("{}", operation);

            match operation {
                Operation::Remove { name, version } => {
                    self.remove(name)?;
                    state.remove(name);
                    state.save(&self.vendor_dir)?;
                    outcome.removed.push(format!("{}@{}", name, version));
                }
                Operation::Install(package) | Operation::Update { package, .. } => {
                    let artifact = fetched.remove(&package.name).unwrap_or_else(|| {
                        Err(XpmError::PackageFetchFailed {
                            package: package.name.clone(),
                            cause: "not fetched".to_string(),
                        })
                    });
                    if let Err(failed) = self.materialize(package, artifact, state)? {
                        tracing::warn!("{}", failed);
                        outcome.failed = Some(failed);
                        return Ok(());
                    }
                    match operation {
                        Operation::Update { from, .. } => outcome
                            .updated
                            .push(format!("{}@{} -> {}", package.name, from, package.version)),
                        _ => outcome.installed.push(package.id()),
                    }
                }
            }
        }
        Ok(())
    }

    /// Take one package through its steps
    ///
    /// The outer error is for faults that end the whole run (state can't be
    /// saved, illegal transition); the inner one is this package failing.
    fn materialize(
        &self,
        package: &PackageMetadata,
        artifact: XpmResult<FetchedArtifact>,
        state: &mut InstalledState,
    ) -> XpmResult<Result<(), FailedPackage>> {
        let mut progress = PackageProgress::new(package.name.clone());

        progress.advance(PackageStep::Fetching)?;
        let artifact = match artifact {
            Ok(fetched) => fetched.artifact,
            Err(e) => return Ok(Err(progress.fail(failure_cause(e))?)),
        };

        progress.advance(PackageStep::Verifying)?;
        let staged = match self.stage(package, &artifact) {
            Ok(staged) => staged,
            Err(e) => return Ok(Err(progress.fail(failure_cause(e))?)),
        };

        // Once placed, the directory is live and the state must follow
        let dest = package_dir(&self.vendor_dir, &package.name);
        if let Err(e) = self.place(&package.name, &staged, &dest) {
            staged.discard();
            return Ok(Err(progress.fail(failure_cause(e))?));
        }
        staged.discard();
        progress.advance(PackageStep::Placed)?;

        let checksum = self.verifier.tree_checksum(&dest)?;
        state.record(package, checksum);
        state.save(&self.vendor_dir)?;
        progress.advance(PackageStep::Recorded)?;
        Ok(Ok(()))
    }

    fn stage(&self, package: &PackageMetadata, artifact: &Artifact) -> XpmResult<StagedPackage> {
        match artifact {
            Artifact::Archive { kind, bytes } => {
                self.verifier.verify_archive(package, bytes)?;
                self.extractor
                    .extract(&package.name, *kind, bytes)
                    .map_err(|e| XpmError::PackageVerifyFailed {
                        package: package.name.clone(),
                        cause: e.to_string(),
                    })
            }
            Artifact::Directory(source) => self.extractor.copy_dir(&package.name, source),
        }
    }

    /// Move the staged tree to `dest`, parking any previous version in the
    /// trash until the new one is in place
    fn place(&self, name: &str, staged: &StagedPackage, dest: &Path) -> XpmResult<()> {
        if let Some(parent) = dest.parent() {
            ensure_dir(parent)?;
        }

        let parked = if dest.exists() {
            let trash = trash_dir(&self.vendor_dir).join(flat_name(name));
            if trash.exists() {
                fs::remove_dir_all(&trash)?;
            }
            ensure_dir(&trash_dir(&self.vendor_dir))?;
            fs::rename(dest, &trash)?;
            Some(trash)
        } else {
            None
        };

        if let Err(e) = fs::rename(&staged.root, dest) {
            return Err(match &parked {
                Some(trash) => restore_parked(trash, dest, e),
                None => e.into(),
            });
        }

        if let Some(trash) = parked {
            fs::remove_dir_all(&trash)?;
        }
        Ok(())
    }

    fn remove(&self, name: &str) -> XpmResult<()> {
        let dir = package_dir(&self.vendor_dir, name);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        // Drop `vendor/<vendor>` once its last package is gone
        if let Some(parent) = dir.parent() {
            if parent != self.vendor_dir && parent.starts_with(&self.vendor_dir) {
                let empty = fs::read_dir(parent)
                    .map(|mut entries| entries.next().is_none())
                    .unwrap_or(false);
                if empty {
                    fs::remove_dir(parent)?;
                }
            }
        }
        Ok(())
    }

    fn cleanup(&self) {
        for dir in [staging_dir(&self.vendor_dir), trash_dir(&self.vendor_dir)] {
            if dir.exists() {
                if let Err(e) = fs::remove_dir_all(&dir) {
                    tracing::warn!("Failed to clean up {}: {}", dir.display(), e);
                }
            }
        }
    }
}

/// Package errors carry the package name already; keep only their cause
/// Put a parked directory back after placement failed
///
/// When that fails too the package directory is gone; the returned error
/// names where the previous version was left.
fn restore_parked(trash: &Path, dest: &Path, cause: std::io::Error) -> XpmError {
    match fs::rename(trash, dest) {
        Ok(()) => cause.into(),
        Err(restore) => {
            tracing::warn!(
                "Could not restore {} from {}: {}",
                dest.display(),
                trash.display(),
                restore
            );
            XpmError::Package(format!(
                "{}; previous version could not be restored from {}: {}",
                cause,
                trash.display(),
                restore
            ))
        }
    }
}

fn failure_cause(error: XpmError) -> String {
    match error {
        XpmError::PackageFetchFailed { cause, .. } | XpmError::PackageVerifyFailed { cause, .. } => {
            cause
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::version::Version;
    use crate::di::mocks::{mock_archive, mock_package, MockCacheProvider, MockPackageClient};
    use crate::repository::Dist;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        client: Arc<MockPackageClient>,
        cache: Arc<MockCacheProvider>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                temp: TempDir::new().unwrap(),
                client: Arc::new(MockPackageClient::new()),
                cache: Arc::new(MockCacheProvider::new()),
            }
        }

        fn vendor(&self) -> PathBuf {
            self.temp.path().join("vendor")
        }

        /// Serve a package archive holding one file naming its version
        fn serve(&self, name: &str, version: &str) -> PackageMetadata {
            let package = mock_package(name, version, &[]);
            let url = &package.dist.as_ref().unwrap().url;
            self.client.add_response(
                url,
                mock_archive(&[("pkg/VERSION", version), ("pkg/src/lib.php", "<?php")]),
            );
            package
        }

        fn installer(&self) -> PackageInstaller {
            let verifier = PackageVerifier::new(ChecksumAlgorithm::Blake3, true, None);
            let fetcher = ParallelFetcher::new(
                self.client.clone(),
                self.cache.clone(),
                4,
                Duration::from_secs(5),
            )
            .with_verifier(verifier.clone());
            PackageInstaller::new(&self.vendor(), fetcher, verifier)
        }

        fn version_file(&self, name: &str) -> String {
            fs::read_to_string(package_dir(&self.vendor(), name).join("VERSION")).unwrap()
        }
    }

    #[tokio::test]
    async fn test_fresh_install() {
        let fx = Fixture::new();
        let target = ResolvedSet::from_packages([
            fx.serve("acme/log", "1.0.0"),
            fx.serve("psr/log", "1.1.4"),
        ]);

        let outcome = fx.installer().reconcile(&target).await.unwrap();
        assert_eq!(outcome.installed, vec!["acme/log@1.0.0", "psr/log@1.1.4"]);
        assert!(outcome.failed.is_none());
        assert_eq!(fx.version_file("psr/log"), "1.1.4");

        let state = InstalledState::load(&fx.vendor()).unwrap();
        assert_eq!(state.len(), 2);
        assert!(state.get("acme/log").unwrap().checksum.starts_with("blake3:"));
        assert!(!staging_dir(&fx.vendor()).exists());
    }

    #[tokio::test]
    async fn test_second_run_writes_nothing() {
        let fx = Fixture::new();
        let target = ResolvedSet::from_packages([fx.serve("psr/log", "1.1.4")]);
        fx.installer().reconcile(&target).await.unwrap();

        let state_file = crate::core::path::installed_file(&fx.vendor());
        let modified = fs::metadata(&state_file).unwrap().modified().unwrap();
        let requests = fx.client.request_count();

        let outcome = fx.installer().reconcile(&target).await.unwrap();
        assert!(!outcome.changed());
        assert_eq!(fs::metadata(&state_file).unwrap().modified().unwrap(), modified);
        assert_eq!(fx.client.request_count(), requests);
    }

    #[tokio::test]
    async fn test_update_replaces_directory() {
        let fx = Fixture::new();
        let old = ResolvedSet::from_packages([fx.serve("acme/log", "1.0.0")]);
        fx.installer().reconcile(&old).await.unwrap();

        let new = ResolvedSet::from_packages([fx.serve("acme/log", "2.0.0")]);
        let outcome = fx.installer().reconcile(&new).await.unwrap();
        assert_eq!(outcome.updated, vec!["acme/log@1.0.0 -> 2.0.0"]);
        assert_eq!(fx.version_file("acme/log"), "2.0.0");

        let state = InstalledState::load(&fx.vendor()).unwrap();
        assert_eq!(state.get("acme/log").unwrap().version, Version::new(2, 0, 0));
        assert!(!trash_dir(&fx.vendor()).exists());
    }

    #[tokio::test]
    async fn test_removal() {
        let fx = Fixture::new();
        let both = ResolvedSet::from_packages([
            fx.serve("acme/log", "1.0.0"),
            fx.serve("psr/log", "1.1.4"),
        ]);
        fx.installer().reconcile(&both).await.unwrap();

        let one = ResolvedSet::from_packages([fx.serve("psr/log", "1.1.4")]);
        let outcome = fx.installer().reconcile(&one).await.unwrap();
        assert_eq!(outcome.removed, vec!["acme/log@1.0.0"]);
        assert!(!fx.vendor().join("acme").exists());
        assert!(InstalledState::load(&fx.vendor()).unwrap().get("acme/log").is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported_and_stops() {
        let fx = Fixture::new();
        let target = ResolvedSet::from_packages([
            fx.serve("acme/log", "1.0.0"),
            mock_package("acme/missing", "1.0.0", &[]),
            fx.serve("psr/log", "1.1.4"),
        ]);

        let outcome = fx.installer().reconcile(&target).await.unwrap();
        let failed = outcome.failed.unwrap();
        assert_eq!(failed.name, "acme/missing");
        assert_eq!(failed.step, PackageStep::Fetching);

        // Name order: acme/log was placed before the failure, psr/log was not
        assert_eq!(outcome.installed, vec!["acme/log@1.0.0"]);
        let state = InstalledState::load(&fx.vendor()).unwrap();
        assert!(state.get("acme/log").is_some());
        assert!(state.get("psr/log").is_none());
        assert!(!package_dir(&fx.vendor(), "psr/log").exists());
    }

    #[tokio::test]
    async fn test_checksum_mismatch_fails_verifying() {
        let fx = Fixture::new();
        let mut package = fx.serve("acme/log", "1.0.0");
        if let Some(dist) = package.dist.as_mut() {
            dist.shasum = Some(format!("sha256:{}", "0".repeat(64)));
        }

        let outcome = fx
            .installer()
            .reconcile(&ResolvedSet::from_packages([package]))
            .await
            .unwrap();
        let failed = outcome.failed.unwrap();
        assert_eq!(failed.step, PackageStep::Verifying);
        assert!(failed.cause.contains("checksum mismatch"));
        assert!(!package_dir(&fx.vendor(), "acme/log").exists());
    }

    #[tokio::test]
    async fn test_corrupt_download_does_not_poison_later_runs() {
        let fx = Fixture::new();
        let good = mock_archive(&[("pkg/VERSION", "1.0.0")]);
        let mut package = mock_package("acme/log", "1.0.0", &[]);
        let url = package.dist.as_ref().unwrap().url.clone();
        if let Some(dist) = package.dist.as_mut() {
            dist.shasum = Some(ChecksumAlgorithm::Sha256.digest(&good));
        }
        let target = ResolvedSet::from_packages([package]);

        fx.client.add_response(&url, b"truncated".to_vec());
        let first = fx.installer().reconcile(&target).await.unwrap();
        assert_eq!(first.failed.unwrap().step, PackageStep::Verifying);

        // The mirror is fixed; the next run must download again
        fx.client.add_response(&url, good);
        let second = fx.installer().reconcile(&target).await.unwrap();
        assert!(second.failed.is_none());
        assert_eq!(second.installed, vec!["acme/log@1.0.0"]);
        assert_eq!(fx.client.request_count(), 2);
        assert_eq!(fx.version_file("acme/log"), "1.0.0");
    }

    #[tokio::test]
    async fn test_failed_placement_restores_parked_version() {
        let fx = Fixture::new();
        fx.installer()
            .reconcile(&ResolvedSet::from_packages([fx.serve("acme/log", "1.0.0")]))
            .await
            .unwrap();

        // Staged tree vanished between parking the old version and placing
        let stage_dir = fx.temp.path().join("stage");
        let staged = StagedPackage {
            root: stage_dir.join("content"),
            stage_dir,
        };
        let dest = package_dir(&fx.vendor(), "acme/log");
        assert!(fx.installer().place("acme/log", &staged, &dest).is_err());

        assert_eq!(fx.version_file("acme/log"), "1.0.0");
        assert!(!trash_dir(&fx.vendor()).join(flat_name("acme/log")).exists());
    }

    #[test]
    fn test_failed_restore_is_reported() {
        let temp = TempDir::new().unwrap();
        let trash = temp.path().join("trash/acme__log");
        let dest = temp.path().join("vendor/acme/log");
        let cause = std::io::Error::new(std::io::ErrorKind::NotFound, "staged tree missing");

        let err = restore_parked(&trash, &dest, cause);
        let message = err.to_string();
        assert!(message.contains("staged tree missing"));
        assert!(message.contains("could not be restored"));
        assert!(message.contains("trash"));
    }

    #[tokio::test]
    async fn test_failed_update_keeps_old_version() {
        let fx = Fixture::new();
        fx.installer()
            .reconcile(&ResolvedSet::from_packages([fx.serve("acme/log", "1.0.0")]))
            .await
            .unwrap();

        let broken = mock_package("acme/log", "2.0.0", &[]);
        fx.client
            .add_response(&broken.dist.as_ref().unwrap().url, b"garbage".to_vec());
        let outcome = fx
            .installer()
            .reconcile(&ResolvedSet::from_packages([broken]))
            .await
            .unwrap();

        assert!(outcome.failed.is_some());
        assert_eq!(fx.version_file("acme/log"), "1.0.0");
        let state = InstalledState::load(&fx.vendor()).unwrap();
        assert_eq!(state.get("acme/log").unwrap().version, Version::new(1, 0, 0));
    }

    #[tokio::test]
    async fn test_local_directory_dist() {
        let fx = Fixture::new();
        let source = fx.temp.path().join("local-pkg");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("VERSION"), "0.1.0").unwrap();

        let mut package = mock_package("acme/local", "0.1.0", &[]);
        package.dist = Some(Dist {
            kind: crate::repository::DistKind::Path,
            url: source.to_string_lossy().to_string(),
            shasum: None,
        });

        fx.installer()
            .reconcile(&ResolvedSet::from_packages([package]))
            .await
            .unwrap();
        assert_eq!(fx.version_file("acme/local"), "0.1.0");
        assert!(source.join("VERSION").exists());
    }

    #[tokio::test]
    async fn test_provided_packages_are_reported_not_installed() {
        let fx = Fixture::new();
        let mut provided = mock_package("psr/log", "1.1.4", &[]);
        provided.provided = true;

        let outcome = fx
            .installer()
            .reconcile(&ResolvedSet::from_packages([provided]))
            .await
            .unwrap();
        assert_eq!(outcome.provided, vec!["psr/log@1.1.4"]);
        assert!(!outcome.changed());
        assert!(!fx.vendor().exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_placing() {
        let fx = Fixture::new();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = fx
            .installer()
            .with_cancel_flag(cancel)
            .reconcile(&ResolvedSet::from_packages([fx.serve("psr/log", "1.1.4")]))
            .await;
        assert!(matches!(result, Err(XpmError::Cancelled)));
        assert!(!package_dir(&fx.vendor(), "psr/log").exists());
    }
}
