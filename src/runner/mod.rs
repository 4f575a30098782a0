//! End-to-end runs: manifest in, vendor directory and lock file out.

pub mod run_lock;

pub use run_lock::RunGuard;

use crate::core::path::vendor_dir;
use crate::core::version::Version;
use crate::core::{CancelFlag, XpmError, XpmResult};
use crate::di::ServiceContainer;
use crate::package::{
    FailedPackage, InstallOutcome, InstalledState, LockRecord, LockStore, PackageInstaller,
};
use crate::repository::{
    HostSource, IndexSource, InstalledSource, PackageSource, PathSource, RepositorySet,
};
use crate::resolver::{DependencyResolver, ResolvedSet};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xpm_core::package::{ExtensionManifest, PackageConstraint, RepositoryKind, RepositorySpec};

/// Which packages an update may move
///
/// Only whole-set updates exist today; selective updates would add variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateScope {
    #[default]
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Follow the lock file when it still matches the manifest
    Install,
    /// Resolve afresh and rewrite the lock file
    Update(UpdateScope),
}

/// Summary of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub installed: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub provided: Vec<String>,
    pub skipped_removals: Vec<String>,
    pub failed: Option<FailedPackage>,
    /// Sources that could not be loaded
    pub warnings: Vec<String>,
    /// The locked set was used without resolving
    pub used_lock: bool,
    pub lock_written: bool,
}

impl RunReport {
    fn from_outcome(outcome: InstallOutcome) -> Self {
        Self {
            installed: outcome.installed,
            updated: outcome.updated,
            removed: outcome.removed,
            provided: outcome.provided,
            skipped_removals: outcome.skipped_removals,
            failed: outcome.failed,
            ..Default::default()
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.failed.is_some() {
            1
        } else {
            0
        }
    }

    /// Nothing was installed, updated, removed or written
    pub fn is_noop(&self) -> bool {
        self.installed.is_empty()
            && self.updated.is_empty()
            && self.removed.is_empty()
            && !self.lock_written
    }
}

/// Drives resolution, installation and locking for one extension
pub struct Runner {
    container: ServiceContainer,
    cancel: CancelFlag,
    extra_sources: Vec<Arc<dyn PackageSource>>,
}

impl Runner {
    pub fn new(container: ServiceContainer) -> Self {
        Self {
            container,
            cancel: CancelFlag::new(),
            extra_sources: Vec::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Consult `source` after the configured repositories
    pub fn with_source(mut self, source: Arc<dyn PackageSource>) -> Self {
        self.extra_sources.push(source);
        self
    }

    /// Load `extension.json` from `extension_dir` and run
    pub async fn run_extension(&self, mode: RunMode, extension_dir: &Path) -> XpmResult<RunReport> {
        let manifest = ExtensionManifest::load(extension_dir)?;
        self.run(mode, &manifest, extension_dir).await
    }

    /// One install or update run
    ///
    /// Errors before installation (bad manifest, unsatisfiable constraints,
    /// another run in progress) are returned as `Err`. A package failing
    /// during installation is reported in `RunReport::failed` and leaves the
    /// lock file untouched.
    pub async fn run(
        &self,
        mode: RunMode,
        manifest: &ExtensionManifest,
        extension_dir: &Path,
    ) -> XpmResult<RunReport> {
        let constraints = manifest.constraints()?;
        let vendor = vendor_dir(extension_dir, self.container.config().vendor_dir());
        let _guard = RunGuard::acquire(&vendor)?;

        let fingerprint = LockStore::fingerprint(&constraints);
        let store = LockStore::new(extension_dir);
        let state = InstalledState::load(&vendor)?;

        let mut warnings = Vec::new();
        let mut used_lock = false;
        let target = match mode {
            RunMode::Install => match store.load()? {
                Some(record) => match self.check_lock(&record, &fingerprint).await {
                    Ok(()) => {
                        tracing::info!("Using {}", store.path().display());
                        used_lock = true;
                        record.resolved_set()
                    }
                    Err(XpmError::LockMismatch(reason)) => {
                        tracing::info!("Lock file is out of date ({}), resolving", reason);
                        self.resolve(
                            manifest,
                            extension_dir,
                            &constraints,
                            &state,
                            Some(record.pins()),
                            &mut warnings,
                        )
                        .await?
                    }
                    Err(e) => return Err(e),
                },
                None => {
                    self.resolve(manifest, extension_dir, &constraints, &state, None, &mut warnings)
                        .await?
                }
            },
            RunMode::Update(UpdateScope::All) => {
                self.resolve(manifest, extension_dir, &constraints, &state, None, &mut warnings)
                    .await?
            }
        };

        let installer = PackageInstaller::from_container(&self.container, &vendor)?
            .with_cancel_flag(self.cancel.clone());
        let outcome = installer.reconcile(&target).await?;

        let mut report = RunReport::from_outcome(outcome);
        report.warnings = warnings;
        report.used_lock = used_lock;
        if report.failed.is_none() {
            let record = LockRecord::new(&target, fingerprint)?;
            report.lock_written = store.save(&record)?;
        }
        Ok(report)
    }

    /// `LockMismatch` unless the record can be installed as it is
    async fn check_lock(&self, record: &LockRecord, fingerprint: &str) -> XpmResult<()> {
        record.check(fingerprint)?;

        let Some(path) = self.container.config().shared_installed() else {
            return match record.packages.iter().find(|p| p.provided) {
                Some(p) => Err(XpmError::LockMismatch(format!(
                    "{} is no longer provided by the host",
                    p.id()
                ))),
                None => Ok(()),
            };
        };

        // Host-provided packages may have changed since the lock was written
        let host: BTreeMap<String, Version> = match HostSource::new(path).load().await {
            Ok(packages) => packages.into_iter().map(|p| (p.name, p.version)).collect(),
            Err(e) => {
                tracing::warn!("{}", e);
                BTreeMap::new()
            }
        };
        for package in &record.packages {
            match (package.provided, host.get(&package.name)) {
                (true, Some(version)) if *version == package.version => {}
                (false, None) => {}
                _ => {
                    return Err(XpmError::LockMismatch(format!(
                        "host packages changed for {}",
                        package.name
                    )))
                }
            }
        }
        Ok(())
    }

    /// Sources in precedence order: host, installed, path repositories,
    /// index repositories, then injected sources
    fn sources(
        &self,
        manifest: &ExtensionManifest,
        extension_dir: &Path,
        state: &InstalledState,
    ) -> Vec<Arc<dyn PackageSource>> {
        let config = self.container.config();
        let mut sources: Vec<Arc<dyn PackageSource>> = Vec::new();

        if let Some(path) = config.shared_installed() {
            sources.push(Arc::new(HostSource::new(path)));
        }
        if !state.is_empty() {
            sources.push(Arc::new(InstalledSource::new(state)));
        }

        let specs: Vec<(&RepositorySpec, Option<&Path>)> = manifest
            .repositories()
            .iter()
            .map(|spec| (spec, Some(extension_dir)))
            .chain(config.repositories().iter().map(|spec| (spec, None)))
            .collect();
        for (spec, base) in &specs {
            if spec.kind == RepositoryKind::Path {
                let root = match base {
                    Some(base) => base.join(&spec.url),
                    None => PathBuf::from(&spec.url),
                };
                sources.push(Arc::new(PathSource::new(root, spec.optional)));
            }
        }
        for (spec, _) in &specs {
            if spec.kind == RepositoryKind::Index {
                sources.push(Arc::new(IndexSource::new(
                    &spec.url,
                    spec.optional,
                    self.container.package_client.clone(),
                    self.container.cache.clone(),
                )));
            }
        }

        sources.extend(self.extra_sources.iter().cloned());
        sources
    }

    async fn resolve(
        &self,
        manifest: &ExtensionManifest,
        extension_dir: &Path,
        constraints: &[PackageConstraint],
        state: &InstalledState,
        pins: Option<BTreeMap<String, Version>>,
        warnings: &mut Vec<String>,
    ) -> XpmResult<ResolvedSet> {
        let sources = self.sources(manifest, extension_dir, state);
        let repository = RepositorySet::load(&sources).await?;
        warnings.extend(repository.warnings().iter().cloned());

        let mut resolver = DependencyResolver::new(&repository)
            .with_max_steps(self.container.config().max_resolution_steps())
            .with_cancel_flag(self.cancel.clone());
        if let Some(pins) = pins {
            resolver = resolver.with_pins(pins);
        }
        let resolved = resolver.resolve(constraints)?;
        tracing::info!("Resolved {} packages", resolved.len());
        Ok(resolved)
    }
}
