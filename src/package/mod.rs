//! Lock records, installed state and the installer that reconciles them.

pub mod extractor;
pub mod fetcher;
pub mod installed;
pub mod installer;
pub mod lockfile;
pub mod plan;
pub mod step;
pub mod verifier;

pub use extractor::{PackageExtractor, StagedPackage};
pub use fetcher::{Artifact, FetchedArtifact, ParallelFetcher};
pub use installed::{InstalledPackage, InstalledState};
pub use installer::{InstallOutcome, PackageInstaller};
pub use lockfile::{LockRecord, LockStore, LOCK_SCHEMA_VERSION};
pub use plan::{InstallPlan, Operation};
pub use step::{FailedPackage, PackageProgress, PackageStep};
pub use verifier::{hash_tree, PackageVerifier, VerificationResult};
