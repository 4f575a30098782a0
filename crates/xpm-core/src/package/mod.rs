pub mod manifest;

pub use manifest::{ExtensionManifest, PackageConstraint, RepositoryKind, RepositorySpec};
