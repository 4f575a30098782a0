//! xpm, an extension package manager
//!
//! Installs the packages an extension declares in `extension.json` into the
//! extension's own vendor directory, pinned by `extension.lock`. Errors,
//! versions and the manifest format come from `xpm-core`; this crate adds the
//! repository sources, resolver, lock store and installer.

pub use xpm_core::package::manifest::ExtensionManifest;
pub use xpm_core::{format_error_with_help, ErrorHelp, XpmError, XpmResult};

/// Core module re-exported from xpm-core, plus cancellation.
pub mod core;

/// Configuration management.
pub mod config;

/// Download cache.
pub mod cache;

/// Dependency injection seams.
pub mod di;

/// Package metadata sources and the merged repository set.
pub mod repository;

/// Dependency resolution.
pub mod resolver;

/// Lock record, installed state and the installer.
pub mod package;

/// End-to-end install and update runs.
pub mod runner;
