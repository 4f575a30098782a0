//! Core module re-exports.
//!
//! Errors, versions and the path layout live in `xpm-core`; they are
//! re-exported here so the rest of the crate can use `crate::core::*`.

pub use xpm_core::core::*;

/// Cooperative cancellation shared by the resolver and installer.
pub mod cancel;

pub use cancel::CancelFlag;
