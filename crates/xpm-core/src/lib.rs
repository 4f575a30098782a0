//! Core types for xpm: errors, versions and constraints, path layout and
//! the extension manifest.

pub mod core;
pub mod package;

pub use crate::core::{format_error_with_help, ErrorHelp, XpmError, XpmResult};
