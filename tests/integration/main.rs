//! Integration tests for the `xpm` binary
//!
//! Every test runs against a throwaway config, cache and path repository so
//! nothing outside the temp directory is touched.

mod clean;
mod common;
mod install;
mod list;
mod verify;
