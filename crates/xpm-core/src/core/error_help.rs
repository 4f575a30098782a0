//! User-facing error rendering with actionable hints.

use crate::core::error::XpmError;

/// Something the user can do about an error.
pub trait ErrorHelp {
    fn help(&self) -> Option<String>;
}

impl ErrorHelp for XpmError {
    fn help(&self) -> Option<String> {
        let hint = match self {
            XpmError::ManifestInvalid(_) => {
                "Check the \"packages\" section of extension.json: every entry of \"require\" needs a valid name and version constraint."
            }
            XpmError::SourceUnavailable { .. } => {
                "Check your network connection and the repository URLs in extension.json or config.yaml."
            }
            XpmError::Unsatisfiable { .. } => {
                "Relax one of the listed constraints or add a repository that provides a matching version."
            }
            XpmError::LockInvalid { .. } => {
                "Delete the lock file and run `xpm update` to regenerate it."
            }
            XpmError::PackageFetchFailed { .. } => {
                "The download failed or timed out. Retry, or raise fetch_timeout_secs in config.yaml."
            }
            XpmError::PackageVerifyFailed { .. } => {
                "The downloaded archive does not match its recorded checksum or exceeds max_archive_size. Run `xpm clean-cache` and retry."
            }
            XpmError::AlreadyRunning { .. } => {
                "Wait for the other run to finish and retry. If no other run is active, remove the stale run.lock file."
            }
            XpmError::Config(_) | XpmError::Yaml(_) => {
                "Check config.yaml for typos or invalid values."
            }
            _ => return None,
        };
        Some(hint.to_string())
    }
}

/// Render an error as `error: ...` followed by an optional `help: ...` line.
pub fn format_error_with_help(error: &XpmError) -> String {
    match error.help() {
        Some(help) => format!("error: {}\n\nhelp: {}", error, help),
        None => format!("error: {}", error),
    }
}
