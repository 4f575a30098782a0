use crate::core::path::{ensure_dir, metadata_dir, run_lock_file};
use crate::core::{XpmError, XpmResult};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Advisory lock held for the duration of a run on one vendor directory
///
/// The file holds the owner's pid and is removed when the guard drops. A lock
/// left behind by a process that no longer exists is reclaimed.
#[derive(Debug)]
pub struct RunGuard {
    path: PathBuf,
}

impl RunGuard {
    pub fn acquire(vendor_dir: &Path) -> XpmResult<Self> {
        ensure_dir(&metadata_dir(vendor_dir))?;
        let path = run_lock_file(vendor_dir);

        let mut file = match Self::create(&path) {
            Err(e) if e.kind() == ErrorKind::AlreadyExists && Self::is_stale(&path) => {
                tracing::warn!("Removing stale {}", path.display());
                fs::remove_file(&path)?;
                Self::create(&path)
            }
            other => other,
        }
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => XpmError::AlreadyRunning { path: path.clone() },
            _ => e.into(),
        })?;

        // The guard owns the file from here, so a failed write still cleans up
        let guard = Self { path };
        writeln!(file, "{}", std::process::id())?;
        tracing::debug!("Acquired {}", guard.path.display());
        Ok(guard)
    }

    fn create(path: &Path) -> std::io::Result<fs::File> {
        OpenOptions::new().write(true).create_new(true).open(path)
    }

    /// The recorded owner is gone
    ///
    /// An unreadable or empty file may belong to a run that has not written
    /// its pid yet, so it is never stale.
    fn is_stale(path: &Path) -> bool {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| content.trim().parse::<u32>().ok())
            .is_some_and(|pid| pid != std::process::id() && !is_process_alive(pid))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}

/// Whether `pid` is a running process; unknown platforms assume it is
fn is_process_alive(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new(&format!("/proc/{}", pid)).exists()
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ps")
            .args(["-p", &pid.to_string()])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(true)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        let _ = pid;
        true
    }
}
