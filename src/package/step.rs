//! Per-package progress through installation.

use crate::core::{XpmError, XpmResult};
use serde::Serialize;
use std::fmt;

/// Where a package is in `Pending → Fetching → Verifying → Placed → Recorded`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStep {
    Pending,
    Fetching,
    Verifying,
    Placed,
    Recorded,
    Failed,
}

impl PackageStep {
    /// The step that follows this one on success
    pub fn next(self) -> Option<PackageStep> {
        match self {
            PackageStep::Pending => Some(PackageStep::Fetching),
            PackageStep::Fetching => Some(PackageStep::Verifying),
            PackageStep::Verifying => Some(PackageStep::Placed),
            PackageStep::Placed => Some(PackageStep::Recorded),
            PackageStep::Recorded | PackageStep::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PackageStep::Recorded | PackageStep::Failed)
    }
}

impl fmt::Display for PackageStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackageStep::Pending => "pending",
            PackageStep::Fetching => "fetching",
            PackageStep::Verifying => "verifying",
            PackageStep::Placed => "placed",
            PackageStep::Recorded => "recorded",
            PackageStep::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A package that stopped the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedPackage {
    pub name: String,
    /// Step that was in progress when it failed
    pub step: PackageStep,
    pub cause: String,
}

impl fmt::Display for FailedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed while {}: {}", self.name, self.step, self.cause)
    }
}

/// Tracks one package through its steps
#[derive(Debug, Clone)]
pub struct PackageProgress {
    name: String,
    step: PackageStep,
}

impl PackageProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            step: PackageStep::Pending,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step(&self) -> PackageStep {
        self.step
    }

    /// Move to `to`, which must be the next step
    pub fn advance(&mut self, to: PackageStep) -> XpmResult<()> {
        if self.step.next() != Some(to) {
            return Err(XpmError::Package(format!(
                "Illegal step transition for {}: {} -> {}",
                self.name, self.step, to
            )));
        }
        tracing::debug!("{}: {} -> {}", self.name, self.step, to);
        self.step = to;
        Ok(())
    }

    /// Mark the package failed, remembering the step that was in progress
    pub fn fail(&mut self, cause: impl Into<String>) -> XpmResult<FailedPackage> {
        if self.step.is_terminal() {
            return Err(XpmError::Package(format!(
                "Illegal step transition for {}: {} -> failed",
                self.name, self.step
            )));
        }
        let failed = FailedPackage {
            name: self.name.clone(),
            step: self.step,
            cause: cause.into(),
        };
        tracing::debug!("{}: {} -> failed", self.name, self.step);
        self.step = PackageStep::Failed;
        Ok(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_sequence() {
        let mut progress = PackageProgress::new("acme/log");
        for step in [
            PackageStep::Fetching,
            PackageStep::Verifying,
            PackageStep::Placed,
            PackageStep::Recorded,
        ] {
            progress.advance(step).unwrap();
        }
        assert_eq!(progress.step(), PackageStep::Recorded);
        assert!(progress.step().is_terminal());
    }

    #[test]
    fn test_skipping_a_step_is_rejected() {
        let mut progress = PackageProgress::new("acme/log");
        let err = progress.advance(PackageStep::Placed).unwrap_err();
        assert!(matches!(err, XpmError::Package(_)));
        assert_eq!(progress.step(), PackageStep::Pending);
    }

    #[test]
    fn test_fail_records_current_step() {
        let mut progress = PackageProgress::new("acme/log");
        progress.advance(PackageStep::Fetching).unwrap();
        let failed = progress.fail("timed out").unwrap();
        assert_eq!(failed.step, PackageStep::Fetching);
        assert_eq!(failed.to_string(), "acme/log failed while fetching: timed out");
        assert_eq!(progress.step(), PackageStep::Failed);
    }

    #[test]
    fn test_terminal_steps_cannot_fail() {
        let mut progress = PackageProgress::new("acme/log");
        progress.fail("first").unwrap();
        assert!(progress.fail("second").is_err());
        assert!(progress.advance(PackageStep::Fetching).is_err());
    }
}
