use crate::core::{XpmError, XpmResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared interrupt flag.
///
/// Set from a signal handler; long-running loops call [`CancelFlag::check`]
/// at points where stopping leaves persisted state consistent.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the flag is set
    pub fn check(&self) -> XpmResult<()> {
        if self.is_cancelled() {
            Err(XpmError::Cancelled)
        } else {
            Ok(())
        }
    }
}
