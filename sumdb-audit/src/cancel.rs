//! Run-scoped cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::AuditError;

/// A cloneable cancellation flag shared by every stage of an audit run.
///
/// Stages check the token before I/O and on channel operations, so
/// cancelling returns promptly and leaves the store in a self-consistent
/// prefix state (all persisted writes are whole tiles or whole leaf blocks).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with [`AuditError::Cancelled`] if cancellation was requested.
    pub(crate) fn check(&self) -> Result<(), AuditError> {
        if self.is_cancelled() {
            return Err(AuditError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(clone.check(), Err(AuditError::Cancelled)));
    }
}
