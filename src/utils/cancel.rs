use crate::error::{Result, SearchError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Polled by long-running operations; returning true stops them at the
/// next checkpoint with [`SearchError::Cancelled`].
pub trait CancellationProbe {
    fn should_stop(&self) -> bool;

    /// `Err(Cancelled)` once the probe has fired
    fn checkpoint(&self) -> Result<()> {
        if self.should_stop() {
            Err(SearchError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl<F> CancellationProbe for F
where
    F: Fn() -> bool,
{
    fn should_stop(&self) -> bool {
        self()
    }
}

/// Probe that never fires
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancellationProbe for NeverCancel {
    fn should_stop(&self) -> bool {
        false
    }
}

/// Shared flag, cheap to clone into a worker thread
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl CancellationProbe for CancellationToken {
    fn should_stop(&self) -> bool {
        self.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_token_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(token.checkpoint().is_ok());
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.checkpoint(), Err(SearchError::Cancelled)));
    }

    #[test]
    fn test_closure_probe() {
        let calls = Cell::new(0);
        let probe = || {
            calls.set(calls.get() + 1);
            calls.get() > 2
        };
        assert!(!probe.should_stop());
        assert!(!probe.should_stop());
        assert!(probe.should_stop());
        assert!(!NeverCancel.should_stop());
    }
}
