//! Cooperative cancellation shared by the workers of one session

use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot stop flag. Once cancelled it stays cancelled; a new session
/// gets a fresh token.
#[derive(Debug, Default)]
pub struct CancellationToken {
    stop_requested: AtomicBool,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that every worker holding this token stops
    pub fn cancel(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_cancel_is_monotonic() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());

        token.cancel();
        assert!(token.is_cancelled());

        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_visible_across_threads() {
        let token = CancellationToken::new();

        thread::scope(|s| {
            s.spawn(|| token.cancel());
        });

        assert!(token.is_cancelled());
    }
}
