//! Cooperative cancellation.
//!
//! A `CancellationToken` is a cheap, cloneable handle to one shared flag. The
//! flag only ever goes from unset to set. Code that blocks (the bounded channel)
//! registers a listener so it can be woken when the flag flips; everything else
//! simply polls `is_cancelled` at its checkpoints.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Notified once when a token is canceled.
pub trait CancelListener: Send + Sync {
    fn on_cancel(&self);
}

impl<F> CancelListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_cancel(&self) {
        self()
    }
}

struct TokenState {
    id: u64,
    cancelled: AtomicBool,
    listeners: Mutex<Vec<Box<dyn CancelListener>>>,
}

#[derive(Clone)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            state: Arc::new(TokenState {
                id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
                cancelled: AtomicBool::new(false),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Identifies the shared flag; clones report the same id.
    pub fn id(&self) -> u64 {
        self.state.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Sets the flag and notifies listeners.
    ///
    /// Returns `true` only for the call that actually flipped the flag; later
    /// calls are no-ops.
    pub fn cancel(&self) -> bool {
        if self
            .state
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let listeners = {
            let mut guard = self
                .state
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        for listener in listeners {
            listener.on_cancel();
        }
        true
    }

    /// Registers `listener`. If the token is already canceled the listener runs
    /// immediately on the calling thread.
    pub fn add_listener(&self, listener: impl CancelListener + 'static) {
        // The flag is set before listeners are drained, so checking it while
        // holding the lock cannot miss a concurrent cancel.
        let mut listeners = self
            .state
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_cancelled() {
            drop(listeners);
            listener.on_cancel();
        } else {
            listeners.push(Box::new(listener));
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("id", &self.state.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_is_monotonic_and_idempotent() {
        let token = CancellationToken::new();
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clones_share_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert_eq!(token.id(), clone.id());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_distinct_tokens_have_distinct_ids() {
        assert_ne!(CancellationToken::new().id(), CancellationToken::new().id());
    }

    #[test]
    fn test_listener_runs_exactly_once() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        token.add_listener(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        token.cancel();
        token.cancel();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_late_listener_runs_immediately() {
        let token = CancellationToken::new();
        token.cancel();

        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        token.add_listener(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_cancel_has_single_winner() {
        let token = CancellationToken::new();
        let winners = Arc::new(AtomicUsize::new(0));

        thread::scope(|s| {
            for _ in 0..8 {
                let token = token.clone();
                let winners = Arc::clone(&winners);
                s.spawn(move || {
                    if token.cancel() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
