//! Bounded FIFO channel with blocking put/take, completion and cancellation.
//!
//! One mutex guards the buffer and the `completed` flag. Two condition
//! variables carry the wait conditions:
//!
//! - `not_full`: a putter may proceed (space freed, completed, or canceled)
//! - `not_empty`: a taker may proceed (item arrived, completed, or canceled)
//!
//! Cancellation comes from a `CancellationToken` passed into each blocking
//! call. The first time the channel sees a token it registers a listener that
//! wakes every waiter, so a canceled token never leaves a thread parked.

use crate::cancel::CancellationToken;
use crate::error::PutError;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Outcome of `BoundedChannel::take`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Take<T> {
    Item(T),
    /// Buffer drained and no more items will be put.
    EndOfStream,
    /// The caller's token was canceled.
    Canceled,
}

struct State<T> {
    buffer: VecDeque<T>,
    completed: bool,
    peak: usize,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
    watched: Mutex<HashSet<u64>>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // Nothing panics while holding the lock, and the buffer stays valid
        // even if a holder did, so poisoning is ignored.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wake_all(&self) {
        // Taking the lock orders this wake-up after any waiter that already
        // checked the token and is about to park.
        drop(self.lock());
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}

pub struct BoundedChannel<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BoundedChannel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> BoundedChannel<T> {
    /// Creates a channel holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "channel capacity must be at least 1");
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    buffer: VecDeque::with_capacity(capacity),
                    completed: false,
                    peak: 0,
                }),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
                capacity,
                watched: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn len(&self) -> usize {
        self.shared.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_completed(&self) -> bool {
        self.shared.lock().completed
    }

    /// Largest number of items ever buffered at once.
    pub fn peak_len(&self) -> usize {
        self.shared.lock().peak
    }

    /// Marks the channel as complete and wakes every waiter.
    ///
    /// Returns `false` if it was already complete.
    pub fn complete(&self) -> bool {
        let first = {
            let mut state = self.shared.lock();
            !std::mem::replace(&mut state.completed, true)
        };
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
        first
    }
}

impl<T: Send + 'static> BoundedChannel<T> {
    /// Appends `item`, blocking while the buffer is full.
    ///
    /// The item is handed back if `token` is canceled before it could be
    /// inserted, or if the channel was completed.
    pub fn put(&self, item: T, token: &CancellationToken) -> Result<(), PutError<T>> {
        self.watch(token);
        let mut state = self.shared.lock();
        loop {
            if token.is_cancelled() {
                return Err(PutError::Canceled(item));
            }
            if state.completed {
                return Err(PutError::Completed(item));
            }
            if state.buffer.len() < self.shared.capacity {
                state.buffer.push_back(item);
                state.peak = state.peak.max(state.buffer.len());
                drop(state);
                self.shared.not_empty.notify_one();
                return Ok(());
            }
            state = self
                .shared
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Removes the head item, blocking while the buffer is empty and the
    /// channel is not complete.
    ///
    /// A canceled token wins over buffered items: once the token is set no
    /// further items are handed out.
    pub fn take(&self, token: &CancellationToken) -> Take<T> {
        self.watch(token);
        let mut state = self.shared.lock();
        loop {
            if token.is_cancelled() {
                return Take::Canceled;
            }
            if let Some(item) = state.buffer.pop_front() {
                drop(state);
                self.shared.not_full.notify_one();
                return Take::Item(item);
            }
            if state.completed {
                return Take::EndOfStream;
            }
            state = self
                .shared
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn watch(&self, token: &CancellationToken) {
        let first_sighting = self
            .shared
            .watched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.id());
        if first_sighting {
            let shared = Arc::downgrade(&self.shared);
            token.add_listener(move || {
                if let Some(shared) = shared.upgrade() {
                    shared.wake_all();
                }
            });
        }
    }
}
