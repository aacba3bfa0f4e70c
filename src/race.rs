//! Shared-counter race benchmark.
//!
//! T threads each bump one counter I times. The same explicit `SharedCounter`
//! is reused for every strategy and reset before each run:
//!
//! - `Unsafe`: separate load and store, so concurrent increments overwrite
//!   each other (lost updates). Both halves are atomic, so the race is a
//!   logic race rather than undefined behaviour.
//! - `Locked`: `Mutex<u64>`, correct but contended.
//! - `Atomic`: `fetch_add`, correct and lock-free.

use crate::error::DemoError;
use crossbeam::channel::{self, Sender};
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ScopedJoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Unsafe,
    Locked,
    Atomic,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Unsafe, Strategy::Locked, Strategy::Atomic];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Unsafe => "UnsafeIncrement",
            Strategy::Locked => "LockedIncrement",
            Strategy::Atomic => "AtomicIncrement",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Default)]
pub struct SharedCounter {
    racy: AtomicU64,
    locked: Mutex<u64>,
    atomic: AtomicU64,
}

impl SharedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.racy.store(0, Ordering::SeqCst);
        *self.locked.lock().unwrap_or_else(PoisonError::into_inner) = 0;
        self.atomic.store(0, Ordering::SeqCst);
    }

    /// Current value of the counter `strategy` increments.
    pub fn value(&self, strategy: Strategy) -> u64 {
        match strategy {
            Strategy::Unsafe => self.racy.load(Ordering::SeqCst),
            Strategy::Locked => *self.locked.lock().unwrap_or_else(PoisonError::into_inner),
            Strategy::Atomic => self.atomic.load(Ordering::SeqCst),
        }
    }
}

/// Adds one to the counter selected by `strategy` and returns the value this
/// increment wrote.
pub fn increment(counter: &SharedCounter, strategy: Strategy) -> u64 {
    match strategy {
        Strategy::Unsafe => {
            let next = counter.racy.load(Ordering::Relaxed) + 1;
            counter.racy.store(next, Ordering::Relaxed);
            next
        }
        Strategy::Locked => {
            let mut value = counter
                .locked
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *value += 1;
            *value
        }
        Strategy::Atomic => counter.atomic.fetch_add(1, Ordering::Relaxed) + 1,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceSettings {
    pub threads: usize,
    pub increments: u64,
    pub show_steps: bool,
}

impl RaceSettings {
    pub fn expected(&self) -> u64 {
        self.threads as u64 * self.increments
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    pub strategy: Strategy,
    pub elapsed: Duration,
    pub value: u64,
}

impl RunResult {
    /// Increments that were overwritten by a concurrent one.
    pub fn lost_updates(&self, settings: &RaceSettings) -> u64 {
        settings.expected().saturating_sub(self.value)
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: elapsed={}ms, counter={}",
            self.strategy,
            self.elapsed.as_millis(),
            self.value
        )
    }
}

/// Spawns `threads` threads with `spawn`, then drops `open` to release them
/// all at once. If a spawn fails, `aborted` is set before the release so the
/// threads already started exit without doing any work.
fn spawn_all<'scope, S>(
    threads: usize,
    open: Sender<()>,
    aborted: &AtomicBool,
    mut spawn: S,
) -> io::Result<Vec<ScopedJoinHandle<'scope, ()>>>
where
    S: FnMut(usize) -> io::Result<ScopedJoinHandle<'scope, ()>>,
{
    let mut handles = Vec::with_capacity(threads);
    for index in 0..threads {
        match spawn(index) {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                aborted.store(true, Ordering::SeqCst);
                drop(open);
                return Err(err);
            }
        }
    }
    drop(open);
    Ok(handles)
}

/// Runs one strategy. With `show_steps`, `on_step` sees every written value;
/// it is called concurrently from the incrementing threads.
///
/// Fails with `DemoError::Spawn` if the OS refuses a thread; the threads that
/// did start are released and joined first.
pub fn run_benchmark<F>(
    counter: &SharedCounter,
    strategy: Strategy,
    settings: &RaceSettings,
    on_step: &F,
) -> Result<RunResult, DemoError>
where
    F: Fn(Strategy, u64) + Sync,
{
    counter.reset();
    // Threads park on the start line until every one of them exists, so the
    // increments actually overlap.
    let (open, start_line) = channel::bounded::<()>(0);
    let aborted = AtomicBool::new(false);
    let started = Instant::now();

    thread::scope(|s| {
        let handles = spawn_all(settings.threads, open, &aborted, |index| {
            let start_line = start_line.clone();
            let aborted = &aborted;
            thread::Builder::new()
                .name(format!("{strategy}-{index}"))
                .spawn_scoped(s, move || {
                    // Disconnects once `open` is dropped.
                    let _ = start_line.recv();
                    if aborted.load(Ordering::SeqCst) {
                        return;
                    }
                    for _ in 0..settings.increments {
                        let value = increment(counter, strategy);
                        if settings.show_steps {
                            on_step(strategy, value);
                        }
                    }
                })
        })
        .map_err(|source| DemoError::spawn(strategy.name(), source))?;

        handles.into_iter().try_for_each(|handle| {
            handle
                .join()
                .map_err(|_| DemoError::panicked(strategy.name()))
        })
    })?;

    let result = RunResult {
        strategy,
        elapsed: started.elapsed(),
        value: counter.value(strategy),
    };
    tracing::debug!(
        %strategy,
        value = result.value,
        lost = result.lost_updates(settings),
        "benchmark finished"
    );
    Ok(result)
}

/// Runs every strategy in turn on a fresh counter.
pub fn run_all<F>(settings: &RaceSettings, on_step: &F) -> Result<Vec<RunResult>, DemoError>
where
    F: Fn(Strategy, u64) + Sync,
{
    let counter = SharedCounter::new();
    Strategy::ALL
        .iter()
        .map(|&strategy| run_benchmark(&counter, strategy, settings, on_step))
        .collect()
}
