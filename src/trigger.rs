//! External stimuli that cancel a running pipeline.
//!
//! The orchestrator runs a trigger on its own thread. A trigger blocks until it
//! either fires (the pipeline gets canceled) or the orchestrator's `stop` token
//! is set because the pipeline already finished.

use crate::cancel::CancellationToken;
use crate::error::DemoError;
use crossbeam::channel::{self, Receiver, Sender};
use crossterm::event::{self, Event, KeyEventKind};
use std::time::Duration;

pub trait CancelTrigger: Send {
    /// Blocks until the trigger fires (`Ok(true)`) or `stop` is canceled
    /// (`Ok(false)`).
    fn wait(&mut self, stop: &CancellationToken) -> Result<bool, DemoError>;

    /// Line shown to the user before the pipeline starts.
    fn prompt(&self) -> Option<&'static str> {
        None
    }
}

/// Receiver that becomes ready once `stop` is canceled.
fn stopped(stop: &CancellationToken) -> Receiver<()> {
    let (tx, rx) = channel::bounded(1);
    stop.add_listener(move || {
        let _ = tx.try_send(());
    });
    rx
}

/// Fires on the first key press in the controlling terminal.
#[derive(Debug, Clone)]
pub struct KeyPressTrigger {
    poll_interval: Duration,
}

impl KeyPressTrigger {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

impl Default for KeyPressTrigger {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

impl CancelTrigger for KeyPressTrigger {
    fn wait(&mut self, stop: &CancellationToken) -> Result<bool, DemoError> {
        let terminal = |err: std::io::Error| DemoError::Terminal(err.to_string());
        while !stop.is_cancelled() {
            if !event::poll(self.poll_interval).map_err(terminal)? {
                continue;
            }
            if let Event::Key(key) = event::read().map_err(terminal)? {
                if key.kind == KeyEventKind::Press {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn prompt(&self) -> Option<&'static str> {
        Some("Press any key to stop...")
    }
}

/// Never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverTrigger;

impl CancelTrigger for NeverTrigger {
    fn wait(&mut self, stop: &CancellationToken) -> Result<bool, DemoError> {
        let _ = stopped(stop).recv();
        Ok(false)
    }
}

/// Fires once `delay` has elapsed.
#[derive(Debug, Clone, Copy)]
pub struct DelayTrigger {
    delay: Duration,
}

impl DelayTrigger {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl CancelTrigger for DelayTrigger {
    fn wait(&mut self, stop: &CancellationToken) -> Result<bool, DemoError> {
        let stopped = stopped(stop);
        let deadline = channel::after(self.delay);
        crossbeam::select! {
            recv(stopped) -> _ => Ok(false),
            recv(deadline) -> _ => Ok(true),
        }
    }
}

/// Fires when its `TriggerHandle` is pulled. Dropping the handle without
/// pulling it means the trigger never fires.
#[derive(Debug)]
pub struct ManualTrigger {
    fired: Receiver<()>,
}

#[derive(Debug, Clone)]
pub struct TriggerHandle {
    fire: Sender<()>,
}

impl TriggerHandle {
    pub fn pull(&self) {
        let _ = self.fire.try_send(());
    }
}

impl ManualTrigger {
    pub fn pair() -> (TriggerHandle, ManualTrigger) {
        let (fire, fired) = channel::bounded(1);
        (TriggerHandle { fire }, ManualTrigger { fired })
    }
}

impl CancelTrigger for ManualTrigger {
    fn wait(&mut self, stop: &CancellationToken) -> Result<bool, DemoError> {
        let stopped = stopped(stop);
        crossbeam::select! {
            recv(stopped) -> _ => Ok(false),
            recv(self.fired) -> msg => match msg {
                Ok(()) => Ok(true),
                // Handle dropped unpulled.
                Err(_) => {
                    let _ = stopped.recv();
                    Ok(false)
                }
            },
        }
    }
}
