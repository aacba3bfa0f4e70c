//! Observable pipeline events and the sinks that receive them.

use colored::Colorize;
use std::fmt;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Produced(u64),
    Processed { worker: usize, input: u64, output: u64 },
    Canceled { worker: usize },
    /// Every consumer has terminated.
    Completed,
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::Produced(n) => write!(f, "Produced: {n}"),
            PipelineEvent::Processed {
                worker,
                input,
                output,
            } => write!(f, "Consumer {worker} processed: {input} -> {output}"),
            PipelineEvent::Canceled { worker } => write!(f, "Consumer {worker} canceled"),
            PipelineEvent::Completed => write!(f, "All tasks completed."),
        }
    }
}

/// Receives events from the producer, the consumers and the orchestrator.
/// Called concurrently from several threads.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Writes one line per event.
pub struct ConsoleSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> EventSink for ConsoleSink<W> {
    fn emit(&self, event: PipelineEvent) {
        let line = match &event {
            PipelineEvent::Canceled { .. } => event.to_string().yellow().to_string(),
            PipelineEvent::Completed => event.to_string().green().bold().to_string(),
            _ => event.to_string(),
        };
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            tracing::warn!(%err, "failed to write pipeline event");
        }
    }
}

/// Keeps every event in arrival order.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Inputs and outputs of every `Processed` event.
    pub fn processed(&self) -> Vec<(u64, u64)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PipelineEvent::Processed { input, output, .. } => Some((input, output)),
                _ => None,
            })
            .collect()
    }

    pub fn produced(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PipelineEvent::Produced(n) => Some(n),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: PipelineEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
