//! Orchestrates one producer–consumer run.
//!
//! The run owns one channel and one cancellation token. The trigger runs on
//! its own thread and may set the token at any time; a second internal token
//! releases the trigger once every consumer has terminated.

use crate::cancel::CancellationToken;
use crate::channel::BoundedChannel;
use crate::config::PipelineConfig;
use crate::consumer::{double, ConsumerPool, WorkerExit, WorkerReport};
use crate::error::DemoError;
use crate::events::{EventSink, PipelineEvent};
use crate::producer::{Producer, ProducerOutcome};
use crate::trigger::CancelTrigger;
use std::thread::{self, Scope};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub produced: u64,
    pub workers: Vec<WorkerReport>,
    pub canceled: bool,
    pub elapsed: Duration,
    /// Most items the channel ever held at once.
    pub peak_buffered: usize,
    /// Longest the producer waited on a full channel for one item.
    pub longest_put: Duration,
}

impl PipelineReport {
    pub fn processed(&self) -> u64 {
        self.workers.iter().map(|worker| worker.processed).sum()
    }

    pub fn canceled_workers(&self) -> usize {
        self.workers
            .iter()
            .filter(|worker| worker.exit == WorkerExit::Canceled)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Runs the pipeline to completion or cancellation and returns once every
    /// consumer has terminated.
    pub fn run<T>(
        &self,
        trigger: &mut T,
        sink: &dyn EventSink,
    ) -> Result<PipelineReport, DemoError>
    where
        T: CancelTrigger + ?Sized,
    {
        let run = Run {
            channel: BoundedChannel::new(self.config.capacity),
            token: CancellationToken::new(),
            stop: CancellationToken::new(),
            producer: Producer::new(self.config.items, self.config.produce_delay()),
            pool: ConsumerPool::new(
                self.config.consumers,
                self.config.consume_latency(),
                double,
            ),
            sink,
        };

        tracing::info!(
            items = self.config.items,
            capacity = self.config.capacity,
            consumers = self.config.consumers,
            "starting pipeline"
        );
        let started = Instant::now();

        let (producer, workers) = thread::scope(|s| {
            let outcome = run.drive(s, trigger);
            if outcome.is_err() {
                run.abort();
            }
            outcome
        })?;

        let report = PipelineReport {
            produced: producer.produced,
            workers,
            canceled: run.token.is_cancelled(),
            elapsed: started.elapsed(),
            peak_buffered: run.channel.peak_len(),
            longest_put: producer.longest_put,
        };
        tracing::info!(
            produced = report.produced,
            processed = report.processed(),
            canceled = report.canceled,
            peak_buffered = report.peak_buffered,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "pipeline finished"
        );
        Ok(report)
    }
}

/// Everything one run shares between its threads.
struct Run<'a> {
    channel: BoundedChannel<u64>,
    token: CancellationToken,
    stop: CancellationToken,
    producer: Producer,
    pool: ConsumerPool,
    sink: &'a dyn EventSink,
}

impl Run<'_> {
    fn drive<'scope, 'env, T>(
        &'env self,
        s: &'scope Scope<'scope, 'env>,
        trigger: &'env mut T,
    ) -> Result<(ProducerOutcome, Vec<WorkerReport>), DemoError>
    where
        T: CancelTrigger + ?Sized,
    {
        let token = &self.token;
        let stop = &self.stop;
        let channel = &self.channel;
        let sink = self.sink;

        let trigger_thread = thread::Builder::new()
            .name("cancel-trigger".into())
            .spawn_scoped(s, move || match trigger.wait(stop) {
                Ok(true) => {
                    if token.cancel() {
                        tracing::info!("cancellation requested");
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(%err, "cancel trigger failed, pipeline runs to completion")
                }
            })
            .map_err(|source| DemoError::spawn("cancel-trigger", source))?;
        let producer_thread = thread::Builder::new()
            .name("producer".into())
            .spawn_scoped(s, move || self.producer.run(channel, token, sink))
            .map_err(|source| DemoError::spawn("producer", source))?;
        let consumers = self
            .pool
            .spawn(s, channel, token, sink)
            .map_err(|source| DemoError::spawn("consumer", source))?;

        let mut workers = Vec::with_capacity(consumers.len());
        let mut panicked = None;
        for handle in consumers {
            match handle.join() {
                Ok(report) => workers.push(report),
                Err(_) => {
                    // Release the producer in case it waits on a full buffer
                    // nobody drains any more.
                    token.cancel();
                    panicked.get_or_insert_with(|| DemoError::panicked("consumer"));
                }
            }
        }
        sink.emit(PipelineEvent::Completed);

        stop.cancel();
        let produced = producer_thread
            .join()
            .map_err(|_| DemoError::panicked("producer"));
        trigger_thread
            .join()
            .map_err(|_| DemoError::panicked("cancel-trigger"))?;

        if let Some(err) = panicked {
            return Err(err);
        }
        Ok((produced?, workers))
    }

    /// Unblocks whatever did start so the scope can join it.
    fn abort(&self) {
        self.token.cancel();
        self.stop.cancel();
        self.channel.complete();
    }
}
