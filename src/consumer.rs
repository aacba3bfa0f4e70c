//! Competing consumers drawing from one bounded channel.

use crate::cancel::CancellationToken;
use crate::channel::{BoundedChannel, Take};
use crate::events::{EventSink, PipelineEvent};
use std::io;
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::Duration;

pub type Transform = fn(u64) -> u64;

pub fn double(item: u64) -> u64 {
    item * 2
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    EndOfStream,
    Canceled,
}

/// Lifecycle of one consumer:
/// `Running -> Processing -> Running`, or `Running -> Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Processing(u64),
    Terminated(WorkerExit),
}

impl WorkerState {
    /// State entered from `Running` after a `take` returned.
    pub fn on_take(take: Take<u64>) -> Self {
        match take {
            Take::Item(item) => WorkerState::Processing(item),
            Take::EndOfStream => WorkerState::Terminated(WorkerExit::EndOfStream),
            Take::Canceled => WorkerState::Terminated(WorkerExit::Canceled),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Terminated(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub id: usize,
    pub exit: WorkerExit,
    pub processed: u64,
}

#[derive(Debug, Clone)]
pub struct Worker {
    id: usize,
    latency: Duration,
    transform: Transform,
}

impl Worker {
    pub fn new(id: usize, latency: Duration, transform: Transform) -> Self {
        Self {
            id,
            latency,
            transform,
        }
    }

    /// Runs until end-of-stream or cancellation. An item already taken is
    /// always processed in full, even if the token is canceled meanwhile.
    pub fn run(
        &self,
        channel: &BoundedChannel<u64>,
        token: &CancellationToken,
        sink: &dyn EventSink,
    ) -> WorkerReport {
        let mut processed = 0;
        let mut state = WorkerState::Running;

        loop {
            state = match state {
                WorkerState::Running => WorkerState::on_take(channel.take(token)),
                WorkerState::Processing(input) => {
                    let output = (self.transform)(input);
                    thread::sleep(self.latency);
                    processed += 1;
                    tracing::debug!(worker = self.id, input, output, "processed");
                    sink.emit(PipelineEvent::Processed {
                        worker: self.id,
                        input,
                        output,
                    });
                    WorkerState::Running
                }
                WorkerState::Terminated(exit) => {
                    if exit == WorkerExit::Canceled {
                        sink.emit(PipelineEvent::Canceled { worker: self.id });
                    }
                    tracing::debug!(worker = self.id, ?exit, processed, "worker terminated");
                    return WorkerReport {
                        id: self.id,
                        exit,
                        processed,
                    };
                }
            };
        }
    }
}

/// A fixed number of identical workers, numbered from 1.
#[derive(Debug, Clone)]
pub struct ConsumerPool {
    workers: Vec<Worker>,
}

impl ConsumerPool {
    pub fn new(size: usize, latency: Duration, transform: Transform) -> Self {
        Self {
            workers: (1..=size)
                .map(|id| Worker::new(id, latency, transform))
                .collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Starts every worker on its own named thread inside `scope`.
    pub fn spawn<'scope, 'env>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        channel: &'env BoundedChannel<u64>,
        token: &'env CancellationToken,
        sink: &'env dyn EventSink,
    ) -> io::Result<Vec<ScopedJoinHandle<'scope, WorkerReport>>> {
        self.workers
            .iter()
            .map(|worker| {
                thread::Builder::new()
                    .name(format!("consumer-{}", worker.id))
                    .spawn_scoped(scope, move || worker.run(channel, token, sink))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingSink;

    #[test]
    fn test_state_transitions() {
        assert_eq!(
            WorkerState::on_take(Take::Item(4)),
            WorkerState::Processing(4)
        );
        assert_eq!(
            WorkerState::on_take(Take::EndOfStream),
            WorkerState::Terminated(WorkerExit::EndOfStream)
        );
        assert_eq!(
            WorkerState::on_take(Take::Canceled),
            WorkerState::Terminated(WorkerExit::Canceled)
        );
        assert!(!WorkerState::Running.is_terminal());
        assert!(!WorkerState::Processing(1).is_terminal());
        assert!(WorkerState::Terminated(WorkerExit::Canceled).is_terminal());
    }

    #[test]
    fn test_worker_drains_then_stops() {
        let channel = BoundedChannel::new(4);
        let token = CancellationToken::new();
        for i in 1..=3 {
            channel.put(i, &token).unwrap();
        }
        channel.complete();

        let sink = CollectingSink::new();
        let report = Worker::new(7, Duration::ZERO, double).run(&channel, &token, &sink);

        assert_eq!(
            report,
            WorkerReport {
                id: 7,
                exit: WorkerExit::EndOfStream,
                processed: 3
            }
        );
        assert_eq!(sink.processed(), vec![(1, 2), (2, 4), (3, 6)]);
    }

    #[test]
    fn test_worker_reports_cancel() {
        let channel: BoundedChannel<u64> = BoundedChannel::new(4);
        let token = CancellationToken::new();
        token.cancel();

        let sink = CollectingSink::new();
        let report = Worker::new(1, Duration::ZERO, double).run(&channel, &token, &sink);

        assert_eq!(report.exit, WorkerExit::Canceled);
        assert_eq!(report.processed, 0);
        assert_eq!(sink.events(), vec![PipelineEvent::Canceled { worker: 1 }]);
    }

    #[test]
    fn test_in_flight_item_finishes_after_cancel() {
        let channel = BoundedChannel::new(4);
        let token = CancellationToken::new();
        channel.put(1, &token).unwrap();
        channel.put(2, &token).unwrap();
        let sink = CollectingSink::new();
        let worker = Worker::new(1, Duration::from_millis(100), double);

        let report = thread::scope(|s| {
            let handle = s.spawn(|| worker.run(&channel, &token, &sink));
            // Cancel while item 1 is mid-latency.
            thread::sleep(Duration::from_millis(30));
            token.cancel();
            handle.join().unwrap()
        });

        assert_eq!(report.exit, WorkerExit::Canceled);
        assert_eq!(report.processed, 1);
        assert_eq!(sink.processed(), vec![(1, 2)]);
        assert_eq!(channel.len(), 1);
    }

    #[test]
    fn test_pool_numbers_workers_from_one() {
        let channel: BoundedChannel<u64> = BoundedChannel::new(4);
        let token = CancellationToken::new();
        channel.complete();
        let sink = CollectingSink::new();
        let pool = ConsumerPool::new(3, Duration::ZERO, double);
        assert_eq!(pool.size(), 3);

        let mut ids: Vec<usize> = thread::scope(|s| {
            pool.spawn(s, &channel, &token, &sink)
                .unwrap()
                .into_iter()
                .map(|handle| handle.join().unwrap().id)
                .collect()
        });
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_custom_transform() {
        let channel = BoundedChannel::new(1);
        let token = CancellationToken::new();
        channel.put(5, &token).unwrap();
        channel.complete();
        let sink = CollectingSink::new();

        Worker::new(1, Duration::ZERO, |x| x + 100).run(&channel, &token, &sink);
        assert_eq!(sink.processed(), vec![(5, 105)]);
    }
}
