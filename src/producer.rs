//! The single producer feeding the pipeline.

use crate::cancel::CancellationToken;
use crate::channel::BoundedChannel;
use crate::error::PutError;
use crate::events::{EventSink, PipelineEvent};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerOutcome {
    pub produced: u64,
    pub canceled: bool,
    /// Longest time a single `put` spent waiting for space.
    pub longest_put: Duration,
}

/// Completes the channel when dropped, so consumers are released even if the
/// producer unwinds.
struct CompleteOnDrop<'a, T>(&'a BoundedChannel<T>);

impl<T> Drop for CompleteOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.complete();
    }
}

#[derive(Debug, Clone)]
pub struct Producer {
    count: u64,
    delay: Duration,
}

impl Producer {
    /// Produces `1..=count`, sleeping `delay` after each item.
    pub fn new(count: u64, delay: Duration) -> Self {
        Self { count, delay }
    }

    pub fn run(
        &self,
        channel: &BoundedChannel<u64>,
        token: &CancellationToken,
        sink: &dyn EventSink,
    ) -> ProducerOutcome {
        let _complete = CompleteOnDrop(channel);
        let mut produced = 0;
        let mut longest_put = Duration::ZERO;

        for item in 1..=self.count {
            if token.is_cancelled() {
                tracing::info!(produced, "producer stopping early");
                return ProducerOutcome {
                    produced,
                    canceled: true,
                    longest_put,
                };
            }

            let waiting = Instant::now();
            let put = channel.put(item, token);
            longest_put = longest_put.max(waiting.elapsed());
            match put {
                Ok(()) => {}
                Err(PutError::Canceled(_)) => {
                    tracing::info!(produced, "producer canceled while waiting for space");
                    return ProducerOutcome {
                        produced,
                        canceled: true,
                        longest_put,
                    };
                }
                Err(PutError::Completed(_)) => {
                    tracing::warn!(produced, "channel completed under the producer");
                    break;
                }
            }

            produced += 1;
            tracing::debug!(item, "produced");
            sink.emit(PipelineEvent::Produced(item));
            thread::sleep(self.delay);
        }

        ProducerOutcome {
            produced,
            canceled: false,
            longest_put,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Take;
    use crate::events::CollectingSink;

    #[test]
    fn test_produces_in_order_and_completes() {
        let channel = BoundedChannel::new(10);
        let token = CancellationToken::new();
        let sink = CollectingSink::new();

        let outcome = Producer::new(5, Duration::ZERO).run(&channel, &token, &sink);

        assert_eq!(outcome.produced, 5);
        assert!(!outcome.canceled);
        assert_eq!(sink.produced(), vec![1, 2, 3, 4, 5]);
        assert!(channel.is_completed());
        for i in 1..=5 {
            assert_eq!(channel.take(&token), Take::Item(i));
        }
        assert_eq!(channel.take(&token), Take::EndOfStream);
    }

    #[test]
    fn test_pre_canceled_token_produces_nothing() {
        let channel = BoundedChannel::new(10);
        let token = CancellationToken::new();
        token.cancel();
        let sink = CollectingSink::new();

        let outcome = Producer::new(5, Duration::ZERO).run(&channel, &token, &sink);

        assert_eq!(outcome.produced, 0);
        assert!(outcome.canceled);
        assert!(channel.is_completed());
        assert!(channel.is_empty());
    }

    #[test]
    fn test_cancel_while_blocked_on_full_channel() {
        let channel = BoundedChannel::new(2);
        let token = CancellationToken::new();
        let sink = CollectingSink::new();

        let outcome = thread::scope(|s| {
            let handle = s.spawn(|| Producer::new(10, Duration::ZERO).run(&channel, &token, &sink));
            thread::sleep(Duration::from_millis(50));
            token.cancel();
            handle.join().unwrap()
        });

        assert_eq!(outcome.produced, 2);
        assert!(outcome.canceled);
        // The third put waited until the cancel.
        assert!(outcome.longest_put >= Duration::from_millis(40));
        assert!(channel.is_completed());
        assert_eq!(channel.len(), 2);
    }

    #[test]
    fn test_zero_items_still_completes() {
        let channel = BoundedChannel::new(1);
        let token = CancellationToken::new();
        let sink = CollectingSink::new();

        let outcome = Producer::new(0, Duration::ZERO).run(&channel, &token, &sink);
        assert_eq!(outcome.produced, 0);
        assert!(!outcome.canceled);
        assert_eq!(channel.take(&token), Take::EndOfStream);
    }
}
