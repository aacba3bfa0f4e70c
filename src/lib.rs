//! Console demonstrations of two multithreading topics:
//!
//! - a shared-counter race comparing unsynchronized, mutex-guarded and atomic
//!   increments (`race`)
//! - a bounded producer–consumer pipeline with competing consumers and
//!   cooperative cancellation (`channel`, `producer`, `consumer`, `pipeline`)
//!
//! Both are reachable from the text menu in `menu`.

pub mod cancel;
pub mod channel;
pub mod config;
pub mod consumer;
pub mod error;
pub mod events;
pub mod logging;
pub mod menu;
pub mod pipeline;
pub mod producer;
pub mod race;
pub mod trigger;

pub use cancel::{CancelListener, CancellationToken};
pub use channel::{BoundedChannel, Take};
pub use config::{DemoConfig, PipelineConfig, RaceDefaults};
pub use consumer::{ConsumerPool, Worker, WorkerExit, WorkerReport, WorkerState};
pub use error::{ConfigError, DemoError, InputError, PutError};
pub use events::{CollectingSink, ConsoleSink, EventSink, PipelineEvent};
pub use menu::{Menu, MenuChoice};
pub use pipeline::{Pipeline, PipelineReport};
pub use producer::{Producer, ProducerOutcome};
pub use race::{increment, RaceSettings, RunResult, SharedCounter, Strategy};
pub use trigger::{CancelTrigger, DelayTrigger, KeyPressTrigger, ManualTrigger, NeverTrigger};
