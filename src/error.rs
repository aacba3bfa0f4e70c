//! Error types shared by the demos.
//!
//! Cancellation is deliberately absent from `DemoError`: a canceled pipeline is
//! a normal outcome and is reported through `Take::Canceled` and
//! `PutError::Canceled` instead.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemoError {
    #[error("console I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("terminal input failed: {0}")]
    Terminal(String),

    #[error("{role} thread panicked")]
    WorkerPanicked { role: String },

    #[error("could not start {role} thread: {source}")]
    Spawn {
        role: String,
        #[source]
        source: io::Error,
    },
}

impl DemoError {
    pub fn panicked(role: impl Into<String>) -> Self {
        Self::WorkerPanicked { role: role.into() }
    }

    pub fn spawn(role: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            role: role.into(),
            source,
        }
    }

    /// The demo gave up but the session can go on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DemoError::Spawn { .. })
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Why a prompt answer could not be used. Always recovered with a fallback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("empty input")]
    Empty,
    #[error("'{0}' is not a positive whole number")]
    NotANumber(String),
    #[error("{value} is more than the limit of {max}")]
    TooLarge { value: u64, max: u64 },
}

/// Returned by `BoundedChannel::put`; hands the rejected item back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PutError<T> {
    #[error("put canceled before the item was accepted")]
    Canceled(T),
    #[error("channel already completed")]
    Completed(T),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            InputError::NotANumber("abc".into()).to_string(),
            "'abc' is not a positive whole number"
        );
        assert_eq!(
            DemoError::panicked("consumer-2").to_string(),
            "consumer-2 thread panicked"
        );
        let err = ConfigError::invalid("capacity", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid value for 'capacity': must be at least 1"
        );
    }

    #[test]
    fn test_only_spawn_failure_is_recoverable() {
        let err = DemoError::spawn(
            "AtomicIncrement",
            io::Error::new(io::ErrorKind::WouldBlock, "Resource temporarily unavailable"),
        );
        assert!(err.is_recoverable());
        assert!(err.to_string().starts_with("could not start AtomicIncrement thread"));
        assert!(!DemoError::panicked("producer").is_recoverable());
    }

    #[test]
    fn test_io_conversion() {
        let err: DemoError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, DemoError::Io(_)));
    }
}
