use std::fmt::{Debug, Display};
use std::path::PathBuf;
use thiserror::Error;

use super::event::{Subsystem, Timestamp, TimestampedEvent};
use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("TimestampQueue for {subsystem} overflowed its capacity of {capacity} events")]
    Overflow {
        subsystem: Subsystem,
        capacity: usize,
    },
    #[error("TimestampQueue for {subsystem} received timestamp {timestamp} after already accepting {last}")]
    NonMonotonicInput {
        subsystem: Subsystem,
        timestamp: Timestamp,
        last: Timestamp,
    },
    #[error("TimestampQueue for {0} no longer accepts events after a previous failure")]
    Halted(Subsystem),
    #[error("TimestampQueue for {0} is closed")]
    Closed(Subsystem),
}

/// An event the queue refused, handed back to the producer with the reason.
#[derive(Debug)]
pub struct Rejected<P> {
    pub error: QueueError,
    pub event: TimestampedEvent<P>,
}

impl<P> Rejected<P> {
    pub fn new(error: QueueError, event: TimestampedEvent<P>) -> Self {
        Self { error, event }
    }
}

impl<P> Display for Rejected<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rejected event with timestamp {}: {}",
            self.event.timestamp(),
            self.error
        )
    }
}

impl<P: Debug> std::error::Error for Rejected<P> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[derive(Debug, Error)]
pub enum StreamFileError {
    #[error("Could not open StreamFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Reached end of StreamFile")]
    EndOfFile,
    #[error("StreamFile record is truncated; expected {0} more bytes")]
    TruncatedRecord(u64),
    #[error("StreamFile cannot store timestamp {0}; it does not fit the counter words")]
    TimestampRange(Timestamp),
    #[error("StreamFile cannot store a record with {0} bytes of data")]
    RecordTooLarge(usize),
    #[error("StreamFile failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StreamStackError {
    #[error("StreamStack failed with IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("StreamStack did not find any {0}*.tsq files in the run directory")]
    NoMatchingFiles(String),
    #[error("StreamStack failed due to StreamFile error: {0}")]
    FileError(#[from] StreamFileError),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("EventSink failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid queue capacity of {0}; must be at least 1")]
    BadCapacity(usize),
    #[error("Config has an invalid clock frequency of {0} MHz; must be greater than 0")]
    BadClock(f64),
    #[error("Config has an invalid number of workers {0}; must be at least 1")]
    BadThreads(i32),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to StreamStack error: {0}")]
    StackError(#[from] StreamStackError),
    #[error("Processor failed due to {0} event source error: {1}")]
    SourceError(Subsystem, Box<dyn std::error::Error + Send + Sync>),
    #[error("Processor failed due to queue error: {0}")]
    QueueError(#[from] QueueError),
    #[error("Processor failed due to EventSink error: {0}")]
    SinkError(#[from] SinkError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed because the {0} producer thread panicked")]
    ProducerPanic(Subsystem),
    #[error("Processor failed to write the diagnostics report: {0}")]
    ReportError(#[from] serde_yaml::Error),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
