use serde::Serialize;
use std::fmt::Display;

use super::clock::ticks_to_micros;

/// Hardware clock value, in ticks of the subsystem timestamp clock
pub type Timestamp = u64;

/// The two acquisition chains being correlated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Subsystem {
    Head,
    Tail,
}

impl Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Head => write!(f, "head"),
            Self::Tail => write!(f, "tail"),
        }
    }
}

/// A decoded event from one subsystem together with its trigger timestamp.
///
/// The payload is opaque to the matcher; it only ever looks at the timestamp,
/// which cannot be changed once the event is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedEvent<P> {
    timestamp: Timestamp,
    payload: P,
}

impl<P> TimestampedEvent<P> {
    pub fn new(timestamp: Timestamp, payload: P) -> Self {
        Self { timestamp, payload }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Give up the event and keep the payload
    pub fn into_payload(self) -> P {
        self.payload
    }
}

/// Why an event was emitted without a partner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SingleReason {
    /// No pending or future event of the other subsystem can fall within the window
    WindowTimeout,
    /// Flushed while draining at shutdown
    ShutdownFlush,
}

impl Display for SingleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WindowTimeout => write!(f, "window-timeout"),
            Self::ShutdownFlush => write!(f, "shutdown-flush"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoincidenceKind {
    Matched,
    SingleHead,
    SingleTail,
}

/// The result of resolving one or two queued events.
///
/// Every event handed to the matcher comes back out inside exactly one
/// CoincidenceEvent.
#[derive(Debug, Clone, PartialEq)]
pub enum CoincidenceEvent<H, T> {
    Matched {
        head: TimestampedEvent<H>,
        tail: TimestampedEvent<T>,
        /// tail - head, in clock ticks
        delta_t: i64,
    },
    SingleHead {
        event: TimestampedEvent<H>,
        reason: SingleReason,
    },
    SingleTail {
        event: TimestampedEvent<T>,
        reason: SingleReason,
    },
}

impl<H, T> CoincidenceEvent<H, T> {
    /// Pair a head and tail event
    pub fn matched(head: TimestampedEvent<H>, tail: TimestampedEvent<T>) -> Self {
        let delta_t = tail.timestamp().wrapping_sub(head.timestamp()) as i64;
        Self::Matched {
            head,
            tail,
            delta_t,
        }
    }

    pub fn kind(&self) -> CoincidenceKind {
        match self {
            Self::Matched { .. } => CoincidenceKind::Matched,
            Self::SingleHead { .. } => CoincidenceKind::SingleHead,
            Self::SingleTail { .. } => CoincidenceKind::SingleTail,
        }
    }

    pub fn head_timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::Matched { head, .. } => Some(head.timestamp()),
            Self::SingleHead { event, .. } => Some(event.timestamp()),
            Self::SingleTail { .. } => None,
        }
    }

    pub fn tail_timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::Matched { tail, .. } => Some(tail.timestamp()),
            Self::SingleTail { event, .. } => Some(event.timestamp()),
            Self::SingleHead { .. } => None,
        }
    }

    /// Time difference (tail - head) in ticks, for matched events only
    pub fn delta_t(&self) -> Option<i64> {
        match self {
            Self::Matched { delta_t, .. } => Some(*delta_t),
            _ => None,
        }
    }

    /// Time difference (tail - head) in microseconds, for matched events only
    pub fn delta_t_micros(&self, clock_mhz: f64) -> Option<f64> {
        self.delta_t()
            .map(|dt| ticks_to_micros(dt as f64, clock_mhz))
    }

    pub fn reason(&self) -> Option<SingleReason> {
        match self {
            Self::Matched { .. } => None,
            Self::SingleHead { reason, .. } | Self::SingleTail { reason, .. } => Some(*reason),
        }
    }
}
