use serde::Serialize;

use super::clock::ticks_to_micros;
use super::error::QueueError;
use super::event::{CoincidenceEvent, SingleReason, Timestamp};

/// Singles tallied by the reason they were emitted alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SinglesCount {
    pub window_timeout: u64,
    pub shutdown_flush: u64,
}

impl SinglesCount {
    fn record(&mut self, reason: SingleReason) {
        match reason {
            SingleReason::WindowTimeout => self.window_timeout += 1,
            SingleReason::ShutdownFlush => self.shutdown_flush += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.window_timeout + self.shutdown_flush
    }
}

/// Health of the coincidence matching.
///
/// Updated on every push and every emission. Rates are per second of
/// timestamp-clock time since the first accepted event, not wall-clock time.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    #[serde(skip)]
    clock_mhz: f64,
    #[serde(skip)]
    first_timestamp: Option<Timestamp>,
    #[serde(skip)]
    latest_timestamp: Option<Timestamp>,
    pub head_size: usize,
    pub tail_size: usize,
    pub n_coinc: u64,
    pub head_singles: SinglesCount,
    pub tail_singles: SinglesCount,
    pub n_overflow: u64,
    pub n_non_monotonic: u64,
    /// Ticks between the oldest and newest queued event at the last push
    pub time_diff: Timestamp,
    pub coinc_rate: f64,
    pub head_singles_rate: f64,
    pub tail_singles_rate: f64,
}

impl Diagnostics {
    pub fn new(clock_mhz: f64) -> Self {
        Self {
            clock_mhz,
            first_timestamp: None,
            latest_timestamp: None,
            head_size: 0,
            tail_size: 0,
            n_coinc: 0,
            head_singles: SinglesCount::default(),
            tail_singles: SinglesCount::default(),
            n_overflow: 0,
            n_non_monotonic: 0,
            time_diff: 0,
            coinc_rate: 0.0,
            head_singles_rate: 0.0,
            tail_singles_rate: 0.0,
        }
    }

    /// Back to begin-of-run values
    pub fn reset(&mut self) {
        *self = Self::new(self.clock_mhz);
    }

    pub(crate) fn set_clock(&mut self, clock_mhz: f64) {
        self.clock_mhz = clock_mhz;
        self.update_rates();
    }

    pub(crate) fn record_push(
        &mut self,
        timestamp: Timestamp,
        head_size: usize,
        tail_size: usize,
        time_diff: Timestamp,
    ) {
        self.first_timestamp = Some(self.first_timestamp.map_or(timestamp, |t| t.min(timestamp)));
        self.latest_timestamp = Some(self.latest_timestamp.map_or(timestamp, |t| t.max(timestamp)));
        self.head_size = head_size;
        self.tail_size = tail_size;
        self.time_diff = time_diff;
        self.update_rates();
    }

    pub(crate) fn record_rejection(&mut self, error: &QueueError) {
        match error {
            QueueError::Overflow { .. } => self.n_overflow += 1,
            QueueError::NonMonotonicInput { .. } => self.n_non_monotonic += 1,
            QueueError::Halted(_) | QueueError::Closed(_) => (),
        }
    }

    pub(crate) fn record_emission<H, T>(
        &mut self,
        event: &CoincidenceEvent<H, T>,
        head_size: usize,
        tail_size: usize,
    ) {
        match event {
            CoincidenceEvent::Matched { .. } => self.n_coinc += 1,
            CoincidenceEvent::SingleHead { reason, .. } => self.head_singles.record(*reason),
            CoincidenceEvent::SingleTail { reason, .. } => self.tail_singles.record(*reason),
        }
        self.head_size = head_size;
        self.tail_size = tail_size;
        self.update_rates();
    }

    /// Number of input events accounted for by emitted CoincidenceEvents
    pub fn events_resolved(&self) -> u64 {
        2 * self.n_coinc + self.head_singles.total() + self.tail_singles.total()
    }

    fn update_rates(&mut self) {
        let elapsed_ticks = match (self.first_timestamp, self.latest_timestamp) {
            (Some(first), Some(latest)) => latest - first,
            _ => 0,
        };
        if elapsed_ticks == 0 || self.clock_mhz <= 0.0 {
            self.coinc_rate = 0.0;
            self.head_singles_rate = 0.0;
            self.tail_singles_rate = 0.0;
            return;
        }
        let seconds = ticks_to_micros(elapsed_ticks as f64, self.clock_mhz) / 1.0e6;
        self.coinc_rate = self.n_coinc as f64 / seconds;
        self.head_singles_rate = self.head_singles.total() as f64 / seconds;
        self.tail_singles_rate = self.tail_singles.total() as f64 / seconds;
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(super::constants::DEFAULT_CLOCK_MHZ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TimestampedEvent;

    #[test]
    fn rates_use_clock_time() {
        let mut diag = Diagnostics::new(1.0);
        diag.record_push(1_000_000, 1, 0, 0);
        assert_eq!(diag.coinc_rate, 0.0);
        diag.record_push(3_000_000, 1, 1, 2_000_000);
        let coinc: CoincidenceEvent<(), ()> = CoincidenceEvent::matched(
            TimestampedEvent::new(1_000_000, ()),
            TimestampedEvent::new(3_000_000, ()),
        );
        diag.record_emission(&coinc, 0, 0);
        // Two seconds of 1 MHz clock
        assert_eq!(diag.coinc_rate, 0.5);
        assert_eq!(diag.events_resolved(), 2);
        assert_eq!(diag.head_size, 0);
        assert_eq!(diag.time_diff, 2_000_000);
    }

    #[test]
    fn rejections_and_reset() {
        let mut diag = Diagnostics::new(20.0);
        diag.record_rejection(&QueueError::NonMonotonicInput {
            subsystem: crate::event::Subsystem::Tail,
            timestamp: 1,
            last: 2,
        });
        diag.record_rejection(&QueueError::Halted(crate::event::Subsystem::Tail));
        assert_eq!(diag.n_non_monotonic, 1);
        assert_eq!(diag.n_overflow, 0);
        diag.reset();
        assert_eq!(diag.n_non_monotonic, 0);
    }

    #[test]
    fn elapsed_time_spans_both_subsystems() {
        let mut diag = Diagnostics::new(1.0);
        // Tail arrives first with a later timestamp than the head
        diag.record_push(3_000_000, 0, 1, 0);
        diag.record_push(1_000_000, 1, 1, 2_000_000);
        let single: CoincidenceEvent<(), ()> = CoincidenceEvent::SingleHead {
            event: TimestampedEvent::new(1_000_000, ()),
            reason: crate::event::SingleReason::WindowTimeout,
        };
        diag.record_emission(&single, 0, 1);
        assert_eq!(diag.head_singles_rate, 0.5);
    }
}
