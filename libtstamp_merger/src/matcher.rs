use super::constants::DEFAULT_CLOCK_MHZ;
use super::diagnostics::Diagnostics;
use super::error::{QueueError, Rejected, SinkError};
use super::event::{CoincidenceEvent, SingleReason, Subsystem, Timestamp, TimestampedEvent};
use super::sink::EventSink;
use super::timestamp_queue::TimestampQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherState {
    /// Both queues are empty
    Idle,
    /// At least one queue holds an event
    Ready,
    /// Comparing the oldest events of both queues
    Resolving,
    /// Shutdown was requested; remaining events are being flushed
    Draining,
    /// Everything has been flushed
    Done,
}

/// CoincidenceMatcher pairs head and tail events whose timestamps lie within a window.
///
/// The matcher owns one TimestampQueue per subsystem and only ever looks at the oldest
/// event of each. If the two oldest events are within the window they are emitted
/// together. Otherwise the earlier one is emitted as a single, but only once it is certain
/// that nothing queued or yet to arrive on the other side can fall within its window.
/// Until then the matcher waits for more input. Nothing here depends on wall-clock time.
///
/// Shutdown is an explicit drain: every remaining event is flushed as a single, head queue
/// first, oldest first.
#[derive(Debug)]
pub struct CoincidenceMatcher<H, T> {
    window: Timestamp,
    head: TimestampQueue<H>,
    tail: TimestampQueue<T>,
    state: MatcherState,
    diagnostics: Diagnostics,
}

impl<H, T> CoincidenceMatcher<H, T> {
    /// Create a matcher with coincidence window `window` (in clock ticks) and room for
    /// `capacity` unmatched events per subsystem
    pub fn new(window: Timestamp, capacity: usize) -> Self {
        Self {
            window,
            head: TimestampQueue::new(Subsystem::Head, capacity),
            tail: TimestampQueue::new(Subsystem::Tail, capacity),
            state: MatcherState::Idle,
            diagnostics: Diagnostics::new(DEFAULT_CLOCK_MHZ),
        }
    }

    /// Set the timestamp clock frequency used for diagnostic rates
    pub fn with_clock(mut self, clock_mhz: f64) -> Self {
        self.diagnostics.set_clock(clock_mhz);
        self
    }

    pub fn window(&self) -> Timestamp {
        self.window
    }

    /// Change the coincidence window; applies from the next resolution on
    pub fn set_window(&mut self, window: Timestamp) {
        self.window = window;
    }

    pub fn state(&self) -> MatcherState {
        self.state
    }

    pub fn head(&self) -> &TimestampQueue<H> {
        &self.head
    }

    pub fn tail(&self) -> &TimestampQueue<T> {
        &self.tail
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn push_head(&mut self, event: TimestampedEvent<H>) -> Result<(), Rejected<H>> {
        let timestamp = event.timestamp();
        let result = self.head.push(event);
        self.after_push(timestamp, result.as_ref().err().map(|r| &r.error));
        result
    }

    pub fn push_tail(&mut self, event: TimestampedEvent<T>) -> Result<(), Rejected<T>> {
        let timestamp = event.timestamp();
        let result = self.tail.push(event);
        self.after_push(timestamp, result.as_ref().err().map(|r| &r.error));
        result
    }

    /// Mark the stream of a subsystem as finished. Events still queued on the other
    /// side no longer wait for partners from it.
    pub fn close(&mut self, subsystem: Subsystem) {
        match subsystem {
            Subsystem::Head => self.head.close(),
            Subsystem::Tail => self.tail.close(),
        }
        spdlog::debug!("Closed the {subsystem} stream");
    }

    /// Check if a push for the subsystem would fail only because its queue is full
    pub fn awaits_room(&self, subsystem: Subsystem) -> bool {
        match subsystem {
            Subsystem::Head => self.head.accepts_input() && self.head.is_full(),
            Subsystem::Tail => self.tail.accepts_input() && self.tail.is_full(),
        }
    }

    /// Check if neither subsystem can deliver anything more and nothing is left to resolve
    pub fn is_exhausted(&self) -> bool {
        !self.head.accepts_input()
            && !self.tail.accepts_input()
            && self.head.is_empty()
            && self.tail.is_empty()
    }

    /// Resolve at most one CoincidenceEvent.
    ///
    /// Returns None if the matcher has to wait for more input (or is draining).
    pub fn step(&mut self) -> Option<CoincidenceEvent<H, T>> {
        if matches!(self.state, MatcherState::Draining | MatcherState::Done) {
            return None;
        }
        self.state = MatcherState::Resolving;
        let resolved = self.resolve_oldest();
        if let Some(event) = &resolved {
            self.diagnostics
                .record_emission(event, self.head.len(), self.tail.len());
        }
        self.refresh_state();
        resolved
    }

    /// Resolve everything currently resolvable, delivering to the sink.
    ///
    /// Returns the number of CoincidenceEvents delivered.
    pub fn resolve<S: EventSink<H, T>>(&mut self, sink: &mut S) -> Result<usize, SinkError> {
        let mut delivered = 0;
        while let Some(event) = self.step() {
            sink.deliver(event)?;
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Flush a single queued event as a shutdown single.
    ///
    /// The first call switches the matcher to draining and stops all intake. Returns None
    /// once both queues are empty, after which the matcher is done.
    pub fn drain_one(&mut self) -> Option<CoincidenceEvent<H, T>> {
        match self.state {
            MatcherState::Done => return None,
            MatcherState::Draining => (),
            _ => {
                spdlog::info!(
                    "Draining {} head and {} tail events",
                    self.head.len(),
                    self.tail.len()
                );
                self.head.close();
                self.tail.close();
                self.state = MatcherState::Draining;
            }
        }

        let flushed = match self.head.pop_oldest() {
            Some(event) => Some(CoincidenceEvent::SingleHead {
                event,
                reason: SingleReason::ShutdownFlush,
            }),
            None => self.tail.pop_oldest().map(|event| CoincidenceEvent::SingleTail {
                event,
                reason: SingleReason::ShutdownFlush,
            }),
        };

        if let Some(event) = &flushed {
            self.diagnostics
                .record_emission(event, self.head.len(), self.tail.len());
        }
        if self.head.is_empty() && self.tail.is_empty() {
            self.state = MatcherState::Done;
        }
        flushed
    }

    /// Flush every remaining event to the sink and finish.
    ///
    /// Returns the number of CoincidenceEvents delivered.
    pub fn drain<S: EventSink<H, T>>(&mut self, sink: &mut S) -> Result<usize, SinkError> {
        let mut delivered = 0;
        while let Some(event) = self.drain_one() {
            sink.deliver(event)?;
            delivered += 1;
        }
        Ok(delivered)
    }

    fn resolve_oldest(&mut self) -> Option<CoincidenceEvent<H, T>> {
        let window = self.window;
        match (self.head.oldest_timestamp(), self.tail.oldest_timestamp()) {
            // Equal timestamps always land here, even with a zero window
            (Some(h), Some(t)) if h.abs_diff(t) <= window => {
                let head = self.head.pop_oldest()?;
                let tail = self.tail.pop_oldest()?;
                Some(CoincidenceEvent::matched(head, tail))
            }
            (Some(h), _) if self.tail.precludes_match(h, window) => {
                self.head.pop_oldest().map(|event| CoincidenceEvent::SingleHead {
                    event,
                    reason: SingleReason::WindowTimeout,
                })
            }
            (_, Some(t)) if self.head.precludes_match(t, window) => {
                self.tail.pop_oldest().map(|event| CoincidenceEvent::SingleTail {
                    event,
                    reason: SingleReason::WindowTimeout,
                })
            }
            _ => None,
        }
    }

    fn after_push(&mut self, timestamp: Timestamp, error: Option<&QueueError>) {
        match error {
            None => {
                self.diagnostics.record_push(
                    timestamp,
                    self.head.len(),
                    self.tail.len(),
                    self.time_spread(),
                );
                self.refresh_state();
            }
            Some(e @ (QueueError::Overflow { .. } | QueueError::NonMonotonicInput { .. })) => {
                spdlog::warn!("{e}");
                self.diagnostics.record_rejection(e);
            }
            Some(e) => spdlog::debug!("{e}"),
        }
    }

    /// Ticks between the oldest and newest event held in either queue
    fn time_spread(&self) -> Timestamp {
        let oldest = [self.head.oldest_timestamp(), self.tail.oldest_timestamp()]
            .into_iter()
            .flatten()
            .min();
        let newest = [self.head.newest_timestamp(), self.tail.newest_timestamp()]
            .into_iter()
            .flatten()
            .max();
        match (oldest, newest) {
            (Some(oldest), Some(newest)) => newest.saturating_sub(oldest),
            _ => 0,
        }
    }

    fn refresh_state(&mut self) {
        if matches!(self.state, MatcherState::Draining | MatcherState::Done) {
            return;
        }
        self.state = if self.head.is_empty() && self.tail.is_empty() {
            MatcherState::Idle
        } else {
            MatcherState::Ready
        };
    }
}
