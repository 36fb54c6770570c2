use std::collections::VecDeque;

use super::error::{QueueError, Rejected};
use super::event::{Subsystem, Timestamp, TimestampedEvent};

/// Whether a queue still takes new events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intake {
    Open,
    /// The producer ended its stream
    Closed,
    /// A push failed; the producer is cut off
    Halted,
}

/// TimestampQueue holds the not-yet-matched events of one subsystem.
///
/// Events are kept in arrival order, which must also be timestamp order. The
/// queue has a fixed capacity so that a dead counterpart subsystem shows up as
/// an Overflow instead of unbounded memory growth. Once a push fails, the queue
/// stops taking events entirely; whatever was accepted before stays available
/// to the matcher.
#[derive(Debug)]
pub struct TimestampQueue<P> {
    subsystem: Subsystem,
    capacity: usize,
    events: VecDeque<TimestampedEvent<P>>,
    last_accepted: Option<Timestamp>,
    intake: Intake,
}

impl<P> TimestampQueue<P> {
    pub fn new(subsystem: Subsystem, capacity: usize) -> Self {
        Self {
            subsystem,
            capacity,
            events: VecDeque::new(),
            last_accepted: None,
            intake: Intake::Open,
        }
    }

    /// Append an event at the back of the queue.
    ///
    /// Fails if the queue is full, if the event is older than the last event accepted
    /// for this subsystem, or if the queue was closed or halted. The rejected event is
    /// returned with the error.
    pub fn push(&mut self, event: TimestampedEvent<P>) -> Result<(), Rejected<P>> {
        match self.intake {
            Intake::Open => (),
            Intake::Closed => return Err(Rejected::new(QueueError::Closed(self.subsystem), event)),
            Intake::Halted => return Err(Rejected::new(QueueError::Halted(self.subsystem), event)),
        }

        if let Some(last) = self.last_accepted {
            if event.timestamp() < last {
                self.intake = Intake::Halted;
                let error = QueueError::NonMonotonicInput {
                    subsystem: self.subsystem,
                    timestamp: event.timestamp(),
                    last,
                };
                return Err(Rejected::new(error, event));
            }
        }

        if self.is_full() {
            self.intake = Intake::Halted;
            let error = QueueError::Overflow {
                subsystem: self.subsystem,
                capacity: self.capacity,
            };
            return Err(Rejected::new(error, event));
        }

        self.last_accepted = Some(event.timestamp());
        self.events.push_back(event);
        Ok(())
    }

    pub fn peek_oldest(&self) -> Option<&TimestampedEvent<P>> {
        self.events.front()
    }

    pub fn pop_oldest(&mut self) -> Option<TimestampedEvent<P>> {
        self.events.pop_front()
    }

    pub fn oldest_timestamp(&self) -> Option<Timestamp> {
        self.events.front().map(|e| e.timestamp())
    }

    pub fn newest_timestamp(&self) -> Option<Timestamp> {
        self.events.back().map(|e| e.timestamp())
    }

    /// Timestamp of the last event ever accepted, even if it has since been removed
    pub fn last_accepted(&self) -> Option<Timestamp> {
        self.last_accepted
    }

    /// Check if no event still queued here, nor any event that can still be
    /// pushed here, can lie within `window` ticks of `timestamp`.
    ///
    /// Pushes are monotonic, so it is enough that the oldest queued event is already out
    /// of reach. An empty queue only rules a match out once it stops taking events.
    pub fn precludes_match(&self, timestamp: Timestamp, window: Timestamp) -> bool {
        match self.oldest_timestamp() {
            Some(oldest) => beyond_window(oldest, timestamp, window),
            None => !self.accepts_input(),
        }
    }

    /// Stop taking events; the producer has finished
    pub fn close(&mut self) {
        if self.intake == Intake::Open {
            self.intake = Intake::Closed;
        }
    }

    pub fn intake(&self) -> Intake {
        self.intake
    }

    pub fn accepts_input(&self) -> bool {
        self.intake == Intake::Open
    }

    pub fn is_full(&self) -> bool {
        self.events.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimestampedEvent<P>> {
        self.events.iter()
    }
}

/// True if `later` comes strictly more than `window` ticks after `earlier`
fn beyond_window(later: Timestamp, earlier: Timestamp, window: Timestamp) -> bool {
    later > earlier && later - earlier > window
}
