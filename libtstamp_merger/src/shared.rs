use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::diagnostics::Diagnostics;
use super::error::Rejected;
use super::event::{CoincidenceEvent, Subsystem, TimestampedEvent};
use super::matcher::CoincidenceMatcher;

/// A CoincidenceMatcher shared between one producer thread per subsystem and a consumer.
///
/// Producers push through a short critical section and wake the consumer. The consumer
/// resolves whatever it can under the lock and sleeps while nothing can be resolved.
/// Each resolution happens entirely under the lock, so a half-made match is never
/// visible to anyone.
#[derive(Debug)]
pub struct SharedMatcher<H, T> {
    matcher: Mutex<CoincidenceMatcher<H, T>>,
    signal: Condvar,
}

impl<H, T> SharedMatcher<H, T> {
    pub fn new(matcher: CoincidenceMatcher<H, T>) -> Self {
        Self {
            matcher: Mutex::new(matcher),
            signal: Condvar::new(),
        }
    }

    /// Push a head event, waiting up to `stall_timeout` for room if the queue is full
    pub fn push_head(
        &self,
        event: TimestampedEvent<H>,
        stall_timeout: Duration,
    ) -> Result<(), Rejected<H>> {
        let mut matcher = self.wait_for_room(Subsystem::Head, stall_timeout);
        let result = matcher.push_head(event);
        drop(matcher);
        self.signal.notify_all();
        result
    }

    /// Push a tail event, waiting up to `stall_timeout` for room if the queue is full
    pub fn push_tail(
        &self,
        event: TimestampedEvent<T>,
        stall_timeout: Duration,
    ) -> Result<(), Rejected<T>> {
        let mut matcher = self.wait_for_room(Subsystem::Tail, stall_timeout);
        let result = matcher.push_tail(event);
        drop(matcher);
        self.signal.notify_all();
        result
    }

    /// End the stream of a subsystem
    pub fn close(&self, subsystem: Subsystem) {
        self.lock().close(subsystem);
        self.signal.notify_all();
    }

    /// Wait until something can be resolved and move it into `batch`.
    ///
    /// Returns false, with `batch` untouched, once both streams have ended and every
    /// event has been resolved.
    pub fn next_batch(&self, batch: &mut Vec<CoincidenceEvent<H, T>>) -> bool {
        let mut matcher = self.lock();
        loop {
            while let Some(event) = matcher.step() {
                batch.push(event);
            }
            if !batch.is_empty() {
                drop(matcher);
                // Room was freed; wake any producer waiting on a full queue
                self.signal.notify_all();
                return true;
            }
            if matcher.is_exhausted() {
                return false;
            }
            matcher = self
                .signal
                .wait(matcher)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.lock().diagnostics().clone()
    }

    pub fn into_inner(self) -> CoincidenceMatcher<H, T> {
        self.matcher
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, CoincidenceMatcher<H, T>> {
        self.matcher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_for_room(
        &self,
        subsystem: Subsystem,
        stall_timeout: Duration,
    ) -> MutexGuard<'_, CoincidenceMatcher<H, T>> {
        let matcher = self.lock();
        let (matcher, _) = self
            .signal
            .wait_timeout_while(matcher, stall_timeout, |m| m.awaits_room(subsystem))
            .unwrap_or_else(PoisonError::into_inner);
        matcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueueError;
    use crate::event::CoincidenceKind;
    use std::sync::Arc;

    #[test]
    fn producers_and_consumer_on_threads() {
        let shared = Arc::new(SharedMatcher::new(CoincidenceMatcher::<u64, u64>::new(2, 4)));
        let stall = Duration::from_secs(10);

        let head = {
            let shared = shared.clone();
            std::thread::spawn(move || {
                for ts in (0..200u64).map(|i| i * 10) {
                    shared.push_head(TimestampedEvent::new(ts, ts), stall).unwrap();
                }
                shared.close(Subsystem::Head);
            })
        };
        let tail = {
            let shared = shared.clone();
            std::thread::spawn(move || {
                // Every other head event has a partner one tick later
                for ts in (0..100u64).map(|i| i * 20 + 1) {
                    shared.push_tail(TimestampedEvent::new(ts, ts), stall).unwrap();
                }
                shared.close(Subsystem::Tail);
            })
        };

        let mut emitted = Vec::new();
        let mut batch = Vec::new();
        while shared.next_batch(&mut batch) {
            emitted.append(&mut batch);
        }
        head.join().unwrap();
        tail.join().unwrap();

        let n_coinc = emitted
            .iter()
            .filter(|e| e.kind() == CoincidenceKind::Matched)
            .count();
        assert_eq!(n_coinc, 100);
        assert_eq!(emitted.len(), 200);
        assert_eq!(shared.diagnostics().events_resolved(), 300);
    }

    #[test]
    fn stalled_partner_surfaces_overflow() {
        let shared = SharedMatcher::new(CoincidenceMatcher::<u64, u64>::new(2, 2));
        let stall = Duration::from_millis(20);
        shared.push_head(TimestampedEvent::new(1, 1), stall).unwrap();
        shared.push_head(TimestampedEvent::new(2, 2), stall).unwrap();
        let rejected = shared
            .push_head(TimestampedEvent::new(3, 3), stall)
            .expect_err("tail never produces");
        assert!(matches!(rejected.error, QueueError::Overflow { .. }));
        assert_eq!(*rejected.event.payload(), 3);

        // The halted head stream no longer holds back resolution
        shared.close(Subsystem::Tail);
        let mut batch = Vec::new();
        assert!(shared.next_batch(&mut batch));
        assert_eq!(batch.len(), 2);
        batch.clear();
        assert!(!shared.next_batch(&mut batch));
    }
}
