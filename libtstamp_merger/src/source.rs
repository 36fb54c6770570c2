use std::convert::Infallible;

use super::event::TimestampedEvent;

/// Supplies the decoded events of one subsystem in arrival order.
///
/// Timestamps must be non-decreasing; the queue refuses anything older than
/// what it already accepted.
pub trait EventSource {
    type Payload;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns `Ok(None)` once the source has no more events
    fn next_event(&mut self) -> Result<Option<TimestampedEvent<Self::Payload>>, Self::Error>;

    /// Bytes of raw input consumed so far, if the source can tell
    fn bytes_read(&self) -> u64 {
        0
    }
}

/// In-memory source, mostly for replaying events already decoded elsewhere
impl<P> EventSource for std::vec::IntoIter<TimestampedEvent<P>> {
    type Payload = P;
    type Error = Infallible;

    fn next_event(&mut self) -> Result<Option<TimestampedEvent<P>>, Infallible> {
        Ok(self.next())
    }
}
