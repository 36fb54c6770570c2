use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::error::SinkError;
use super::event::CoincidenceEvent;

/// Consumes CoincidenceEvents in the order the matcher resolved them.
///
/// Each event is delivered exactly once; ownership passes to the sink.
pub trait EventSink<H, T> {
    fn deliver(&mut self, event: CoincidenceEvent<H, T>) -> Result<(), SinkError>;
}

impl<H, T> EventSink<H, T> for Vec<CoincidenceEvent<H, T>> {
    fn deliver(&mut self, event: CoincidenceEvent<H, T>) -> Result<(), SinkError> {
        self.push(event);
        Ok(())
    }
}

/// Writes a one-line text summary of each CoincidenceEvent.
///
/// ```text
/// coinc 100 102 2 0.100
/// single head 110 window-timeout
/// single tail 200 shutdown-flush
/// ```
/// The last column of a coincidence line is the time difference in microseconds.
#[derive(Debug)]
pub struct ListingSink<W: Write> {
    writer: W,
    clock_mhz: f64,
    lines: u64,
}

impl ListingSink<BufWriter<File>> {
    /// Create a listing file at the given path, truncating any existing file
    pub fn create(path: &Path, clock_mhz: f64) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), clock_mhz))
    }
}

impl<W: Write> ListingSink<W> {
    pub fn new(writer: W, clock_mhz: f64) -> Self {
        Self {
            writer,
            clock_mhz,
            lines: 0,
        }
    }

    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    /// Flush and hand back the writer
    pub fn finish(mut self) -> Result<W, SinkError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write, H, T> EventSink<H, T> for ListingSink<W> {
    fn deliver(&mut self, event: CoincidenceEvent<H, T>) -> Result<(), SinkError> {
        match &event {
            CoincidenceEvent::Matched {
                head,
                tail,
                delta_t,
            } => writeln!(
                self.writer,
                "coinc {} {} {} {:.3}",
                head.timestamp(),
                tail.timestamp(),
                delta_t,
                event.delta_t_micros(self.clock_mhz).unwrap_or_default()
            )?,
            CoincidenceEvent::SingleHead {
                event: single,
                reason,
            } => writeln!(self.writer, "single head {} {}", single.timestamp(), reason)?,
            CoincidenceEvent::SingleTail {
                event: single,
                reason,
            } => writeln!(self.writer, "single tail {} {}", single.timestamp(), reason)?,
        }
        self.lines += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{SingleReason, TimestampedEvent};

    #[test]
    fn listing_lines() {
        let mut sink = ListingSink::new(Vec::new(), 20.0);
        let events: Vec<CoincidenceEvent<(), ()>> = vec![
            CoincidenceEvent::matched(TimestampedEvent::new(100, ()), TimestampedEvent::new(102, ())),
            CoincidenceEvent::SingleHead {
                event: TimestampedEvent::new(110, ()),
                reason: SingleReason::WindowTimeout,
            },
            CoincidenceEvent::SingleTail {
                event: TimestampedEvent::new(200, ()),
                reason: SingleReason::ShutdownFlush,
            },
        ];
        for event in events {
            sink.deliver(event).unwrap();
        }
        assert_eq!(sink.lines_written(), 3);
        let text = String::from_utf8(sink.finish().unwrap()).unwrap();
        assert_eq!(
            text,
            "coinc 100 102 2 0.100\nsingle head 110 window-timeout\nsingle tail 200 shutdown-flush\n"
        );
    }
}
