use super::constants::STREAM_FILE_EXTENSION;
use super::error::{StreamFileError, StreamStackError};
use super::event::TimestampedEvent;
use super::source::EventSource;
use super::stream_file::{StreamFile, StreamRecord};

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// The full event stream of one subsystem for a run.
///
/// Acquisition splits a run's stream into numbered segment files
/// (`head-000.tsq`, `head-001.tsq`, ...). The stack is the ordered collection of all
/// segments with a given prefix in the run directory, read back-to-back.
#[derive(Debug)]
pub struct StreamStack {
    pub file_stack: VecDeque<PathBuf>,
    active_file: Option<StreamFile>,
    pub total_stack_size_bytes: u64,
    bytes_read: u64,
}

impl StreamStack {
    /// Create a new StreamStack from the segments starting with `prefix` in a run directory
    pub fn new(path: &Path, prefix: &str) -> Result<Self, StreamStackError> {
        let (mut stack, bytes) = Self::get_file_stack(path, prefix)?;
        match stack.pop_front() {
            Some(file_path) => Ok(StreamStack {
                active_file: Some(StreamFile::new(&file_path)?),
                file_stack: stack,
                total_stack_size_bytes: bytes,
                bytes_read: 0,
            }),
            None => Err(StreamStackError::NoMatchingFiles(prefix.to_string())),
        }
    }

    /// Get the next event in the file stack
    ///
    /// Returns a `Result<Option<TimestampedEvent>>`. The Option is None if the stack has
    /// no more data.
    pub fn get_next_event(
        &mut self,
    ) -> Result<Option<TimestampedEvent<StreamRecord>>, StreamStackError> {
        loop {
            let Some(active_file) = self.active_file.as_mut() else {
                return Ok(None);
            };

            match active_file.get_next_event() {
                Ok(event) => {
                    self.bytes_read += event.payload().size_bytes();
                    return Ok(Some(event));
                }
                Err(StreamFileError::EndOfFile) => self.move_to_next_file()?,
                Err(e) => return Err(StreamStackError::FileError(e)),
            }
        }
    }

    /// Get all of the matching segment files and put them in the stack
    fn get_file_stack(
        parent_path: &Path,
        prefix: &str,
    ) -> Result<(VecDeque<PathBuf>, u64), StreamStackError> {
        let mut file_list: Vec<PathBuf> = Vec::new();
        for item in parent_path.read_dir()? {
            let item_path = item?.path();
            let is_segment = item_path.file_name().is_some_and(|name| {
                let name = name.to_string_lossy();
                name.starts_with(prefix) && name.ends_with(STREAM_FILE_EXTENSION)
            });
            if is_segment {
                file_list.push(item_path);
            }
        }

        if file_list.is_empty() {
            return Err(StreamStackError::NoMatchingFiles(prefix.to_string()));
        }

        let mut total_stack_size_bytes = 0;
        for path in file_list.iter() {
            total_stack_size_bytes += path.metadata()?.len();
        }

        file_list.sort(); // Segment numbers are zero padded, so plain sorting works
        Ok((file_list.into(), total_stack_size_bytes))
    }

    /// Move to the next non-empty file in the stack
    fn move_to_next_file(&mut self) -> Result<(), StreamStackError> {
        while let Some(next_file_path) = self.file_stack.pop_front() {
            let next_file = StreamFile::new(&next_file_path)?;
            if next_file.size_bytes() > 0 {
                self.active_file = Some(next_file);
                return Ok(());
            }
        }
        self.active_file = None;
        Ok(())
    }
}

impl EventSource for StreamStack {
    type Payload = StreamRecord;
    type Error = StreamStackError;

    fn next_event(&mut self) -> Result<Option<TimestampedEvent<StreamRecord>>, StreamStackError> {
        self.get_next_event()
    }

    fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_file::StreamWriter;

    fn write_segment(path: &Path, timestamps: &[u64]) {
        let mut writer = StreamWriter::new(path).unwrap();
        for (serial, ts) in timestamps.iter().enumerate() {
            let record = StreamRecord {
                serial: serial as u32,
                ..Default::default()
            };
            writer
                .write_event(&TimestampedEvent::new(*ts, record))
                .unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn reads_segments_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_segment(&dir.path().join("head-001.tsq"), &[30, 40]);
        write_segment(&dir.path().join("head-000.tsq"), &[10, 20]);
        write_segment(&dir.path().join("head-002.tsq"), &[]);
        write_segment(&dir.path().join("tail-000.tsq"), &[15]);
        std::fs::write(dir.path().join("head-notes.txt"), "not a segment").unwrap();

        let mut stack = StreamStack::new(dir.path(), "head-").unwrap();
        assert_eq!(stack.file_stack.len(), 2);
        let mut timestamps = Vec::new();
        while let Some(event) = stack.next_event().unwrap() {
            timestamps.push(event.timestamp());
        }
        assert_eq!(timestamps, vec![10, 20, 30, 40]);
        assert_eq!(stack.bytes_read(), stack.total_stack_size_bytes);
        assert!(stack.next_event().unwrap().is_none());
    }

    #[test]
    fn no_segments() {
        let dir = tempfile::tempdir().unwrap();
        write_segment(&dir.path().join("tail-000.tsq"), &[1]);
        assert!(matches!(
            StreamStack::new(dir.path(), "head-"),
            Err(StreamStackError::NoMatchingFiles(_))
        ));
    }
}
