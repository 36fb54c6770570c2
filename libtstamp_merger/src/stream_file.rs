use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::clock::{compose_clock, split_clock};
use super::constants::STREAM_HEADER_SIZE;
use super::error::StreamFileError;
use super::event::TimestampedEvent;

/// One event as recorded by a subsystem's acquisition.
///
/// On disk a record is a little-endian header followed by the raw data:
///
/// ```text
/// event_id: u16 | trigger_mask: u16 | serial: u32 | tsc_lower: u32 | tsc_upper: u32 | data_size: u32 | data
/// ```
///
/// The two timestamp counter words become the event timestamp and are not kept here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamRecord {
    pub event_id: u16,
    pub trigger_mask: u16,
    pub serial: u32,
    pub data: Vec<u8>,
}

impl StreamRecord {
    /// Size of the record on disk, header included
    pub fn size_bytes(&self) -> u64 {
        STREAM_HEADER_SIZE + self.data.len() as u64
    }
}

/// A single segment file of one subsystem's event stream
#[derive(Debug)]
pub struct StreamFile {
    reader: BufReader<File>,
    size_bytes: u64,
    bytes_read: u64,
}

impl StreamFile {
    pub fn new(path: &Path) -> Result<Self, StreamFileError> {
        if !path.exists() {
            return Err(StreamFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let size_bytes = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            size_bytes,
            bytes_read: 0,
        })
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Read the next record.
    ///
    /// Returns `StreamFileError::EndOfFile` when the file is exhausted on a record boundary.
    pub fn get_next_event(&mut self) -> Result<TimestampedEvent<StreamRecord>, StreamFileError> {
        if self.reader.fill_buf()?.is_empty() {
            return Err(StreamFileError::EndOfFile);
        }

        let mut header = [0u8; STREAM_HEADER_SIZE as usize];
        read_record_bytes(&mut self.reader, &mut header)?;
        let mut cursor = &header[..];
        let event_id = cursor.read_u16::<LittleEndian>()?;
        let trigger_mask = cursor.read_u16::<LittleEndian>()?;
        let serial = cursor.read_u32::<LittleEndian>()?;
        let tsc_lower = cursor.read_u32::<LittleEndian>()?;
        let tsc_upper = cursor.read_u32::<LittleEndian>()?;
        let data_size = cursor.read_u32::<LittleEndian>()? as u64;
        self.bytes_read += STREAM_HEADER_SIZE;

        // Never allocate more than the file can still hold
        let remaining = self.size_bytes.saturating_sub(self.bytes_read);
        if data_size > remaining {
            return Err(StreamFileError::TruncatedRecord(data_size - remaining));
        }
        let mut data = vec![0u8; data_size as usize];
        read_record_bytes(&mut self.reader, &mut data)?;
        self.bytes_read += data_size;

        Ok(TimestampedEvent::new(
            compose_clock(tsc_lower, tsc_upper),
            StreamRecord {
                event_id,
                trigger_mask,
                serial,
                data,
            },
        ))
    }
}

/// Fill the buffer completely, reporting a short read as a truncated record
fn read_record_bytes<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<(), StreamFileError> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..])? {
            0 => {
                return Err(StreamFileError::TruncatedRecord(
                    (buffer.len() - filled) as u64,
                ))
            }
            n => filled += n,
        }
    }
    Ok(())
}

/// Writes records in the segment file format
#[derive(Debug)]
pub struct StreamWriter {
    writer: BufWriter<File>,
}

impl StreamWriter {
    /// Create a segment file, truncating any existing file
    pub fn new(path: &Path) -> Result<Self, StreamFileError> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }

    pub fn write_event(
        &mut self,
        event: &TimestampedEvent<StreamRecord>,
    ) -> Result<(), StreamFileError> {
        let (tsc_lower, tsc_upper) = split_clock(event.timestamp())
            .ok_or(StreamFileError::TimestampRange(event.timestamp()))?;
        let record = event.payload();
        let data_size = u32::try_from(record.data.len())
            .map_err(|_| StreamFileError::RecordTooLarge(record.data.len()))?;

        self.writer.write_u16::<LittleEndian>(record.event_id)?;
        self.writer.write_u16::<LittleEndian>(record.trigger_mask)?;
        self.writer.write_u32::<LittleEndian>(record.serial)?;
        self.writer.write_u32::<LittleEndian>(tsc_lower)?;
        self.writer.write_u32::<LittleEndian>(tsc_upper)?;
        self.writer.write_u32::<LittleEndian>(data_size)?;
        self.writer.write_all(&record.data)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<(), StreamFileError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(serial: u32, data: &[u8]) -> StreamRecord {
        StreamRecord {
            event_id: 1,
            trigger_mask: 0x2,
            serial,
            data: data.to_vec(),
        }
    }

    #[test]
    fn reads_back_written_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("head-000.tsq");
        let events = vec![
            TimestampedEvent::new(12, record(0, &[1, 2, 3])),
            TimestampedEvent::new((7 << 30) + 99, record(1, &[])),
        ];
        let mut writer = StreamWriter::new(&path).unwrap();
        for event in events.iter() {
            writer.write_event(event).unwrap();
        }
        writer.finish().unwrap();

        let mut file = StreamFile::new(&path).unwrap();
        assert_eq!(file.size_bytes(), 2 * STREAM_HEADER_SIZE + 3);
        assert_eq!(file.get_next_event().unwrap(), events[0]);
        assert_eq!(file.get_next_event().unwrap(), events[1]);
        assert!(matches!(
            file.get_next_event(),
            Err(StreamFileError::EndOfFile)
        ));
    }

    #[test]
    fn short_record_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tail-000.tsq");
        let mut writer = StreamWriter::new(&path).unwrap();
        writer
            .write_event(&TimestampedEvent::new(5, record(0, &[9, 9, 9, 9])))
            .unwrap();
        writer.finish().unwrap();

        // Chop off the last two data bytes
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();

        let mut file = StreamFile::new(&path).unwrap();
        assert!(matches!(
            file.get_next_event(),
            Err(StreamFileError::TruncatedRecord(2))
        ));
    }

    #[test]
    fn oversized_data_size_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("head-000.tsq");
        let mut bytes = Vec::new();
        bytes.write_u16::<LittleEndian>(1).unwrap();
        bytes.write_u16::<LittleEndian>(0).unwrap();
        bytes.write_u32::<LittleEndian>(0).unwrap();
        bytes.write_u32::<LittleEndian>(10).unwrap();
        bytes.write_u32::<LittleEndian>(0).unwrap();
        bytes.write_u32::<LittleEndian>(u32::MAX).unwrap();
        bytes.extend_from_slice(&[1, 2, 3]);
        std::fs::write(&path, &bytes).unwrap();

        let mut file = StreamFile::new(&path).unwrap();
        assert!(matches!(
            file.get_next_event(),
            Err(StreamFileError::TruncatedRecord(n)) if n == u32::MAX as u64 - 3
        ));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            StreamFile::new(&dir.path().join("nope.tsq")),
            Err(StreamFileError::BadFilePath(_))
        ));
    }
}
