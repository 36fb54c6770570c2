/// Number of valid bits in a single word of the IO32 timestamp counter FIFO
pub const TSC_WORD_BITS: u32 = 30;
/// Mask for the valid bits of a timestamp counter word
pub const TSC_WORD_MASK: u64 = 0x3fff_ffff;

/// Default frequency of the timestamp clock in MHz
pub const DEFAULT_CLOCK_MHZ: f64 = 20.0;
/// Default coincidence window in clock ticks (10 us at 20 MHz)
pub const DEFAULT_WINDOW_TICKS: u64 = 200;
/// Default maximum number of unmatched events held per subsystem
pub const DEFAULT_QUEUE_CAPACITY: usize = 100_000;
/// Default time a producer waits for room in a full queue before reporting an overflow
pub const DEFAULT_STALL_TIMEOUT_MS: u64 = 5_000;

/// Size of a stream record header in bytes
pub const STREAM_HEADER_SIZE: u64 = 20;
/// Segment file name prefix for the head subsystem
pub const HEAD_FILE_PREFIX: &str = "head-";
/// Segment file name prefix for the tail subsystem
pub const TAIL_FILE_PREFIX: &str = "tail-";
/// Segment file extension
pub const STREAM_FILE_EXTENSION: &str = ".tsq";
