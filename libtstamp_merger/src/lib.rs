//! # tstamp_merger
//!
//! tstamp_merger is a timestamp coincidence builder, written in Rust. It takes the event
//! streams recorded independently by two acquisition chains of an experiment (the "head"
//! and the "tail" subsystems, each read out from its own VME crate) and identifies which
//! events belong to the same physical reaction by comparing their hardware trigger
//! timestamps.
//!
//! Each subsystem stamps its events with its own timestamp counter. Within one subsystem
//! the timestamps never decrease, but the two streams are buffered and delivered
//! independently, so an event can show up long before or after its partner from the
//! other subsystem. Events whose timestamps differ by no more than the coincidence window
//! are paired; everything else is emitted as a single. No event is ever dropped or
//! emitted twice.
//!
//! ## Installation
//!
//! The only method of install is currently from source. Clone the repository and use
//! `cargo install --path ./tstamp_merger_cli` from the top level of the repository.
//!
//! ## Matching
//!
//! Events of each subsystem wait in a bounded [`timestamp_queue::TimestampQueue`]. The
//! [`matcher::CoincidenceMatcher`] only ever looks at the oldest event of each queue:
//!
//! - If the two oldest events are within the window they are emitted as a coincidence.
//!   Identical timestamps always match.
//! - Otherwise the earlier event is emitted as a single (reason `window-timeout`), but
//!   only once nothing on the other side can still match it: either the other queue's
//!   oldest event is already more than a window later, or the other stream has ended.
//! - If neither holds, the matcher waits for more data.
//!
//! The decision depends only on timestamps, never on wall-clock time, so the same input
//! always gives the same output. A queue that fills up because the other subsystem has
//! stopped producing reports an Overflow to its producer instead of growing.
//!
//! At shutdown the matcher drains: every remaining event is emitted as a single (reason
//! `shutdown-flush`), the head queue first.
//!
//! ## Configuration
//!
//! The command line tool reads a YAML configuration:
//!
//! ```yml
//! head_path: /data/head
//! tail_path: /data/tail
//! output_path: /data/coinc
//! window_ticks: 200
//! queue_capacity: 100000
//! clock_mhz: 20.0
//! stall_timeout_ms: 5000
//! first_run_number: 0
//! last_run_number: 0
//! n_threads: 1
//! ```
//!
//! `head_path` and `tail_path` contain one `run_NNNN` directory per run holding the
//! segment files of that subsystem (`head-000.tsq`, `head-001.tsq`, ... and
//! `tail-000.tsq`, ...). The format of a segment is described in
//! [`stream_file::StreamRecord`]. `window_ticks` is the coincidence window in timestamp
//! clock ticks, and `clock_mhz` the frequency of that clock.
//!
//! ## Output
//!
//! For each run two files are written to `output_path`:
//!
//! - `run_NNNN.coinc`: one line per coincidence or single, in resolution order
//! - `run_NNNN.yaml`: the matching [`diagnostics::Diagnostics`] at the end of the run
//!
//! A log file `tstamp_merger.log` is also written by the command line tool. If a run
//! fails, it will contain the details.
pub mod clock;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod matcher;
pub mod process;
pub mod shared;
pub mod sink;
pub mod source;
pub mod stream_file;
pub mod stream_stack;
pub mod timestamp_queue;
pub mod worker_status;
