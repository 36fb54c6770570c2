use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::time::Duration;

use super::config::Config;
use super::constants::{HEAD_FILE_PREFIX, TAIL_FILE_PREFIX};
use super::diagnostics::Diagnostics;
use super::error::{ProcessorError, Rejected};
use super::event::{Subsystem, TimestampedEvent};
use super::matcher::CoincidenceMatcher;
use super::shared::SharedMatcher;
use super::sink::{EventSink, ListingSink};
use super::source::EventSource;
use super::stream_stack::StreamStack;
use super::worker_status::{WorkerStage, WorkerStatus};

/// Outcome of correlating one pair of streams
#[derive(Debug, Clone)]
pub struct CorrelationSummary {
    pub diagnostics: Diagnostics,
    /// CoincidenceEvents delivered to the sink
    pub emitted: u64,
}

/// Closes one side of the shared matcher when dropped, so a producer that unwinds
/// still ends its stream
struct CloseOnDrop<'a, H, T> {
    shared: &'a SharedMatcher<H, T>,
    subsystem: Subsystem,
}

impl<H, T> Drop for CloseOnDrop<'_, H, T> {
    fn drop(&mut self) {
        self.shared.close(self.subsystem);
    }
}

/// Feed a source into one side of the shared matcher until it runs dry.
///
/// Returns the number of events accepted.
fn produce<S, F>(
    source: &mut S,
    subsystem: Subsystem,
    push: F,
    bytes_read: &AtomicU64,
) -> Result<u64, ProcessorError>
where
    S: EventSource,
    F: Fn(TimestampedEvent<S::Payload>) -> Result<(), Rejected<S::Payload>>,
{
    let mut accepted = 0;
    let mut last_bytes = 0;
    while let Some(event) = source
        .next_event()
        .map_err(|e| ProcessorError::SourceError(subsystem, Box::new(e)))?
    {
        if let Err(rejected) = push(event) {
            spdlog::error!(
                "Stopping the {subsystem} producer after {accepted} events: {rejected}"
            );
            return Err(ProcessorError::QueueError(rejected.error));
        }
        accepted += 1;
        let bytes = source.bytes_read();
        bytes_read.fetch_add(bytes - last_bytes, Ordering::Relaxed);
        last_bytes = bytes;
    }
    spdlog::info!("The {subsystem} stream ended after {accepted} events");
    Ok(accepted)
}

/// Deliver everything the matcher resolves to the sink until both streams are done
fn consume<H, T, K, P>(
    shared: &SharedMatcher<H, T>,
    sink: &mut K,
    bytes_read: &AtomicU64,
    progress: &mut P,
) -> Result<u64, ProcessorError>
where
    K: EventSink<H, T>,
    P: FnMut(u64) -> Result<(), ProcessorError>,
{
    let mut emitted = 0;
    let mut batch = Vec::new();
    while shared.next_batch(&mut batch) {
        for event in batch.drain(..) {
            sink.deliver(event)?;
            emitted += 1;
        }
        progress(bytes_read.load(Ordering::Relaxed))?;
    }
    Ok(emitted)
}

/// Correlate a head and a tail source through the matcher, delivering to the sink.
///
/// Each source gets its own producer thread while the calling thread resolves and
/// delivers. Once both streams have ended, anything left is drained. `progress` is
/// called after every delivered batch with the number of raw input bytes consumed so far.
///
/// If a producer fails or panics, the events it did deliver are still resolved and
/// delivered before the error is returned. If the sink fails, both streams are closed,
/// the producers are joined and the sink error is returned without draining.
pub fn correlate<HS, TS, K, P>(
    matcher: CoincidenceMatcher<HS::Payload, TS::Payload>,
    mut head_source: HS,
    mut tail_source: TS,
    sink: &mut K,
    stall_timeout: Duration,
    mut progress: P,
) -> Result<CorrelationSummary, ProcessorError>
where
    HS: EventSource + Send,
    TS: EventSource + Send,
    HS::Payload: Send,
    TS::Payload: Send,
    K: EventSink<HS::Payload, TS::Payload>,
    P: FnMut(u64) -> Result<(), ProcessorError>,
{
    let shared = SharedMatcher::new(matcher);
    let bytes_read = AtomicU64::new(0);

    let (head_result, tail_result, consumed) = std::thread::scope(|scope| {
        let shared = &shared;
        let bytes_read = &bytes_read;
        let head = scope.spawn(move || {
            let _close = CloseOnDrop {
                shared,
                subsystem: Subsystem::Head,
            };
            let push = |event| shared.push_head(event, stall_timeout);
            produce(&mut head_source, Subsystem::Head, push, bytes_read)
        });
        let tail = scope.spawn(move || {
            let _close = CloseOnDrop {
                shared,
                subsystem: Subsystem::Tail,
            };
            let push = |event| shared.push_tail(event, stall_timeout);
            produce(&mut tail_source, Subsystem::Tail, push, bytes_read)
        });

        let consumed = consume(shared, sink, bytes_read, &mut progress);
        if consumed.is_err() {
            // Nobody is resolving any more; release producers waiting on a full queue
            shared.close(Subsystem::Head);
            shared.close(Subsystem::Tail);
        }
        (head.join(), tail.join(), consumed)
    });

    let mut emitted = consumed?;
    let mut matcher = shared.into_inner();
    emitted += matcher.drain(sink)? as u64;
    let diagnostics = matcher.diagnostics().clone();
    spdlog::info!(
        "Resolved {} events: {} coincidences, {} head singles, {} tail singles",
        diagnostics.events_resolved(),
        diagnostics.n_coinc,
        diagnostics.head_singles.total(),
        diagnostics.tail_singles.total()
    );

    head_result.map_err(|_| ProcessorError::ProducerPanic(Subsystem::Head))??;
    tail_result.map_err(|_| ProcessorError::ProducerPanic(Subsystem::Tail))??;

    Ok(CorrelationSummary {
        diagnostics,
        emitted,
    })
}

/// Correlate the head and tail streams of a single run.
///
/// Writes the coincidence listing and the diagnostics report to the output directory.
pub fn process_run(
    config: &Config,
    run_number: i32,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<(), ProcessorError> {
    let head_stack = StreamStack::new(&config.get_head_directory(run_number)?, HEAD_FILE_PREFIX)?;
    let tail_stack = StreamStack::new(&config.get_tail_directory(run_number)?, TAIL_FILE_PREFIX)?;
    let total_data_size = head_stack.total_stack_size_bytes + tail_stack.total_stack_size_bytes;
    spdlog::info!(
        "Total run size: {}",
        human_bytes::human_bytes(total_data_size as f64)
    );

    let listing_path = config.get_listing_file_name(run_number)?;
    let report_path = config.get_report_file_name(run_number)?;
    let mut sink = ListingSink::create(&listing_path, config.clock_mhz)?;
    let matcher = CoincidenceMatcher::new(config.window_ticks, config.queue_capacity)
        .with_clock(config.clock_mhz);

    tx.send(WorkerStatus::new(
        0.0,
        run_number,
        *worker_id,
        WorkerStage::Correlating,
    ))?;
    let flush_frac: f32 = 0.01;
    let mut last_progress: f32 = 0.0;
    let report_progress = |bytes: u64| -> Result<(), ProcessorError> {
        if total_data_size == 0 {
            return Ok(());
        }
        let progress = bytes as f32 / total_data_size as f32;
        if progress - last_progress > flush_frac {
            last_progress = progress;
            tx.send(WorkerStatus::new(
                progress,
                run_number,
                *worker_id,
                WorkerStage::Correlating,
            ))?;
        }
        Ok(())
    };

    let summary = match correlate(
        matcher,
        head_stack,
        tail_stack,
        &mut sink,
        config.stall_timeout(),
        report_progress,
    ) {
        Ok(summary) => summary,
        Err(e) => {
            tx.send(WorkerStatus::new(
                1.0,
                run_number,
                *worker_id,
                WorkerStage::Failed,
            ))?;
            return Err(e);
        }
    };

    tx.send(WorkerStatus::new(
        1.0,
        run_number,
        *worker_id,
        WorkerStage::Draining,
    ))?;
    let lines = sink.lines_written();
    sink.finish()?;
    std::fs::write(&report_path, serde_yaml::to_string(&summary.diagnostics)?)?;
    spdlog::info!(
        "Wrote {lines} lines to {} and diagnostics to {}",
        listing_path.to_string_lossy(),
        report_path.to_string_lossy()
    );

    tx.send(WorkerStatus::new(
        1.0,
        run_number,
        *worker_id,
        WorkerStage::Finished,
    ))?;
    Ok(())
}

/// The function to be called by a separate thread (typically the UI).
/// Allows multiple runs to be processed
pub fn process(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<(), ProcessorError> {
    let runs = (config.first_run_number..(config.last_run_number + 1)).collect();
    process_subset(config, tx, worker_id, runs)
}

/// Process a subset of runs
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<i32>,
) -> Result<(), ProcessorError> {
    config.validate()?;
    for run in subset {
        if config.does_run_exist(run) {
            spdlog::info!("Processing run {}...", run);
            process_run(&config, run, &tx, &worker_id)?;
            spdlog::info!("Finished processing run {}.", run);
        } else {
            spdlog::info!("Run {} does not exist, skipping...", run);
        }
    }
    Ok(())
}

/// Divide a run range in to a set of subranges (per thread/worker)
pub fn create_subsets(config: &Config) -> Vec<Vec<i32>> {
    let mut subsets: Vec<Vec<i32>> = vec![Vec::new(); config.n_threads.max(1) as usize];
    let n_subsets = subsets.len();

    for (idx, run) in (config.first_run_number..(config.last_run_number + 1)).enumerate() {
        subsets[idx % n_subsets].push(run)
    }

    subsets
}
