//! # tstamp_merger_cli
//!
//! Part of the tstamp_merger crate family.
//!
//! Command line application that correlates the head and tail event streams of a range of
//! runs and writes a coincidence listing and a diagnostics report for each.
//!
//! ## Use
//!
//! Make a template configuration, fill it out, and then run it:
//!
//! ```bash
//! tstamp_merger_cli -p config.yaml new
//! tstamp_merger_cli -p config.yaml
//! ```
//!
//! Progress is shown per worker. Details are written to `tstamp_merger.log`.
use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use libtstamp_merger::config::Config;
use libtstamp_merger::process::{create_subsets, process_subset};
use libtstamp_merger::worker_status::{WorkerStage, WorkerStatus};

fn make_template_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

fn init_logging() -> Result<(), spdlog::Error> {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./tstamp_merger.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()?,
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()?,
    );
    spdlog::set_default_logger(logger);
    Ok(())
}

fn bar_style(stage: WorkerStage) -> ProgressStyle {
    let template = format!(
        "{{prefix}} [{{bar:40.{}}}] {{pos:>3}}% {{msg}}",
        stage.bar_color()
    );
    ProgressStyle::with_template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn update_bar(bar: &ProgressBar, status: &WorkerStatus) {
    bar.set_style(bar_style(status.stage));
    bar.set_position((status.progress * 100.0) as u64);
    bar.set_message(format!("{} run {}", status.stage, status.run_number));
}

fn main() {
    // Create a cli
    let matches = Command::new("tstamp_merger_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    if let Err(e) = init_logging() {
        eprintln!("Could not create the log file: {e}");
        return;
    }
    spdlog::info!("Starting tstamp_merger_cli");

    let config_path = match matches.get_one::<String>("path") {
        Some(p) => PathBuf::from(p),
        None => {
            eprintln!("A configuration path is required (-p/--path)");
            return;
        }
    };

    if let Some(("new", _)) = matches.subcommand() {
        spdlog::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => println!("Wrote template config to {}", config_path.display()),
            Err(e) => {
                spdlog::error!("Could not write the template config: {e}");
                eprintln!("Could not write the template config: {e}");
            }
        }
        return;
    }

    // Load our config
    spdlog::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path).and_then(|c| {
        c.validate()?;
        Ok(c)
    }) {
        Ok(c) => c,
        Err(e) => {
            spdlog::error!("{e}");
            eprintln!("{e}");
            return;
        }
    };
    spdlog::info!("Config successfully loaded.");
    spdlog::info!("Head Path: {}", config.head_path.to_string_lossy());
    spdlog::info!("Tail Path: {}", config.tail_path.to_string_lossy());
    spdlog::info!("Output Path: {}", config.output_path.to_string_lossy());
    spdlog::info!(
        "Window: {} ticks at {} MHz, queue capacity {}",
        config.window_ticks,
        config.clock_mhz,
        config.queue_capacity
    );
    spdlog::info!(
        "First Run: {} Last Run: {}",
        config.first_run_number,
        config.last_run_number
    );

    // One bar and one thread per worker
    let pb_manager = MultiProgress::new();
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let subsets = create_subsets(&config);
    let mut bars = Vec::with_capacity(subsets.len());
    let mut workers = Vec::with_capacity(subsets.len());
    for (idx, subset) in subsets.into_iter().enumerate() {
        let bar = pb_manager.add(ProgressBar::new(100));
        bar.set_style(bar_style(WorkerStage::Correlating));
        bar.set_prefix(format!("Worker {idx}"));
        bars.push(bar);

        if subset.is_empty() {
            continue;
        }
        let conf = config.clone();
        let worker_tx = tx.clone();
        workers.push((
            idx,
            std::thread::spawn(move || process_subset(conf, worker_tx, idx, subset)),
        ));
    }
    // The loop below ends once every worker has dropped its sender
    drop(tx);

    for status in rx.iter() {
        if let Some(bar) = bars.get(status.worker_id) {
            update_bar(bar, &status);
        }
    }

    let mut failed = false;
    for (idx, worker) in workers {
        match worker.join() {
            Ok(Ok(())) => (),
            Ok(Err(e)) => {
                failed = true;
                spdlog::error!("Worker {idx} failed: {e}");
            }
            Err(_) => {
                failed = true;
                spdlog::error!("An error occured joining one of the workers!");
            }
        }
    }
    for bar in bars.iter() {
        bar.finish();
    }

    if failed {
        eprintln!("Correlation failed; see tstamp_merger.log for details");
    } else {
        spdlog::info!("Successfully correlated data!");
    }
    spdlog::info!("Done.");
}
