use clap::Parser;
use diskramp::bench::{BenchmarkEvent, WriteScalingBenchmark};
use diskramp::config::BenchmarkConfig;
use diskramp::error::{is_volume_failure, user_friendly_message};
use diskramp::io::ScratchDir;
use diskramp::models::BenchmarkReport;
use diskramp::util::{format_bytes, parse_bytes, parse_duration, StopWatch};
use diskramp::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "diskramp")]
#[command(author, version, about = "Find how many concurrent sequential writers a volume can sustain")]
struct Cli {
    /// Directory on the volume to test (created and removed if missing)
    target: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bytes per write call, e.g. "100MiB"
    #[arg(long, value_parser = parse_portion_size)]
    portion_size: Option<usize>,

    /// Writes of the portion per file
    #[arg(long)]
    portions: Option<u32>,

    /// Target duration of a single-writer pass, e.g. "2s"
    #[arg(long, value_parser = parse_duration)]
    time_budget: Option<Duration>,

    /// Consecutive slower phases that end the scan
    #[arg(long)]
    max_slow_phases: Option<u8>,

    /// Highest writer count to try
    #[arg(long)]
    max_threads: Option<usize>,

    /// Flush every file to stable storage before stopping its timer
    #[arg(long)]
    sync: bool,

    /// Leave the benchmark files on disk
    #[arg(long)]
    keep_files: bool,

    /// Write the full report as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_portion_size(input: &str) -> std::result::Result<usize, String> {
    let bytes = parse_bytes(input)?;
    usize::try_from(bytes).map_err(|_| format!("Portion size too large: {}", input))
}

impl Cli {
    fn apply(&self, mut config: BenchmarkConfig) -> BenchmarkConfig {
        if let Some(target) = &self.target {
            config = config.with_target_dir(target.clone());
        }
        if let Some(size) = self.portion_size {
            config = config.with_portion_size(size);
        }
        if let Some(count) = self.portions {
            config = config.with_portions_count(count);
        }
        if let Some(budget) = self.time_budget {
            config = config.with_time_budget(budget);
        }
        if let Some(count) = self.max_slow_phases {
            config = config.with_max_slow_phases(count);
        }
        if let Some(count) = self.max_threads {
            config = config.with_max_threads(count);
        }
        if self.sync {
            config = config.with_sync_data(true);
        }
        if self.keep_files {
            config = config.with_keep_files(true);
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(&cli).await {
        Ok(report) => {
            println!("\n{}", report.summary());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Benchmark failed: {}", e);
            if is_volume_failure(&e) {
                eprintln!("Write test aborted: {}", user_friendly_message(&e));
            } else {
                eprintln!("Error: {}", user_friendly_message(&e));
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<BenchmarkReport> {
    let config = cli.apply(BenchmarkConfig::load(cli.config.as_deref())?);

    let mut scratch = ScratchDir::prepare(config.target_dir.clone())?;
    if config.keep_files {
        scratch.keep_on_drop();
    }

    let benchmark = WriteScalingBenchmark::new(config)?;
    let (tx, rx) = mpsc::channel(100);
    let progress = tokio::spawn(render_progress(rx));

    let outcome = benchmark.run(tx).await;
    progress.await.ok();
    let report = outcome?;

    if let Some(path) = &cli.json {
        report.write_json(path)?;
        info!("Report written to {}", path.display());
    }

    drop(scratch);
    Ok(report)
}

/// Print one block per phase while a spinner shows what is running
async fn render_progress(mut rx: mpsc::Receiver<BenchmarkEvent>) {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));

    while let Some(event) = rx.recv().await {
        match event {
            BenchmarkEvent::GeneratingData { portion_size } => {
                pb.set_message(format!("Generating {} of random data", format_bytes(portion_size as u64)));
            }
            BenchmarkEvent::Calibrated {
                baseline,
                initial_portion_size,
                portion_size,
            } => {
                pb.println(format!("1 thread: {}", baseline.speed_line()));
                if portion_size < initial_portion_size {
                    pb.println(format!(
                        "Portion size reduced from {} to {}",
                        format_bytes(initial_portion_size as u64),
                        format_bytes(portion_size as u64)
                    ));
                }
            }
            BenchmarkEvent::PhaseStarted { thread_count } => {
                pb.set_message(format!("Writing with {} threads", thread_count));
            }
            BenchmarkEvent::PhaseCompleted(result) => {
                pb.println(format!("{} threads:", result.thread_count));
                for (i, elapsed) in result.writer_elapsed.iter().enumerate() {
                    pb.println(format!("  thread {}: {}", i + 1, StopWatch::duration_to_ms_string(*elapsed)));
                }
                pb.println(format!("  {}", result.speed_line()));
            }
            BenchmarkEvent::PhaseFailed { thread_count, message } => {
                pb.println(format!("{} threads: failed ({})", thread_count, message));
            }
            BenchmarkEvent::Finished {
                max_thread_count_tested,
            } => {
                pb.println(format!("Max thread count tested: {}", max_thread_count_tested));
            }
        }
    }
    pb.finish_and_clear();
}
