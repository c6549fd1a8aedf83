//! Command-line front end for turning CoMPASS list files into
//! time-of-flight gamma spectra.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tofspec_core::config::{micros_to_ps, ps_to_seconds, DEFAULT_NUM_CHANNELS};
use tofspec_core::{
    downsample, EngineConfig, Glitch, IntervalHistogram, SyncEngine, SyncStatistics,
    TotalSpectrum,
};
use tofspec_io::{time_cut, CompassFile, SpectrumWriter};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    TofspecIo(#[from] tofspec_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] tofspec_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no events after t = 0 in {0}, cannot normalise to live time")]
    NoLiveTime(PathBuf),
}

/// Time-of-flight gamma spectrum tools for pulsed-neutron list data.
#[derive(Parser)]
#[command(name = "tofspec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (debug logging; RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a gamma list into inelastic, epithermal and capture spectra
    Split(SplitArgs),

    /// Sum a list file into a total spectrum
    Total {
        /// Input list file
        input: PathBuf,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Number of energy channels
        #[arg(long, default_value_t = DEFAULT_NUM_CHANNELS)]
        channels: usize,

        /// Sum this many neighbouring channels per output bin
        #[arg(long, default_value = "1")]
        rebin: usize,
    },

    /// Histogram the time between consecutive events
    EventHist {
        /// Input list file
        input: PathBuf,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Copy a list file up to a given acquisition time
    Tcut {
        /// Input list file
        input: PathBuf,

        /// Output list file
        #[arg(short, long)]
        output: PathBuf,

        /// Cut time in seconds
        #[arg(long)]
        seconds: f64,
    },
}

#[derive(Args)]
struct SplitArgs {
    /// Trigger-pulse (TTL) list file
    pulse_file: PathBuf,

    /// Gamma list file
    gamma_file: PathBuf,

    /// Output CSV path
    #[arg(short, long)]
    output: PathBuf,

    /// JSON engine configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum pulse height of a trigger
    #[arg(long)]
    threshold: Option<u32>,

    /// End of the inelastic window (microseconds)
    #[arg(long)]
    epi_window_us: Option<f64>,

    /// End of the epithermal window (microseconds)
    #[arg(long)]
    capture_window_us: Option<f64>,

    /// Number of energy channels
    #[arg(long)]
    channels: Option<usize>,

    /// Sum this many neighbouring channels per output bin
    #[arg(long, default_value = "1")]
    rebin: usize,

    /// Write a JSON run summary here
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Serialize)]
struct RunSummary<'a> {
    pulse_file: &'a Path,
    gamma_file: &'a Path,
    config: &'a EngineConfig,
    live_seconds: f64,
    statistics: &'a SyncStatistics,
    glitches: &'a [Glitch],
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Split(args) => split(&args),
        Commands::Total {
            input,
            output,
            channels,
            rebin,
        } => total(&input, &output, channels, rebin),
        Commands::EventHist { input, output } => event_hist(&input, &output),
        Commands::Tcut {
            input,
            output,
            seconds,
        } => tcut(&input, &output, seconds),
    }
}

fn engine_config(args: &SplitArgs) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config = config.with_pulse_threshold(threshold);
    }
    if let Some(us) = args.epi_window_us {
        config = config.with_epithermal_window_ps(micros_to_ps(us)?);
    }
    if let Some(us) = args.capture_window_us {
        config = config.with_capture_window_ps(micros_to_ps(us)?);
    }
    if let Some(channels) = args.channels {
        config = config.with_num_channels(channels);
    }
    config.validate()?;
    Ok(config)
}

fn split(args: &SplitArgs) -> Result<()> {
    let config = engine_config(args)?;
    log::debug!("engine configuration: {:?}", config);

    let start = Instant::now();
    let pulses = CompassFile::open(&args.pulse_file)?;
    let gammas = CompassFile::open(&args.gamma_file)?;

    let result = SyncEngine::new(
        config.clone(),
        pulses.pulses(config.pulse_threshold),
        gammas.gamma_events(),
    )?
    .run()?;

    let live_seconds = result.live_seconds();
    if live_seconds <= 0.0 {
        return Err(CliError::NoLiveTime(args.gamma_file.clone()));
    }

    let rates = result
        .spectrum
        .downsample(args.rebin)?
        .scaled(1.0 / live_seconds);
    SpectrumWriter::create(&args.output)?.write_split_csv(&rates)?;

    if let Some(path) = &args.summary {
        let summary = RunSummary {
            pulse_file: &args.pulse_file,
            gamma_file: &args.gamma_file,
            config: &config,
            live_seconds,
            statistics: &result.statistics,
            glitches: &result.glitches,
        };
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), &summary)?;
    }

    let stats = &result.statistics;
    println!("Processed in {:.2}s", start.elapsed().as_secs_f64());
    println!("tmax = {} s", live_seconds);
    println!("Classified events: {}", stats.classified);
    println!("Pre-trigger events: {}", stats.pre_trigger);
    println!(
        "Glitches: {} gamma, {} pulse",
        stats.gamma_glitches, stats.pulse_glitches
    );
    Ok(())
}

fn total(input: &Path, output: &Path, channels: usize, rebin: usize) -> Result<()> {
    let file = CompassFile::open(input)?;
    let spectrum = TotalSpectrum::from_events(file.gamma_events(), channels)?;

    let live_seconds = ps_to_seconds(spectrum.last_time());
    if live_seconds <= 0.0 {
        return Err(CliError::NoLiveTime(input.to_path_buf()));
    }

    let rates: Vec<f64> = downsample(spectrum.counts(), rebin)?
        .into_iter()
        .map(|count| count / live_seconds)
        .collect();
    SpectrumWriter::create(output)?.write_total_csv(&rates)?;

    println!("tmax = {} s", live_seconds);
    println!("Events: {}", spectrum.events());
    Ok(())
}

fn event_hist(input: &Path, output: &Path) -> Result<()> {
    let file = CompassFile::open(input)?;
    let mut histogram = IntervalHistogram::new();
    for record in file.records() {
        histogram.record(record?.timetag);
    }

    SpectrumWriter::create(output)?.write_interval_csv(&histogram.fractions())?;

    println!("Binned intervals: {}", histogram.binned());
    println!("Bad intervals: {}", histogram.rejected());
    Ok(())
}

fn tcut(input: &Path, output: &Path, seconds: f64) -> Result<()> {
    let cut_ps = micros_to_ps(seconds * 1.0e6)?;
    let file = CompassFile::open(input)?;
    let summary = time_cut(&file, output, cut_ps)?;

    println!("Records kept: {}", summary.records);
    println!("tmax = {} s", ps_to_seconds(summary.last_time));
    Ok(())
}
