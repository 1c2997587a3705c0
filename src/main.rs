//! CLI Entry Point for wattmeter_daq
//!
//! Provides two subcommands sharing one configuration:
//! - `monitor`: live readings window, one poll per interval, every poll logged to CSV
//! - `log`: reset the meter, select a band, log to a time-stamped CSV for a fixed duration
//!
//! # Usage
//!
//! ```bash
//! wattmeter_daq monitor --output data_log.csv
//! wattmeter_daq log --duration-secs 600 --band high --output-dir /data/rf
//! wattmeter_daq log --mock --max-samples 100
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use wattmeter_daq::acquisition::{self, monitor::EVENT_CAPACITY, BatchOptions, Poller};
use wattmeter_daq::config::{Settings, DEFAULT_CONFIG_PATH};
use wattmeter_daq::data::{batch_file_name, CsvLayout, CsvLog};
use wattmeter_daq::gui::{self, MonitorApp};
use wattmeter_daq::instrument::{self, Wattmeter};
use wattmeter_daq::measurement::MeasurementBand;
use wattmeter_daq::tracing_init;

#[derive(Parser)]
#[command(name = "wattmeter_daq")]
#[command(about = "RF wattmeter monitor and CSV logger", long_about = None)]
struct Cli {
    /// Configuration file (TOML); a missing file means built-in defaults
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the live readings window
    Monitor {
        /// VISA resource string
        #[arg(long)]
        resource: Option<String>,

        /// CSV file (truncated on start)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Delay between polls in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Use the simulated meter
        #[arg(long)]
        mock: bool,
    },

    /// Log readings to a time-stamped CSV for a fixed duration
    Log {
        /// VISA resource string
        #[arg(long)]
        resource: Option<String>,

        /// Directory receiving the CSV file
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Logging duration in seconds
        #[arg(long)]
        duration_secs: Option<f64>,

        /// Measurement band to select before logging
        #[arg(long, value_enum)]
        band: Option<MeasurementBand>,

        /// Stop after this many rows even if time remains
        #[arg(long)]
        max_samples: Option<u64>,

        /// Use the simulated meter
        #[arg(long)]
        mock: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    if let Some(level) = cli.log_level {
        settings.application.log_level = level;
    }
    apply_overrides(&mut settings, &cli.command);
    settings.validate().context("Invalid configuration")?;

    tracing_init::init_from_settings(&settings)?;

    match cli.command {
        Commands::Monitor { .. } => run_monitor_window(settings).await,
        Commands::Log { max_samples, .. } => run_batch_log(settings, max_samples).await,
    }
}

fn apply_overrides(settings: &mut Settings, command: &Commands) {
    match command {
        Commands::Monitor {
            resource,
            output,
            interval_ms,
            mock,
        } => {
            if let Some(resource) = resource {
                settings.instrument.resource = resource.clone();
            }
            if let Some(output) = output {
                settings.monitor.output_path = output.clone();
            }
            if let Some(interval_ms) = interval_ms {
                settings.monitor.interval_ms = *interval_ms;
            }
            settings.instrument.mock |= *mock;
        }
        Commands::Log {
            resource,
            output_dir,
            duration_secs,
            band,
            mock,
            ..
        } => {
            if let Some(resource) = resource {
                settings.instrument.resource = resource.clone();
            }
            if let Some(output_dir) = output_dir {
                settings.logger.output_dir = output_dir.clone();
            }
            if let Some(duration_secs) = duration_secs {
                settings.logger.duration_secs = *duration_secs;
            }
            if let Some(band) = band {
                settings.logger.band = *band;
            }
            settings.instrument.mock |= *mock;
        }
    }
}

fn open_meter(settings: &Settings) -> Result<Wattmeter> {
    let transport = instrument::open_transport(settings).with_context(|| {
        format!(
            "Failed to open instrument {}",
            settings.instrument.resource
        )
    })?;
    Ok(Wattmeter::new(transport, settings.query_timeout()).with_settle(settings.settle_delay()))
}

async fn run_monitor_window(settings: Settings) -> Result<()> {
    let meter = open_meter(&settings)?;
    let log = CsvLog::create(&settings.monitor.output_path, CsvLayout::Monitor)
        .context("Failed to open monitor CSV")?;

    let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poll_task = tokio::spawn(acquisition::run_monitor(
        Poller::new(meter),
        log,
        settings.poll_interval(),
        event_tx,
        shutdown_rx,
    ));

    let app = MonitorApp::new(event_rx, shutdown_tx, settings.monitor.history_len);
    // Blocks until the window is closed; dropping the app stops the poller.
    let window_result = gui::run_window(app);

    let summary = poll_task.await.context("Polling task panicked")??;
    window_result?;

    info!(
        rows = summary.rows,
        failed_polls = summary.failed_polls,
        path = %settings.monitor.output_path.display(),
        "Monitor session finished"
    );
    Ok(())
}

async fn run_batch_log(settings: Settings, max_samples: Option<u64>) -> Result<()> {
    let meter = open_meter(&settings)?;

    let path = settings
        .logger
        .output_dir
        .join(batch_file_name(&chrono::Local::now()));
    let log = CsvLog::create(&path, CsvLayout::Logger)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current row");
            let _ = shutdown_tx.send(true);
        }
    });

    let options = BatchOptions {
        duration: settings.log_duration(),
        band: settings.logger.band,
        progress_interval: settings.progress_interval(),
        max_samples,
    };

    let summary = acquisition::run_batch(meter, log, options, shutdown_rx)
        .await
        .with_context(|| format!("Logging to {} failed", path.display()))?;

    println!(
        "Testing ended: {} rows over {:.3} s -> {}",
        summary.rows,
        summary.elapsed.as_secs_f64(),
        path.display()
    );
    Ok(())
}
