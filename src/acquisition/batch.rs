//! Timed batch logger.
//!
//! Resets the meter, selects the band, then appends one row per iteration
//! until the wall-clock duration has elapsed. The duration is checked before
//! each iteration against the time stamp of the previous row, so the last row
//! may land slightly past it.

use super::Poller;
use crate::data::storage::CsvLog;
use crate::error::AppResult;
use crate::instrument::Wattmeter;
use crate::measurement::MeasurementBand;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Parameters of a batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Wall-clock logging duration
    pub duration: Duration,
    /// Band selected before logging
    pub band: MeasurementBand,
    /// Spacing of progress messages
    pub progress_interval: Duration,
    /// Optional cap on the number of rows
    pub max_samples: Option<u64>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(1800),
            band: MeasurementBand::Low,
            progress_interval: Duration::from_secs(60),
            max_samples: None,
        }
    }
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchSummary {
    /// Rows written
    pub rows: u64,
    /// Time stamp of the last row
    pub elapsed: Duration,
    /// True when stopped early by the shutdown signal
    pub interrupted: bool,
}

/// Run a batch log. A transport failure, during setup or while logging, ends
/// the run with that error after the meter and file are closed; rows already
/// written stay on disk.
pub async fn run_batch(
    meter: Wattmeter,
    mut log: CsvLog,
    options: BatchOptions,
    shutdown: watch::Receiver<bool>,
) -> AppResult<BatchSummary> {
    if let Err(e) = prepare(&meter, options.band).await {
        if let Err(close_err) = meter.close().await {
            warn!(error = %close_err, "Closing the meter failed");
        }
        if let Err(finish_err) = log.finish() {
            warn!(error = %finish_err, "Closing the CSV failed");
        }
        warn!(error = %e, "Meter setup failed, nothing logged");
        return Err(e);
    }

    let mut poller = Poller::new(meter);
    info!(
        duration_s = options.duration.as_secs_f64(),
        band = %options.band,
        path = %log.path().display(),
        "Testing started"
    );

    let mut elapsed = Duration::ZERO;
    let mut next_progress = options.progress_interval;
    let mut interrupted = false;
    let mut failure = None;

    while elapsed < options.duration {
        if *shutdown.borrow() {
            interrupted = true;
            break;
        }
        if options
            .max_samples
            .is_some_and(|max| log.rows_written() >= max)
        {
            break;
        }

        let sample = match poller.poll_readings().await {
            Ok(sample) => sample,
            Err(e) => {
                failure = Some(e);
                break;
            }
        };
        if let Err(e) = log.append(&sample) {
            failure = Some(e);
            break;
        }
        elapsed = sample.elapsed;

        if elapsed > next_progress {
            info!("Elapsed time: {:.3} s", elapsed.as_secs_f64());
            next_progress += options.progress_interval;
        }
    }

    if let Err(e) = poller.close().await {
        warn!(error = %e, "Closing the meter failed");
    }
    let rows = log.finish()?;

    if let Some(e) = failure {
        warn!(error = %e, rows, "Testing aborted");
        return Err(e);
    }

    info!(rows, elapsed_s = elapsed.as_secs_f64(), interrupted, "Testing ended");
    Ok(BatchSummary {
        rows,
        elapsed,
        interrupted,
    })
}

/// `*RST`, `*CLS`, then band selection, each followed by the settle delay.
async fn prepare(meter: &Wattmeter, band: MeasurementBand) -> AppResult<()> {
    meter.reset().await?;
    meter.select_band(band).await
}
