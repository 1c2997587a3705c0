//! Fetch-and-record loops.
//!
//! [`Poller`] issues the fixed query sequence of one tick and turns the
//! responses into a [`MeasurementSample`]. The two flows built on it:
//!
//! - [`monitor::run_monitor`]: full sequence on a fixed cadence, samples
//!   published to the window and appended to the monitor CSV.
//! - [`batch::run_batch`]: reset, band selection, then the short sequence as
//!   fast as the link allows until the duration has elapsed.

pub mod batch;
pub mod monitor;

use crate::error::AppResult;
use crate::instrument::Wattmeter;
use crate::measurement::{MeasurementSample, RawReadings};
use std::time::Instant;

pub use batch::{run_batch, BatchOptions, BatchSummary};
pub use monitor::{run_monitor, MonitorEvent, MonitorSummary};

/// Owns the meter for a session and numbers the samples it produces.
pub struct Poller {
    meter: Wattmeter,
    started: Instant,
    index: u64,
}

impl Poller {
    /// Start a session now.
    pub fn new(meter: Wattmeter) -> Self {
        Self {
            meter,
            started: Instant::now(),
            index: 0,
        }
    }

    /// The driver, for setup and shutdown calls.
    pub fn meter(&self) -> &Wattmeter {
        &self.meter
    }

    /// Number of samples produced so far.
    pub fn samples(&self) -> u64 {
        self.index
    }

    /// Monitor tick: `SYST:TIM?`, `FETC:FORW?`, `FETC:REFL?`, `FETC:VSWR?`,
    /// `FETC:TEMP?`, `SYST:TIM?`, `MEAS:BAND?`.
    ///
    /// On a transport error nothing is produced and the index is not advanced.
    pub async fn poll_full(&mut self) -> AppResult<MeasurementSample> {
        let system_uptime_ms = self.meter.system_time_ms().await?;
        let forward_w = self.meter.forward_power().await?;
        let reflected_w = self.meter.reflected_power().await?;
        let vswr = self.meter.vswr().await?;
        let temperature_c = self.meter.temperature().await?;
        let end_ms = self.meter.system_time_ms().await?;
        let band_code = self.meter.band_code().await?;

        let test_time_ms = match (system_uptime_ms, end_ms) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        };

        Ok(self.next_sample(RawReadings {
            band_code,
            forward_w,
            reflected_w,
            vswr,
            temperature_c,
            system_uptime_ms,
            test_time_ms,
        }))
    }

    /// Batch iteration: `FETC:FORW?`, `FETC:REFL?`, `FETC:VSWR?`, `FETC:TEMP?`.
    pub async fn poll_readings(&mut self) -> AppResult<MeasurementSample> {
        let forward_w = self.meter.forward_power().await?;
        let reflected_w = self.meter.reflected_power().await?;
        let vswr = self.meter.vswr().await?;
        let temperature_c = self.meter.temperature().await?;

        Ok(self.next_sample(RawReadings {
            forward_w,
            reflected_w,
            vswr,
            temperature_c,
            ..RawReadings::default()
        }))
    }

    fn next_sample(&mut self, raw: RawReadings) -> MeasurementSample {
        self.index += 1;
        MeasurementSample::from_readings(self.index, self.started.elapsed(), raw)
    }

    /// Close the meter, handing back the sample count.
    pub async fn close(self) -> AppResult<u64> {
        self.meter.close().await?;
        Ok(self.index)
    }
}
