//! The measurement sample record and the band indicator.

use super::conversions::{
    format_2dp, ms_to_hhmmss, round2, vswr_to_return_loss, watts_to_dbm, NOT_AVAILABLE,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Measurement band of the wattmeter element.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementBand {
    /// 2 to 30 MHz (`MEAS:BAND 0`)
    #[default]
    Low,
    /// 25 to 1000 MHz (`MEAS:BAND 1`)
    High,
}

impl MeasurementBand {
    /// Decode the `MEAS:BAND?` response code. Codes other than 0 and 1 have no band.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(MeasurementBand::Low),
            1 => Some(MeasurementBand::High),
            _ => None,
        }
    }

    /// Code used by `MEAS:BAND <n>`.
    pub fn code(self) -> u8 {
        match self {
            MeasurementBand::Low => 0,
            MeasurementBand::High => 1,
        }
    }

    /// Human readable label shown on screen and written to the CSV.
    pub fn label(self) -> &'static str {
        match self {
            MeasurementBand::Low => "Low Band 2 to 30 MHz",
            MeasurementBand::High => "High Band 25 to 1000 MHz",
        }
    }
}

impl fmt::Display for MeasurementBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Label for a raw band code, including codes the meter should never report.
pub fn band_label(code: Option<i64>) -> String {
    match code {
        Some(code) => match MeasurementBand::from_code(code) {
            Some(band) => band.label().to_string(),
            None => format!("Unknown band ({code})"),
        },
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Raw readings of one poll, before derived values are computed.
///
/// `None` marks a response that did not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawReadings {
    /// `MEAS:BAND?`
    pub band_code: Option<i64>,
    /// `FETC:FORW?` in watts
    pub forward_w: Option<f64>,
    /// `FETC:REFL?` in watts
    pub reflected_w: Option<f64>,
    /// `FETC:VSWR?`
    pub vswr: Option<f64>,
    /// `FETC:TEMP?` in °C
    pub temperature_c: Option<f64>,
    /// First `SYST:TIM?` of the poll, in ms
    pub system_uptime_ms: Option<u64>,
    /// Second `SYST:TIM?` minus the first, in ms
    pub test_time_ms: Option<u64>,
}

/// One row of acquired data: readings plus the values derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSample {
    /// 1-based count of successful polls in this session
    pub index: u64,
    /// Host time since the session started
    pub elapsed: Duration,
    /// Raw band code reported by the meter
    pub band_code: Option<i64>,
    /// Forward average power, W
    pub forward_w: Option<f64>,
    /// Reflected average power, W
    pub reflected_w: Option<f64>,
    /// Forward average power, dBm
    pub forward_dbm: Option<f64>,
    /// Reflected average power, dBm
    pub reflected_dbm: Option<f64>,
    /// Voltage standing wave ratio
    pub vswr: Option<f64>,
    /// Return loss derived from VSWR, dB
    pub return_loss_db: Option<f64>,
    /// Meter temperature, °C
    pub temperature_c: Option<f64>,
    /// Meter up-time at the start of the poll, ms
    pub system_uptime_ms: Option<u64>,
    /// Duration of the poll as measured by the meter clock, ms
    pub test_time_ms: Option<u64>,
}

impl MeasurementSample {
    /// Round readings to two decimals and compute the derived values.
    pub fn from_readings(index: u64, elapsed: Duration, raw: RawReadings) -> Self {
        let forward_w = raw.forward_w.map(round2);
        let reflected_w = raw.reflected_w.map(round2);
        let vswr = raw.vswr.map(round2);

        Self {
            index,
            elapsed,
            band_code: raw.band_code,
            forward_w,
            reflected_w,
            forward_dbm: forward_w.and_then(watts_to_dbm),
            reflected_dbm: reflected_w.and_then(watts_to_dbm),
            vswr,
            return_loss_db: vswr.and_then(vswr_to_return_loss),
            temperature_c: raw.temperature_c.map(round2),
            system_uptime_ms: raw.system_uptime_ms,
            test_time_ms: raw.test_time_ms,
        }
    }

    /// Decoded band, if the code is one the meter defines.
    pub fn band(&self) -> Option<MeasurementBand> {
        self.band_code.and_then(MeasurementBand::from_code)
    }

    /// Band label, `Unknown band (n)` or `N/A`.
    pub fn band_label(&self) -> String {
        band_label(self.band_code)
    }

    /// Meter up-time as `HH:MM:SS`.
    pub fn uptime_hhmmss(&self) -> String {
        self.system_uptime_ms
            .map(ms_to_hhmmss)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    /// Test time in ms as text.
    pub fn test_time_text(&self) -> String {
        self.test_time_ms
            .map(|ms| ms.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    /// Elapsed session time in seconds with millisecond resolution.
    pub fn elapsed_text(&self) -> String {
        format!("{:.3}", self.elapsed.as_secs_f64())
    }

    /// Text for the display/CSV cells that carry two-decimal readings.
    pub fn cells(&self) -> SampleCells {
        SampleCells {
            forward_w: format_2dp(self.forward_w),
            reflected_w: format_2dp(self.reflected_w),
            forward_dbm: format_2dp(self.forward_dbm),
            reflected_dbm: format_2dp(self.reflected_dbm),
            vswr: format_2dp(self.vswr),
            return_loss_db: format_2dp(self.return_loss_db),
            temperature_c: format_2dp(self.temperature_c),
        }
    }
}

/// Pre-formatted two-decimal cells of a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleCells {
    /// Forward power, W
    pub forward_w: String,
    /// Reflected power, W
    pub reflected_w: String,
    /// Forward power, dBm
    pub forward_dbm: String,
    /// Reflected power, dBm
    pub reflected_dbm: String,
    /// VSWR
    pub vswr: String,
    /// Return loss, dB
    pub return_loss_db: String,
    /// Temperature, °C
    pub temperature_c: String,
}
