//! Measurement records and the RF unit conversions applied to them.
//!
//! - [`conversions`] holds the pure formulas (W→dBm, VSWR→return loss, up-time
//!   formatting, response parsing).
//! - [`sample`] holds [`MeasurementSample`], the single record type produced by
//!   both acquisition flows, and [`MeasurementBand`].

pub mod conversions;
pub mod sample;

pub use conversions::{vswr_to_return_loss, watts_to_dbm, NOT_AVAILABLE};
pub use sample::{band_label, MeasurementBand, MeasurementSample, RawReadings, SampleCells};
