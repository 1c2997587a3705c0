//! # Wattmeter DAQ Core Library
//!
//! Core library for the `wattmeter_daq` binary. It polls an RF wattmeter over a
//! VISA/SCPI link, derives dBm and return-loss values, and records the samples
//! to CSV, either behind a live monitor window or as a timed headless log.
//!
//! ## Crate Structure
//!
//! - **`acquisition`**: the polling loops (`run_monitor`, `run_batch`) and the
//!   `Poller` that issues one tick's query sequence.
//! - **`config`**: `Settings` loaded from TOML and `WATTMETER_` environment variables.
//! - **`data`**: CSV storage with the fixed monitor and logger layouts.
//! - **`error`**: the `DaqError` enum for centralized error handling.
//! - **`gui`**: the eframe/egui monitor window.
//! - **`instrument`**: the `ScpiTransport` seam, the `Wattmeter` driver, the VISA
//!   transport and a simulated meter.
//! - **`measurement`**: `MeasurementSample`, `MeasurementBand` and the unit conversions.
//! - **`tracing_init`**: tracing-subscriber setup.

pub mod acquisition;
pub mod config;
pub mod data;
pub mod error;
pub mod gui;
pub mod instrument;
pub mod measurement;
pub mod tracing_init;
