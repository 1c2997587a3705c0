//! Bird 4480-class Digital Wattmeter Driver
//!
//! Protocol Overview:
//! - Format: SCPI text queries, one response line each
//! - Transport: VISA USB resource (`USB0::0x1422::0x4480::<serial>::INSTR`)
//! - Readings: `FETC:FORW?`, `FETC:REFL?`, `FETC:VSWR?`, `FETC:TEMP?`
//! - Housekeeping: `SYST:TIM?` (up-time, ms), `MEAS:BAND?` / `MEAS:BAND <n>`
//!
//! # Error policy
//!
//! Transport failures (VISA status, timeout, closed session) are returned as
//! errors. A response that arrives but does not parse is *not* an error: the
//! reading comes back as `None` and a warning is logged.
//!
//! # Example Usage
//!
//! ```no_run
//! use wattmeter_daq::instrument::{MockWattmeter, Wattmeter};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let meter = Wattmeter::new(Box::new(MockWattmeter::new()), Duration::from_secs(2));
//!     let forward = meter.forward_power().await?;
//!     println!("Forward: {:?} W", forward);
//!     Ok(())
//! }
//! ```

use crate::error::{AppResult, DaqError};
use crate::instrument::{scpi, ScpiTransport};
use crate::measurement::conversions::{parse_count, parse_reading};
use crate::measurement::MeasurementBand;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Driver for the wattmeter.
///
/// Owns its transport exclusively; every call is one request/response on the
/// link.
pub struct Wattmeter {
    transport: Box<dyn ScpiTransport>,
    /// Per-query timeout
    timeout: Duration,
    /// Delay after reset and band selection
    settle: Duration,
}

impl Wattmeter {
    /// Create a driver over an already opened transport.
    pub fn new(transport: Box<dyn ScpiTransport>, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            settle: Duration::from_millis(1500),
        }
    }

    /// Set the settling delay used after `*RST`/`*CLS` and band selection.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Description of the underlying link.
    pub fn describe(&self) -> String {
        self.transport.describe()
    }

    /// Query the identification string.
    pub async fn identify(&self) -> AppResult<String> {
        let idn = self.query(scpi::IDENTIFY).await?;
        Ok(idn.trim().to_string())
    }

    /// Reset the meter and clear its status, then wait for it to settle.
    pub async fn reset(&self) -> AppResult<()> {
        self.write(scpi::RESET).await?;
        self.write(scpi::CLEAR_STATUS).await?;
        tokio::time::sleep(self.settle).await;
        info!("Wattmeter reset");
        Ok(())
    }

    /// Select the measurement band, then wait for it to settle.
    pub async fn select_band(&self, band: MeasurementBand) -> AppResult<()> {
        self.write(&scpi::select_band(band)).await?;
        tokio::time::sleep(self.settle).await;
        info!(band = %band, "Measurement band selected");
        Ok(())
    }

    /// Raw band code reported by `MEAS:BAND?`.
    pub async fn band_code(&self) -> AppResult<Option<i64>> {
        let response = self.query(scpi::BAND_QUERY).await?;
        Ok(checked(scpi::BAND_QUERY, &response, parse_count(&response)))
    }

    /// Forward average power in watts.
    pub async fn forward_power(&self) -> AppResult<Option<f64>> {
        self.query_reading(scpi::FETCH_FORWARD).await
    }

    /// Reflected average power in watts.
    pub async fn reflected_power(&self) -> AppResult<Option<f64>> {
        self.query_reading(scpi::FETCH_REFLECTED).await
    }

    /// Voltage standing wave ratio.
    pub async fn vswr(&self) -> AppResult<Option<f64>> {
        self.query_reading(scpi::FETCH_VSWR).await
    }

    /// Meter temperature in °C.
    pub async fn temperature(&self) -> AppResult<Option<f64>> {
        self.query_reading(scpi::FETCH_TEMPERATURE).await
    }

    /// Meter up-time in milliseconds.
    pub async fn system_time_ms(&self) -> AppResult<Option<u64>> {
        let response = self.query(scpi::SYSTEM_TIME).await?;
        let value = parse_count(&response).and_then(|ms| u64::try_from(ms).ok());
        Ok(checked(scpi::SYSTEM_TIME, &response, value))
    }

    /// Close the link. Safe to call more than once.
    pub async fn close(&self) -> AppResult<()> {
        self.transport.close().await?;
        info!(link = %self.transport.describe(), "Wattmeter connection closed");
        Ok(())
    }

    async fn query_reading(&self, command: &str) -> AppResult<Option<f64>> {
        let response = self.query(command).await?;
        Ok(checked(command, &response, parse_reading(&response)))
    }

    async fn query(&self, command: &str) -> AppResult<String> {
        let response = tokio::time::timeout(self.timeout, self.transport.query(command))
            .await
            .map_err(|_| DaqError::Timeout {
                command: command.to_string(),
            })??;
        debug!(command, response = response.trim(), "SCPI query");
        Ok(response)
    }

    async fn write(&self, command: &str) -> AppResult<()> {
        tokio::time::timeout(self.timeout, self.transport.write(command))
            .await
            .map_err(|_| DaqError::Timeout {
                command: command.to_string(),
            })??;
        debug!(command, "SCPI write");
        Ok(())
    }
}

fn checked<T>(command: &str, response: &str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        warn!(command, response = response.trim(), "Unparseable response, recording N/A");
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{MockReply, MockWattmeter};
    use tracing_test::traced_test;

    fn meter(mock: &MockWattmeter) -> Wattmeter {
        Wattmeter::new(Box::new(mock.clone()), Duration::from_millis(500))
            .with_settle(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_readings_parse() {
        let mock = MockWattmeter::with_seed(7);
        mock.push_reply(scpi::FETCH_FORWARD, MockReply::text("+1.0050E+02"));
        let meter = meter(&mock);

        assert_eq!(meter.forward_power().await.unwrap(), Some(100.5));
        assert!(meter.vswr().await.unwrap().unwrap() >= 1.0);
        assert!(meter.system_time_ms().await.unwrap().is_some());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_malformed_response_is_none() {
        let mock = MockWattmeter::with_seed(7);
        mock.push_reply(scpi::FETCH_TEMPERATURE, MockReply::text("-113,\"Undefined header\""));
        mock.push_reply(scpi::BAND_QUERY, MockReply::text("X"));
        let meter = meter(&mock);

        assert_eq!(meter.temperature().await.unwrap(), None);
        assert_eq!(meter.band_code().await.unwrap(), None);
        assert!(logs_contain("Unparseable response"));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let mock = MockWattmeter::with_seed(7);
        mock.push_reply(scpi::FETCH_REFLECTED, MockReply::fail("VI_ERROR_IO"));
        let meter = meter(&mock);

        let err = meter.reflected_power().await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let mock = MockWattmeter::with_seed(7).with_latency(Duration::from_millis(200));
        let meter = Wattmeter::new(Box::new(mock), Duration::from_millis(20));

        match meter.forward_power().await {
            Err(DaqError::Timeout { command }) => assert_eq!(command, scpi::FETCH_FORWARD),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reset_and_band_commands() {
        let mock = MockWattmeter::with_seed(7);
        let meter = meter(&mock);

        meter.reset().await.unwrap();
        meter.select_band(MeasurementBand::High).await.unwrap();

        assert_eq!(
            mock.commands(),
            vec!["*RST".to_string(), "*CLS".to_string(), "MEAS:BAND 1".to_string()]
        );
        assert_eq!(meter.band_code().await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_close_disconnects() {
        let mock = MockWattmeter::with_seed(7);
        let meter = meter(&mock);

        meter.close().await.unwrap();
        assert!(matches!(
            meter.forward_power().await,
            Err(DaqError::Disconnected)
        ));
    }
}
