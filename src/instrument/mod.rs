//! Instrument access: the SCPI transport seam, the wattmeter driver and its
//! transports.
//!
//! ```text
//! acquisition loop ──► Wattmeter ──► dyn ScpiTransport ──► VisaTransport (USB/VISA)
//!                                                     └──► MockWattmeter (simulated)
//! ```

use crate::error::AppResult;
use async_trait::async_trait;

pub mod mock;
pub mod scpi;
#[cfg(feature = "instrument_visa")]
pub mod visa;
pub mod wattmeter;

pub use mock::{MockReply, MockWattmeter};
pub use wattmeter::Wattmeter;

/// Trait for SCPI communication transports.
///
/// Abstracts the underlying communication mechanism so the driver issues the
/// same command sequence against real hardware and the simulator. Commands are
/// passed without terminator; the transport appends its own.
#[async_trait]
pub trait ScpiTransport: Send + Sync {
    /// Send a query command and return the raw response line.
    async fn query(&self, command: &str) -> AppResult<String>;

    /// Send a command without expecting a response.
    async fn write(&self, command: &str) -> AppResult<()>;

    /// Release the underlying session. Further I/O fails with `Disconnected`.
    async fn close(&self) -> AppResult<()>;

    /// Short description for logs (resource string or "mock").
    fn describe(&self) -> String;
}

/// Open the transport selected by the settings.
///
/// `mock = true` always yields the simulator. Otherwise the VISA backend is
/// used, which must be compiled in with `--features instrument_visa`.
pub fn open_transport(
    settings: &crate::config::Settings,
) -> AppResult<Box<dyn ScpiTransport>> {
    if settings.instrument.mock {
        tracing::info!("Using simulated wattmeter");
        return Ok(Box::new(
            MockWattmeter::new().with_latency(std::time::Duration::from_millis(20)),
        ));
    }

    #[cfg(feature = "instrument_visa")]
    {
        let transport =
            visa::VisaTransport::open(&settings.instrument.resource, settings.query_timeout())?;
        Ok(Box::new(transport))
    }

    #[cfg(not(feature = "instrument_visa"))]
    {
        Err(crate::error::DaqError::FeatureNotEnabled(
            "instrument_visa".to_string(),
        ))
    }
}
