//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for the whole crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the kinds of errors that can occur while talking to the wattmeter and recording
//! its readings.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically TOML syntax errors or
//!   environment overrides that do not deserialize.
//! - **`Configuration`**: Semantic errors in the configuration, values that parse but
//!   make no sense (a zero poll interval, an unknown log level). Caught by
//!   `Settings::validate`.
//! - **`Io`**: Wraps `std::io::Error`, covering file I/O and raw transport I/O.
//! - **`Csv`**: Errors from the `csv` writer.
//! - **`Instrument`**: Communication failures reported by the transport (VISA status
//!   codes, closed sessions, unexpected EOF).
//! - **`Timeout`**: The instrument did not answer a query in time.
//! - **`Disconnected`**: I/O attempted after the session was closed.
//! - **`Gui`**: The monitor window could not be created or its event loop failed.
//! - **`FeatureNotEnabled`**: Functionality that was not compiled in (the VISA backend).
//!
//! Malformed *numeric* responses are not errors: the driver returns `None`, the
//! row records `N/A` and the acquisition loop keeps going.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Every failure the library reports.
#[derive(Error, Debug)]
pub enum DaqError {
    /// Configuration could not be read or deserialized
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration values out of range
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// File or raw transport I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Failure reported by the instrument link
    #[error("Instrument error: {0}")]
    Instrument(String),

    /// No response within the query timeout
    #[error("Timed out waiting for response to '{command}'")]
    Timeout {
        /// Command that went unanswered
        command: String,
    },

    /// I/O attempted after the session was closed
    #[error("Instrument connection is closed")]
    Disconnected,

    /// Monitor window failure
    #[error("GUI error: {0}")]
    Gui(String),

    /// Functionality not compiled in
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl From<figment::Error> for DaqError {
    fn from(value: figment::Error) -> Self {
        DaqError::Config(Box::new(value))
    }
}

impl DaqError {
    /// True for failures of the instrument link itself, as opposed to local
    /// problems with configuration or the output file.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DaqError::Instrument(_) | DaqError::Timeout { .. } | DaqError::Disconnected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_with_question_mark() {
        fn fails() -> AppResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        match fails() {
            Err(DaqError::Io(err)) => assert_eq!(err.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn transport_classification() {
        assert!(DaqError::Instrument("VI_ERROR_TMO".into()).is_transport());
        assert!(DaqError::Timeout {
            command: "FETC:FORW?".into()
        }
        .is_transport());
        assert!(DaqError::Disconnected.is_transport());
        assert!(!DaqError::Configuration("bad".into()).is_transport());
    }

    #[test]
    fn timeout_message_names_command() {
        let err = DaqError::Timeout {
            command: "SYST:TIM?".into(),
        };
        assert!(err.to_string().contains("SYST:TIM?"));
    }
}
