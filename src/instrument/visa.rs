//! VISA transport for USB/GPIB/LAN instruments.
//!
//! Wraps the `visa-rs` bindings. VISA calls are blocking, so each request runs
//! on Tokio's blocking pool while the session sits behind a mutex.
//!
//! Supports resource strings like:
//! - "USB0::0x1422::0x4480::152256401::INSTR" (USBTMC)
//! - "GPIB0::1::INSTR"
//! - "TCPIP0::192.168.1.100::INSTR"

use crate::error::{AppResult, DaqError};
use crate::instrument::ScpiTransport;
use async_trait::async_trait;
use std::ffi::CString;
use std::io::{BufRead, BufReader, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use visa_rs::prelude::*;

struct VisaSession {
    // Dropped before the resource manager that owns it.
    instr: Instrument,
    _rm: DefaultRM,
}

/// SCPI over a VISA session, LF terminated.
pub struct VisaTransport {
    resource: String,
    session: Arc<Mutex<Option<VisaSession>>>,
}

impl VisaTransport {
    /// Open `resource` through the default resource manager.
    pub fn open(resource: &str, timeout: Duration) -> AppResult<Self> {
        let rm = DefaultRM::new()
            .map_err(|e| DaqError::Instrument(format!("VISA resource manager: {e:?}")))?;
        let name = CString::new(resource).map_err(|_| {
            DaqError::Configuration(format!("Invalid VISA resource string '{resource}'"))
        })?;
        let instr = rm
            .open(&name.into(), AccessMode::NO_LOCK, timeout)
            .map_err(|e| DaqError::Instrument(format!("Failed to open {resource}: {e:?}")))?;

        tracing::info!(resource, "VISA session opened");

        Ok(Self {
            resource: resource.to_string(),
            session: Arc::new(Mutex::new(Some(VisaSession { instr, _rm: rm }))),
        })
    }

    async fn run<T, F>(&self, op: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut VisaSession) -> AppResult<T> + Send + 'static,
    {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            let mut guard = session
                .lock()
                .map_err(|_| DaqError::Instrument("VISA session lock poisoned".to_string()))?;
            let session = guard.as_mut().ok_or(DaqError::Disconnected)?;
            op(session)
        })
        .await
        .map_err(|e| DaqError::Instrument(format!("VISA task failed: {e}")))?
    }
}

fn send(session: &mut VisaSession, command: &str) -> AppResult<()> {
    let line = format!("{command}\n");
    session
        .instr
        .write_all(line.as_bytes())
        .map_err(|e| DaqError::Instrument(format!("VISA write '{command}' failed: {e}")))
}

#[async_trait]
impl ScpiTransport for VisaTransport {
    async fn query(&self, command: &str) -> AppResult<String> {
        let command = command.to_string();
        self.run(move |session| {
            send(session, &command)?;
            let mut response = String::new();
            BufReader::new(&session.instr)
                .read_line(&mut response)
                .map_err(|e| DaqError::Instrument(format!("VISA read '{command}' failed: {e}")))?;
            Ok(response)
        })
        .await
    }

    async fn write(&self, command: &str) -> AppResult<()> {
        let command = command.to_string();
        self.run(move |session| send(session, &command)).await
    }

    async fn close(&self) -> AppResult<()> {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            if let Ok(mut guard) = session.lock() {
                guard.take();
            }
        })
        .await
        .map_err(|e| DaqError::Instrument(format!("VISA task failed: {e}")))
    }

    fn describe(&self) -> String {
        self.resource.clone()
    }
}
