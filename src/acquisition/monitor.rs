//! Interactive monitor loop.
//!
//! One tick = one full poll, one CSV row, one event to the window. The next
//! tick is armed only after the current one completes, so ticks never
//! overlap. A transport failure skips the tick and is reported to the window;
//! polling continues on the next tick. Any other failure (the CSV can no longer
//! be written) stops polling: the meter is closed, the window is told why,
//! and the error is returned.

use super::Poller;
use crate::data::storage::CsvLog;
use crate::error::AppResult;
use crate::measurement::MeasurementSample;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Capacity of the monitor → window channel.
pub const EVENT_CAPACITY: usize = 256;

/// Messages from the polling task to the window.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// Link opened; identification if the meter answered `*IDN?`.
    Connected {
        /// Resource string or "mock"
        link: String,
        /// `*IDN?` response
        identity: Option<String>,
    },
    /// A completed poll.
    Sample(MeasurementSample),
    /// A poll that failed on the link.
    PollFailed(String),
    /// Polling ended.
    Stopped {
        /// Rows written to the CSV
        rows: u64,
    },
}

/// Outcome of a monitor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSummary {
    /// Rows written to the CSV
    pub rows: u64,
    /// Polls that failed on the link
    pub failed_polls: u64,
}

/// Poll every `interval` until `shutdown` turns true or the window goes away.
///
/// Closes the meter and the CSV before returning, on success and on error.
pub async fn run_monitor(
    mut poller: Poller,
    mut log: CsvLog,
    interval: Duration,
    events: mpsc::Sender<MonitorEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> AppResult<MonitorSummary> {
    let identity = match poller.meter().identify().await {
        Ok(idn) => Some(idn),
        Err(e) => {
            warn!(error = %e, "Identification query failed");
            None
        }
    };
    info!(link = %poller.meter().describe(), identity = ?identity, "Monitor started");
    publish(
        &events,
        MonitorEvent::Connected {
            link: poller.meter().describe(),
            identity,
        },
    );

    let mut failed_polls = 0;
    let mut failure = None;
    loop {
        if *shutdown.borrow() {
            break;
        }

        match poller.poll_full().await {
            Ok(sample) => {
                if let Err(e) = log.append(&sample) {
                    warn!(error = %e, "Writing the CSV failed, stopping");
                    publish(&events, MonitorEvent::PollFailed(e.to_string()));
                    failure = Some(e);
                    break;
                }
                debug!(index = sample.index, "Sample recorded");
                if !publish(&events, MonitorEvent::Sample(sample)) {
                    break;
                }
            }
            Err(e) if e.is_transport() => {
                failed_polls += 1;
                warn!(error = %e, "Poll failed, skipping tick");
                if !publish(&events, MonitorEvent::PollFailed(e.to_string())) {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "Poll failed, stopping");
                publish(&events, MonitorEvent::PollFailed(e.to_string()));
                failure = Some(e);
                break;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    if let Err(e) = poller.close().await {
        warn!(error = %e, "Closing the meter failed");
    }
    let rows = log.rows_written();
    if let Err(e) = log.finish() {
        failure.get_or_insert(e);
    }
    publish(&events, MonitorEvent::Stopped { rows });

    if let Some(e) = failure {
        warn!(error = %e, rows, "Monitor aborted");
        return Err(e);
    }
    info!(rows, failed_polls, "Monitor stopped");
    Ok(MonitorSummary { rows, failed_polls })
}

/// Returns false once the receiving side is gone.
fn publish(events: &mpsc::Sender<MonitorEvent>, event: MonitorEvent) -> bool {
    match events.try_send(event) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!("Window is behind, dropping display update");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::storage::CsvLayout;
    use crate::error::DaqError;
    use crate::instrument::{MockWattmeter, Wattmeter};
    use std::io::{self, Write};

    /// Accepts writes until the budget runs out.
    struct FullDisk {
        budget: usize,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.len() > self.budget {
                return Err(io::Error::other("No space left on device"));
            }
            self.budget -= buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_csv_failure_stops_and_closes_meter() {
        let mock = MockWattmeter::with_seed(5);
        let meter = Wattmeter::new(Box::new(mock.clone()), Duration::from_millis(500))
            .with_settle(Duration::ZERO);
        // Room for the header line and a few bytes, never a whole row
        let budget = CsvLayout::Monitor.header().join(",").len() + 8;
        let log = CsvLog::from_writer("full.csv", CsvLayout::Monitor, FullDisk { budget })
        .unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_monitor(Poller::new(meter), log, Duration::from_millis(5), tx, shutdown_rx),
        )
        .await
        .expect("Monitor kept running after the CSV failed");
        assert!(matches!(result, Err(DaqError::Io(_)) | Err(DaqError::Csv(_))));

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(matches!(events[0], MonitorEvent::Connected { .. }));
        assert!(matches!(&events[1], MonitorEvent::PollFailed(msg) if msg.contains("No space")));
        assert!(matches!(events[2], MonitorEvent::Stopped { rows: 0 }));

        // The meter was closed on the way out
        assert_eq!(mock.count(crate::instrument::scpi::FETCH_FORWARD), 1);
        let meter = Wattmeter::new(Box::new(mock), Duration::from_millis(100));
        assert!(matches!(meter.identify().await, Err(DaqError::Disconnected)));
    }
}
