//! The eframe/egui monitor window.
//!
//! The window never talks to the meter. It drains [`MonitorEvent`]s from the
//! polling task every frame and signals shutdown when it is dropped.
mod plot;

use crate::acquisition::MonitorEvent;
use crate::error::{AppResult, DaqError};
use crate::measurement::MeasurementSample;
use eframe::egui::{self, Align, Color32, Layout, RichText};
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};

use self::plot::PowerHistory;

/// Window title.
pub const WINDOW_TITLE: &str = "Bird Technologies 4480";

const BACKGROUND: Color32 = Color32::from_rgb(0x06, 0x2f, 0x6e);
const FOREGROUND: Color32 = Color32::WHITE;
const TEXT_SIZE: f32 = 16.0;
const HEADING_SIZE: f32 = 20.0;

/// Label column of the readings grid, top to bottom.
pub const READING_LABELS: [&str; 11] = [
    "Measurment Band:",
    "Forward Average Power (W):",
    "Reflected Average Power (W):",
    "Forward Average Power (dBm):",
    "Reflected Average Power (dBm):",
    "VSWR:",
    "Return Loss:",
    "Temp (C):",
    "Measurment Count:",
    "Test Time (ms):",
    "System Up Time:",
];

/// Value column for a sample, in [`READING_LABELS`] order. Empty before the
/// first sample arrives.
pub fn reading_values(sample: Option<&MeasurementSample>) -> [String; 11] {
    let Some(sample) = sample else {
        return Default::default();
    };
    let cells = sample.cells();
    [
        sample.band_label(),
        cells.forward_w,
        cells.reflected_w,
        cells.forward_dbm,
        cells.reflected_dbm,
        cells.vswr,
        cells.return_loss_db,
        cells.temperature_c,
        sample.index.to_string(),
        sample.test_time_text(),
        sample.uptime_hhmmss(),
    ]
}

/// The monitor window state.
pub struct MonitorApp {
    events: mpsc::Receiver<MonitorEvent>,
    shutdown: watch::Sender<bool>,
    latest: Option<MeasurementSample>,
    status: String,
    last_failure: Option<String>,
    stopped: bool,
    history: PowerHistory,
}

impl MonitorApp {
    /// Creates the window state around the polling task's channels.
    pub fn new(
        events: mpsc::Receiver<MonitorEvent>,
        shutdown: watch::Sender<bool>,
        history_len: usize,
    ) -> Self {
        Self {
            events,
            shutdown,
            latest: None,
            status: "Connecting...".to_string(),
            last_failure: None,
            stopped: false,
            history: PowerHistory::new(history_len),
        }
    }

    /// Latest sample shown.
    pub fn latest(&self) -> Option<&MeasurementSample> {
        self.latest.as_ref()
    }

    /// Status line text.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Fetches pending events from the polling task.
    pub fn drain_events(&mut self) {
        loop {
            let event = match self.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.stopped {
                        self.stopped = true;
                        self.status = "Polling stopped".to_string();
                    }
                    break;
                }
            };
            match event {
                MonitorEvent::Connected { link, identity } => {
                    self.status = match identity {
                        Some(idn) => format!("Connected: {idn} ({link})"),
                        None => format!("Connected ({link})"),
                    };
                }
                MonitorEvent::Sample(sample) => {
                    self.last_failure = None;
                    self.history.push(&sample);
                    if self.status.starts_with("Poll failed") {
                        self.status = "Connected".to_string();
                    }
                    self.latest = Some(sample);
                }
                MonitorEvent::PollFailed(message) => {
                    self.status = format!("Poll failed: {message}");
                    self.last_failure = Some(message);
                }
                MonitorEvent::Stopped { rows } => {
                    self.stopped = true;
                    self.status = match &self.last_failure {
                        Some(message) => format!("Stopped after {rows} rows: {message}"),
                        None => format!("Stopped after {rows} rows"),
                    };
                }
            }
        }
    }

    fn readings_grid(&self, ui: &mut egui::Ui) {
        let values = reading_values(self.latest.as_ref());
        egui::Grid::new("readings")
            .num_columns(2)
            .spacing([20.0, 10.0])
            .show(ui, |ui| {
                for (label, value) in READING_LABELS.iter().zip(values.iter()) {
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(text(label));
                    });
                    ui.label(text(value));
                    ui.end_row();
                }
            });
    }
}

impl Drop for MonitorApp {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

impl eframe::App for MonitorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();

        let panel_frame = egui::Frame::default()
            .fill(BACKGROUND)
            .inner_margin(egui::Margin::same(12.0));

        egui::TopBottomPanel::bottom("status_panel")
            .frame(panel_frame)
            .show(ctx, |ui| {
                ui.label(RichText::new(&self.status).color(FOREGROUND));
            });

        egui::CentralPanel::default()
            .frame(panel_frame)
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.label(
                        RichText::new("4480 Wattmeter")
                            .size(HEADING_SIZE)
                            .strong()
                            .underline()
                            .color(FOREGROUND),
                    );
                });
                ui.add_space(20.0);
                self.readings_grid(ui);
                ui.add_space(12.0);
                plot::power_plot(ui, &self.history);
            });

        // Keep draining the channel while no input events arrive
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

fn text(value: &str) -> RichText {
    RichText::new(value)
        .size(TEXT_SIZE)
        .strong()
        .color(FOREGROUND)
}

/// Open the window and block until it is closed.
pub fn run_window(app: MonitorApp) -> AppResult<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size([560.0, 760.0]),
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(|_cc| Ok(Box::new(app))),
    )
    .map_err(|e| DaqError::Gui(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::RawReadings;

    fn sample(index: u64) -> MeasurementSample {
        MeasurementSample::from_readings(
            index,
            Duration::from_secs(index),
            RawReadings {
                band_code: Some(1),
                forward_w: Some(10.0),
                reflected_w: Some(0.1),
                vswr: Some(1.22),
                temperature_c: Some(29.5),
                system_uptime_ms: Some(7_200_000),
                test_time_ms: Some(18),
            },
        )
    }

    fn app() -> (MonitorApp, mpsc::Sender<MonitorEvent>, watch::Receiver<bool>) {
        let (tx, rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (MonitorApp::new(rx, shutdown_tx, 8), tx, shutdown_rx)
    }

    #[test]
    fn values_follow_label_order() {
        let values = reading_values(Some(&sample(4)));
        assert_eq!(values[0], "High Band 25 to 1000 MHz");
        assert_eq!(values[1], "10.00");
        assert_eq!(values[3], "40.00");
        assert_eq!(values[8], "4");
        assert_eq!(values[9], "18");
        assert_eq!(values[10], "02:00:00");
        assert!(reading_values(None).iter().all(String::is_empty));
    }

    #[test]
    fn drains_samples_and_status() {
        let (mut app, tx, _shutdown) = app();
        tx.try_send(MonitorEvent::Connected {
            link: "mock".into(),
            identity: Some("Bird".into()),
        })
        .unwrap();
        tx.try_send(MonitorEvent::PollFailed("VI_ERROR_TMO".into()))
            .unwrap();
        app.drain_events();
        assert!(app.status().starts_with("Poll failed"));

        tx.try_send(MonitorEvent::Sample(sample(1))).unwrap();
        tx.try_send(MonitorEvent::Sample(sample(2))).unwrap();
        app.drain_events();
        assert_eq!(app.latest().map(|s| s.index), Some(2));
        assert_eq!(app.status(), "Connected");
    }

    #[test]
    fn vanished_poller_is_reported() {
        let (mut app, tx, _shutdown) = app();
        tx.try_send(MonitorEvent::Connected {
            link: "mock".into(),
            identity: None,
        })
        .unwrap();
        drop(tx);
        app.drain_events();
        assert_eq!(app.status(), "Polling stopped");
    }

    #[test]
    fn stop_after_failure_keeps_the_reason() {
        let (mut app, tx, _shutdown) = app();
        tx.try_send(MonitorEvent::PollFailed("I/O error: disk full".into()))
            .unwrap();
        tx.try_send(MonitorEvent::Stopped { rows: 12 }).unwrap();
        drop(tx);
        app.drain_events();
        assert_eq!(app.status(), "Stopped after 12 rows: I/O error: disk full");
    }

    #[test]
    fn dropping_window_signals_shutdown() {
        let (app, _tx, shutdown) = app();
        drop(app);
        assert!(*shutdown.borrow());
    }
}
