//! CSV storage for measurement samples.
//!
//! Two fixed layouts exist, one per acquisition flow. Column names are kept
//! byte-for-byte from the files produced by earlier tooling so downstream
//! spreadsheets keep working, misspellings included.
use crate::error::AppResult;
use crate::measurement::MeasurementSample;
use chrono::{DateTime, TimeZone};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Header of the monitor log.
pub const MONITOR_HEADER: [&str; 11] = [
    "Measurment Band",
    "Forward Average Power (W)",
    "Reflected Average Power (W)",
    "Forward Average Power (dBm)",
    "Reflected Average Power (dBm)",
    "VSWR",
    "Return Loss (dB)",
    "Temp (C)",
    "Measurment Count",
    "TestTime (ms)",
    "System Up Time",
];

/// Header of the batch logger file.
pub const LOGGER_HEADER: [&str; 6] = [
    "Time (s)",
    "Fwd_Power (W)",
    "Refl_Power (W)",
    "VSWR",
    "Return Loss (dB)",
    "Temperature (deg C)",
];

/// Column layout and open mode of a CSV log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvLayout {
    /// Full sample, file truncated on open.
    Monitor,
    /// Elapsed time and the four fetched readings, file appended to.
    Logger,
}

impl CsvLayout {
    /// Header row of this layout.
    pub fn header(self) -> &'static [&'static str] {
        match self {
            CsvLayout::Monitor => &MONITOR_HEADER,
            CsvLayout::Logger => &LOGGER_HEADER,
        }
    }

    /// Render one sample as a record of this layout.
    pub fn record(self, sample: &MeasurementSample) -> Vec<String> {
        let cells = sample.cells();
        match self {
            CsvLayout::Monitor => vec![
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
            ],
            CsvLayout::Logger => vec![
                sample.elapsed_text(),
                cells.forward_w,
                cells.reflected_w,
                cells.vswr,
                cells.return_loss_db,
                cells.temperature_c,
            ],
        }
    }
}

/// File name of a batch log started at `started`.
pub fn batch_file_name<Tz>(started: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    started
        .format("rf_power_data_%Y-%m-%d_%H-%M-%S.csv")
        .to_string()
}

/// A CSV writer that flushes after every row.
pub struct CsvLog {
    path: PathBuf,
    layout: CsvLayout,
    writer: csv::Writer<Box<dyn Write + Send>>,
    rows: u64,
}

impl CsvLog {
    /// Open `path` with the given layout and write the header row.
    ///
    /// Missing parent directories are created.
    pub fn create(path: impl AsRef<Path>, layout: CsvLayout) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = match layout {
            CsvLayout::Monitor => File::create(&path)?,
            CsvLayout::Logger => OpenOptions::new().create(true).append(true).open(&path)?,
        };

        Self::from_writer(path, layout, file)
    }

    /// Write the header to an already opened sink. `path` only labels the log.
    pub fn from_writer(
        path: impl Into<PathBuf>,
        layout: CsvLayout,
        sink: impl Write + Send + 'static,
    ) -> AppResult<Self> {
        let path = path.into();
        let sink: Box<dyn Write + Send> = Box::new(sink);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(sink);
        writer.write_record(layout.header())?;
        writer.flush()?;

        tracing::info!(path = %path.display(), ?layout, "CSV log opened");

        Ok(Self {
            path,
            layout,
            writer,
            rows: 0,
        })
    }

    /// Append one sample and flush it to disk.
    pub fn append(&mut self, sample: &MeasurementSample) -> AppResult<()> {
        self.writer.write_record(self.layout.record(sample))?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Data rows written since open (header excluded).
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Path of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the file.
    pub fn finish(mut self) -> AppResult<u64> {
        self.writer.flush()?;
        tracing::info!(path = %self.path.display(), rows = self.rows, "CSV log closed");
        Ok(self.rows)
    }
}
