//! Integration tests for the timed batch logger against the simulated meter.

use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use wattmeter_daq::acquisition::{run_batch, BatchOptions};
use wattmeter_daq::data::storage::LOGGER_HEADER;
use wattmeter_daq::data::{CsvLayout, CsvLog};
use wattmeter_daq::error::DaqError;
use wattmeter_daq::instrument::{scpi, MockReply, MockWattmeter, Wattmeter};
use wattmeter_daq::measurement::MeasurementBand;

fn meter(mock: &MockWattmeter) -> Wattmeter {
    Wattmeter::new(Box::new(mock.clone()), Duration::from_millis(500)).with_settle(Duration::ZERO)
}

fn options(duration: Duration) -> BatchOptions {
    BatchOptions {
        duration,
        band: MeasurementBand::Low,
        progress_interval: Duration::from_millis(20),
        max_samples: None,
    }
}

fn read_rows(path: &std::path::Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .expect("Failed to read CSV");
    reader
        .records()
        .map(|r| r.expect("Bad CSV record").iter().map(String::from).collect())
        .collect()
}

#[tokio::test]
async fn test_setup_sequence_precedes_readings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.csv");
    let mock = MockWattmeter::with_seed(21);
    let (_tx, shutdown) = watch::channel(false);

    let mut opts = options(Duration::from_secs(60));
    opts.band = MeasurementBand::High;
    opts.max_samples = Some(2);

    let log = CsvLog::create(&path, CsvLayout::Logger).unwrap();
    run_batch(meter(&mock), log, opts, shutdown).await.unwrap();

    let commands = mock.commands();
    assert_eq!(
        commands[..4],
        [
            scpi::RESET.to_string(),
            scpi::CLEAR_STATUS.to_string(),
            scpi::select_band(MeasurementBand::High),
            scpi::FETCH_FORWARD.to_string(),
        ]
    );
    assert_eq!(mock.count(scpi::SYSTEM_TIME), 0);
    assert_eq!(mock.count(scpi::BAND_QUERY), 0);
}

#[tokio::test]
async fn test_runs_until_duration_elapsed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.csv");
    let mock = MockWattmeter::with_seed(22).with_latency(Duration::from_millis(2));
    let (_tx, shutdown) = watch::channel(false);
    let duration = Duration::from_millis(150);

    let log = CsvLog::create(&path, CsvLayout::Logger).unwrap();
    let summary = run_batch(meter(&mock), log, options(duration), shutdown)
        .await
        .unwrap();

    assert!(!summary.interrupted);
    assert!(summary.rows > 0);
    assert!(summary.elapsed >= duration);
    assert_eq!(mock.count(scpi::FETCH_VSWR) as u64, summary.rows);

    let rows = read_rows(&path);
    assert_eq!(rows[0], LOGGER_HEADER);
    assert_eq!(rows.len() as u64, summary.rows + 1);

    let times: Vec<f64> = rows[1..].iter().map(|r| r[0].parse().unwrap()).collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    // Only the last row may land past the duration
    let limit = duration.as_secs_f64();
    assert!(times[..times.len() - 1].iter().all(|t| *t < limit));
    for row in &rows[1..] {
        assert_eq!(row.len(), LOGGER_HEADER.len());
        assert_eq!(row[0].split('.').nth(1).map(str::len), Some(3));
    }
}

#[tokio::test]
async fn test_max_samples_caps_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.csv");
    let mock = MockWattmeter::with_seed(23);
    let (_tx, shutdown) = watch::channel(false);

    let mut opts = options(Duration::from_secs(600));
    opts.max_samples = Some(5);

    let log = CsvLog::create(&path, CsvLayout::Logger).unwrap();
    let summary = run_batch(meter(&mock), log, opts, shutdown).await.unwrap();

    assert_eq!(summary.rows, 5);
    assert_eq!(read_rows(&path).len(), 6);
}

#[tokio::test]
async fn test_transport_failure_aborts_and_keeps_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.csv");
    let mock = MockWattmeter::with_seed(24);
    for _ in 0..3 {
        mock.push_reply(scpi::FETCH_TEMPERATURE, MockReply::text("31.25"));
    }
    mock.push_reply(scpi::FETCH_TEMPERATURE, MockReply::fail("VI_ERROR_CONN_LOST"));
    let (_tx, shutdown) = watch::channel(false);

    let log = CsvLog::create(&path, CsvLayout::Logger).unwrap();
    let result = run_batch(meter(&mock), log, options(Duration::from_secs(600)), shutdown).await;

    match result {
        Err(DaqError::Instrument(msg)) => assert!(msg.contains("VI_ERROR_CONN_LOST")),
        other => panic!("Expected an instrument error, got {other:?}"),
    }

    let rows = read_rows(&path);
    assert_eq!(rows.len(), 4);
    assert!(rows[1..].iter().all(|r| r[5] == "31.25"));

    // Meter was closed on the way out
    assert!(meter(&mock).vswr().await.is_err());
}

#[tokio::test]
async fn test_unparseable_reading_does_not_abort() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.csv");
    let mock = MockWattmeter::with_seed(25);
    mock.push_reply(scpi::FETCH_FORWARD, MockReply::text("OVER"));
    let (_tx, shutdown) = watch::channel(false);

    let mut opts = options(Duration::from_secs(600));
    opts.max_samples = Some(2);

    let log = CsvLog::create(&path, CsvLayout::Logger).unwrap();
    let summary = run_batch(meter(&mock), log, opts, shutdown).await.unwrap();

    assert_eq!(summary.rows, 2);
    let rows = read_rows(&path);
    assert_eq!(rows[1][1], "N/A");
    assert_ne!(rows[2][1], "N/A");
}

#[tokio::test]
async fn test_shutdown_signal_interrupts_run() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.csv");
    let mock = MockWattmeter::with_seed(26);
    let (_tx, shutdown) = watch::channel(true);

    let log = CsvLog::create(&path, CsvLayout::Logger).unwrap();
    let summary = run_batch(meter(&mock), log, options(Duration::from_secs(600)), shutdown)
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.rows, 0);
    assert_eq!(read_rows(&path).len(), 1);
}

#[tokio::test]
async fn test_reused_file_is_appended_with_new_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.csv");
    let (_tx, shutdown) = watch::channel(false);

    for seed in [27, 28] {
        let mock = MockWattmeter::with_seed(seed);
        let mut opts = options(Duration::from_secs(600));
        opts.max_samples = Some(2);
        let log = CsvLog::create(&path, CsvLayout::Logger).unwrap();
        run_batch(meter(&mock), log, opts, shutdown.clone())
            .await
            .unwrap();
    }

    let rows = read_rows(&path);
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0], LOGGER_HEADER);
    assert_eq!(rows[3], LOGGER_HEADER);
}
