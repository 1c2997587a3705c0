//! Simulated wattmeter for testing without physical hardware.
//!
//! `MockWattmeter` answers the same SCPI set as the real meter:
//! - forward power around 100 W with ±0.5 % noise
//! - VSWR around 1.2, reflected power consistent with it
//! - temperature drifting slowly upward from 30 °C
//! - an up-time clock that starts at a few hours
//!
//! Tests can queue scripted replies per command (including transport
//! failures) and inspect every command that was sent. Clones share state, so a
//! test keeps one handle while the driver owns another.

use crate::error::{AppResult, DaqError};
use crate::instrument::{scpi, ScpiTransport};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Identification string returned by the simulator.
pub const MOCK_IDN: &str = "Bird Technologies,4480A,MOCK0001,0.0.0";

/// A scripted reply for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Respond with this text
    Text(String),
    /// Fail with a transport error carrying this message
    Fail(String),
}

impl MockReply {
    /// Scripted text response.
    pub fn text(response: impl Into<String>) -> Self {
        MockReply::Text(response.into())
    }

    /// Scripted transport failure.
    pub fn fail(message: impl Into<String>) -> Self {
        MockReply::Fail(message.into())
    }
}

struct MockState {
    band: u8,
    forward_w: f64,
    vswr: f64,
    started: Instant,
    uptime_offset_ms: u64,
    rng: StdRng,
    scripted: HashMap<String, VecDeque<MockReply>>,
    commands: Vec<String>,
    closed: bool,
}

/// Simulated 4480 wattmeter.
#[derive(Clone)]
pub struct MockWattmeter {
    state: Arc<Mutex<MockState>>,
    latency: Duration,
}

impl Default for MockWattmeter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWattmeter {
    /// Create a simulator with an entropy-seeded noise source.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Create a simulator with reproducible noise.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                band: 0,
                forward_w: 100.0,
                vswr: 1.2,
                started: Instant::now(),
                uptime_offset_ms: 3 * 3600 * 1000,
                rng,
                scripted: HashMap::new(),
                commands: Vec::new(),
                closed: false,
            })),
            latency: Duration::ZERO,
        }
    }

    /// Delay every query and write by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue a reply for the next occurrence of `command`.
    ///
    /// Replies for the same command are consumed in order; once the queue is
    /// empty the simulator answers normally again.
    pub fn push_reply(&self, command: &str, reply: MockReply) {
        self.state()
            .scripted
            .entry(scpi::normalize(command))
            .or_default()
            .push_back(reply);
    }

    /// Change the nominal forward power and VSWR of the simulated load.
    pub fn set_load(&self, forward_w: f64, vswr: f64) {
        let mut state = self.state();
        state.forward_w = forward_w;
        state.vswr = vswr.max(1.0);
    }

    /// Every command sent so far, normalised, in order.
    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    /// Number of times `command` was sent.
    pub fn count(&self, command: &str) -> usize {
        let wanted = scpi::normalize(command);
        self.commands().iter().filter(|c| **c == wanted).count()
    }

    // Never held across an await.
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn handle(&self, command: &str, is_query: bool) -> AppResult<Option<String>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.state();
        if state.closed {
            return Err(DaqError::Disconnected);
        }

        let normalized = scpi::normalize(command);
        state.commands.push(normalized.clone());

        if let Some(reply) = state
            .scripted
            .get_mut(&normalized)
            .and_then(VecDeque::pop_front)
        {
            return match reply {
                MockReply::Text(text) => Ok(Some(format!("{text}\n"))),
                MockReply::Fail(message) => Err(DaqError::Instrument(message)),
            };
        }

        if is_query {
            state.answer(&normalized).map(|text| Some(format!("{text}\n")))
        } else {
            state.apply(&normalized);
            Ok(None)
        }
    }
}

impl MockState {
    fn answer(&mut self, query: &str) -> AppResult<String> {
        let elapsed = self.started.elapsed();
        match query {
            scpi::IDENTIFY => Ok(MOCK_IDN.to_string()),
            scpi::SYSTEM_TIME => Ok((self.uptime_offset_ms + elapsed.as_millis() as u64).to_string()),
            scpi::BAND_QUERY => Ok(self.band.to_string()),
            scpi::FETCH_FORWARD => Ok(format!("{:.4E}", self.noisy_forward())),
            scpi::FETCH_REFLECTED => {
                let gamma = (self.vswr - 1.0) / (self.vswr + 1.0);
                Ok(format!("{:.4E}", self.noisy_forward() * gamma * gamma))
            }
            scpi::FETCH_VSWR => {
                let jitter: f64 = self.rng.gen_range(-0.01..=0.01);
                Ok(format!("{:.4E}", (self.vswr + jitter).max(1.0)))
            }
            scpi::FETCH_TEMPERATURE => {
                let drift = (elapsed.as_secs_f64() / 600.0).min(15.0);
                Ok(format!("{:.2}", 30.0 + drift))
            }
            other => Err(DaqError::Instrument(format!(
                "mock: -113,\"Undefined header\" ({other})"
            ))),
        }
    }

    fn apply(&mut self, command: &str) {
        match command {
            scpi::RESET => self.band = 0,
            scpi::CLEAR_STATUS => {}
            other => match other.strip_prefix("MEAS:BAND ") {
                Some("0") => self.band = 0,
                Some("1") => self.band = 1,
                _ => tracing::warn!("Unknown mock command: {}", command),
            },
        }
    }

    fn noisy_forward(&mut self) -> f64 {
        let noise: f64 = self.rng.gen_range(-0.005..=0.005);
        (self.forward_w * (1.0 + noise)).max(0.0)
    }
}

#[async_trait]
impl ScpiTransport for MockWattmeter {
    async fn query(&self, command: &str) -> AppResult<String> {
        tracing::debug!("Mock SCPI query: {}", command);
        Ok(self.handle(command, true).await?.unwrap_or_default())
    }

    async fn write(&self, command: &str) -> AppResult<()> {
        tracing::debug!("Mock SCPI write: {}", command);
        self.handle(command, false).await.map(|_| ())
    }

    async fn close(&self) -> AppResult<()> {
        self.state().closed = true;
        Ok(())
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::conversions::parse_reading;

    #[tokio::test]
    async fn test_identify() {
        let mock = MockWattmeter::with_seed(1);
        assert_eq!(mock.query("*idn?").await.unwrap().trim(), MOCK_IDN);
    }

    #[tokio::test]
    async fn test_readings_are_physical() {
        let mock = MockWattmeter::with_seed(1);
        let forward = parse_reading(&mock.query(scpi::FETCH_FORWARD).await.unwrap()).unwrap();
        let reflected =
            parse_reading(&mock.query(scpi::FETCH_REFLECTED).await.unwrap()).unwrap();
        let vswr = parse_reading(&mock.query(scpi::FETCH_VSWR).await.unwrap()).unwrap();

        assert!((99.0..=101.0).contains(&forward));
        assert!(reflected > 0.0 && reflected < forward);
        assert!(vswr >= 1.0);
    }

    #[tokio::test]
    async fn test_band_write_and_reset() {
        let mock = MockWattmeter::with_seed(1);
        mock.write("MEAS:BAND 1").await.unwrap();
        assert_eq!(mock.query(scpi::BAND_QUERY).await.unwrap().trim(), "1");
        mock.write(scpi::RESET).await.unwrap();
        assert_eq!(mock.query(scpi::BAND_QUERY).await.unwrap().trim(), "0");
    }

    #[tokio::test]
    async fn test_scripted_replies_are_consumed_in_order() {
        let mock = MockWattmeter::with_seed(1);
        mock.push_reply(scpi::FETCH_VSWR, MockReply::text("1.50"));
        mock.push_reply(scpi::FETCH_VSWR, MockReply::fail("VI_ERROR_TMO"));

        assert_eq!(mock.query(scpi::FETCH_VSWR).await.unwrap().trim(), "1.50");
        assert!(mock.query(scpi::FETCH_VSWR).await.is_err());
        assert!(mock.query(scpi::FETCH_VSWR).await.is_ok());
        assert_eq!(mock.count(scpi::FETCH_VSWR), 3);
    }

    #[tokio::test]
    async fn test_script_while_query_in_flight() {
        let mock = MockWattmeter::with_seed(1).with_latency(Duration::from_millis(20));
        let in_flight = {
            let mock = mock.clone();
            tokio::spawn(async move { mock.query(scpi::FETCH_FORWARD).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        mock.push_reply(scpi::FETCH_VSWR, MockReply::text("2.00"));

        in_flight.await.unwrap().unwrap();
        assert_eq!(mock.query(scpi::FETCH_VSWR).await.unwrap().trim(), "2.00");
        assert_eq!(mock.commands().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_query_is_an_error() {
        let mock = MockWattmeter::with_seed(1);
        assert!(mock.query("FETC:PEAK?").await.is_err());
    }

    #[tokio::test]
    async fn test_set_load_zero_power() {
        let mock = MockWattmeter::with_seed(1);
        mock.set_load(0.0, 1.0);
        let forward = parse_reading(&mock.query(scpi::FETCH_FORWARD).await.unwrap()).unwrap();
        assert_eq!(forward, 0.0);
    }
}
