//! Unit conversions for RF power readings.
//!
//! All helpers are pure. Inputs that have no physical meaning (non-positive
//! power, NaN) produce `None`, which the display and CSV layers render as
//! [`NOT_AVAILABLE`].

/// Placeholder written wherever a value could not be read or derived.
pub const NOT_AVAILABLE: &str = "N/A";

/// Convert power in watts to dBm: `10·log10(W·1000)`.
///
/// Returns `None` for zero, negative or non-finite input.
pub fn watts_to_dbm(watts: f64) -> Option<f64> {
    if !watts.is_finite() || watts <= 0.0 {
        return None;
    }
    Some(10.0 * (watts * 1000.0).log10())
}

/// Convert VSWR to return loss in dB: `-20·log10((VSWR-1)/(VSWR+1))`.
///
/// A VSWR of 1 or below (perfect match, or a meter reading below its floor)
/// returns `0.0`. Non-finite input returns `None`.
pub fn vswr_to_return_loss(vswr: f64) -> Option<f64> {
    if !vswr.is_finite() {
        return None;
    }
    if vswr <= 1.0 {
        return Some(0.0);
    }
    Some(-20.0 * ((vswr - 1.0) / (vswr + 1.0)).log10())
}

/// Round to two decimal places, the resolution the meter readings are kept at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format an up-time in milliseconds as `HH:MM:SS`.
///
/// Hours are not wrapped at 24.
pub fn ms_to_hhmmss(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Parse a numeric SCPI response such as `"+1.2345E+02\n"`. `NaN` and
/// infinities are treated as unparseable.
pub fn parse_reading(response: &str) -> Option<f64> {
    response
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Parse an integer SCPI response. Some firmware renders integers as
/// floats (`"1.0"`), so an integral float is accepted too.
pub fn parse_count(response: &str) -> Option<i64> {
    let trimmed = response.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    let value = trimmed.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// Format an optional value with two decimals, or [`NOT_AVAILABLE`].
pub fn format_2dp(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => NOT_AVAILABLE.to_string(),
    }
}
