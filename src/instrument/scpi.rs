//! SCPI command set used with the 4480 wattmeter.

use crate::measurement::MeasurementBand;

/// Identification query
pub const IDENTIFY: &str = "*IDN?";
/// Reset to power-on defaults
pub const RESET: &str = "*RST";
/// Clear status and error queue
pub const CLEAR_STATUS: &str = "*CLS";
/// Meter up-time in milliseconds
pub const SYSTEM_TIME: &str = "SYST:TIM?";
/// Forward average power, W
pub const FETCH_FORWARD: &str = "FETC:FORW?";
/// Reflected average power, W
pub const FETCH_REFLECTED: &str = "FETC:REFL?";
/// VSWR
pub const FETCH_VSWR: &str = "FETC:VSWR?";
/// Meter temperature, °C
pub const FETCH_TEMPERATURE: &str = "FETC:TEMP?";
/// Active measurement band code (0 or 1)
pub const BAND_QUERY: &str = "MEAS:BAND?";

/// Command selecting a measurement band.
pub fn select_band(band: MeasurementBand) -> String {
    format!("MEAS:BAND {}", band.code())
}

/// Normalise a command for comparison: trimmed, upper case, single spaces.
pub fn normalize(command: &str) -> String {
    command
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_selection_command() {
        assert_eq!(select_band(MeasurementBand::Low), "MEAS:BAND 0");
        assert_eq!(select_band(MeasurementBand::High), "MEAS:BAND 1");
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize("  fetc:forw?\n"), "FETC:FORW?");
        assert_eq!(normalize("meas:band   1"), "MEAS:BAND 1");
    }
}
