//! Response decoding.
//!
//! Every query is answered with a fixed number of ASCII bytes. Numeric
//! fields are parsed strictly: empty fields, trailing garbage and values
//! that overflow are errors, never zero.

use crate::{Error, Result};
use std::str::FromStr;

/// First byte of a temperature response when the sensor is out of range.
pub const TEMPERATURE_OUT_OF_RANGE: u8 = b'T';

/// Fixed properties reported by the capability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Columns per line (1-99).
    pub width: u8,
    /// Number of lines (1-99).
    pub height: u8,
    pub has_real_time_clock: bool,
    /// User ROM size in kbit, 0 if the module reported no usable code.
    pub rom_size_kbit: u32,
    pub has_light_sensor: bool,
    pub has_thermal_sensor: bool,
}

impl DeviceCapabilities {
    /// Number of character cells on the display.
    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Unit of a temperature reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl std::fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemperatureUnit::Celsius => write!(f, "C"),
            TemperatureUnit::Fahrenheit => write!(f, "F"),
        }
    }
}

/// On-board temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Temperature {
    pub value: u16,
    pub unit: TemperatureUnit,
}

impl std::fmt::Display for Temperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} deg {}", self.value, self.unit)
    }
}

/// Outcome of a sensor or setting query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorReading<T> {
    /// The device reported a value.
    Value(T),
    /// The device reported that the value is outside what it can measure.
    OutOfRange,
    /// The module is not fitted with this sensor.
    Unsupported,
}

impl<T> SensorReading<T> {
    /// Returns the reported value, if any.
    pub fn value(self) -> Option<T> {
        match self {
            SensorReading::Value(v) => Some(v),
            SensorReading::OutOfRange | SensorReading::Unsupported => None,
        }
    }
}

impl<T: std::fmt::Display> std::fmt::Display for SensorReading<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorReading::Value(v) => write!(f, "{}", v),
            SensorReading::OutOfRange => write!(f, "out of range"),
            SensorReading::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Parses an ASCII decimal field.
///
/// Leading blanks are skipped. Anything else that is not a digit fails.
fn parse_decimal<T: FromStr>(field: &[u8]) -> Option<T> {
    let text = std::str::from_utf8(field).ok()?;
    let text = text.trim_start_matches(|c: char| c.is_ascii_whitespace());
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Decodes the ROM size code: `2^(code - '1')` kbit.
pub fn rom_size_kbit(code: u8) -> u32 {
    code.checked_sub(b'1')
        .and_then(|exponent| 1u32.checked_shl(exponent as u32))
        .unwrap_or(0)
}

/// Decodes the 11-byte capability response.
///
/// Layout: width (2 digits), height (2 digits), clock flag, ROM size code,
/// light sensor flag, thermal sensor flag, padding.
pub fn parse_capabilities(raw: &[u8]) -> Result<DeviceCapabilities> {
    let malformed = || Error::CapabilityParse(String::from_utf8_lossy(raw).into_owned());

    if raw.len() < 8 {
        return Err(malformed());
    }

    let dimension = |field: &[u8]| parse_decimal::<u8>(field).filter(|v| (1..=99).contains(v));
    let width = dimension(&raw[0..2]).ok_or_else(malformed)?;
    let height = dimension(&raw[2..4]).ok_or_else(malformed)?;

    Ok(DeviceCapabilities {
        width,
        height,
        has_real_time_clock: raw[4] == b'1',
        rom_size_kbit: rom_size_kbit(raw[5]),
        has_light_sensor: raw[6] == b'1',
        has_thermal_sensor: matches!(raw[7], b'1' | b'2'),
    })
}

/// Decodes the 5-byte temperature response.
///
/// Bytes 0-2 hold the value, byte 3 ends the field and byte 4 is `C` for
/// Celsius; anything else means Fahrenheit.
pub fn parse_temperature(raw: &[u8]) -> Result<SensorReading<Temperature>> {
    let malformed = || Error::SensorParse {
        sensor: "temperature",
        raw: String::from_utf8_lossy(raw).into_owned(),
    };

    if raw.first() == Some(&TEMPERATURE_OUT_OF_RANGE) {
        return Ok(SensorReading::OutOfRange);
    }
    if raw.len() < 5 {
        return Err(malformed());
    }

    let value = parse_decimal::<u16>(&raw[0..3]).ok_or_else(malformed)?;
    let unit = if raw[4] == b'C' {
        TemperatureUnit::Celsius
    } else {
        TemperatureUnit::Fahrenheit
    };

    Ok(SensorReading::Value(Temperature { value, unit }))
}

/// Decodes a level (1-255) stored from `offset` to the end of the response.
fn parse_level(raw: &[u8], offset: usize, sensor: &'static str) -> Result<SensorReading<u8>> {
    let level = raw
        .get(offset..)
        .and_then(parse_decimal::<u8>)
        .ok_or_else(|| Error::SensorParse {
            sensor,
            raw: String::from_utf8_lossy(raw).into_owned(),
        })?;

    if level == 0 {
        return Ok(SensorReading::OutOfRange);
    }
    Ok(SensorReading::Value(level))
}

/// Decodes the 5-byte contrast response.
pub fn parse_contrast(raw: &[u8]) -> Result<SensorReading<u8>> {
    parse_level(raw, 2, "contrast")
}

/// Decodes the 7-byte brightness response.
pub fn parse_brightness(raw: &[u8]) -> Result<SensorReading<u8>> {
    parse_level(raw, 4, "brightness")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capabilities() {
        let caps = parse_capabilities(b"2008020    ").unwrap();
        assert_eq!(caps.width, 20);
        assert_eq!(caps.height, 8);
        assert_eq!(caps.rom_size_kbit, 2);
        assert!(!caps.has_real_time_clock);
        assert!(!caps.has_light_sensor);
        assert!(!caps.has_thermal_sensor);
        assert_eq!(caps.cells(), 160);
    }

    #[test]
    fn test_parse_capabilities_flags() {
        let caps = parse_capabilities(b"20041312   ").unwrap();
        assert_eq!((caps.width, caps.height), (20, 4));
        assert!(caps.has_real_time_clock);
        assert_eq!(caps.rom_size_kbit, 4);
        assert!(caps.has_light_sensor);
        assert!(caps.has_thermal_sensor);

        let caps = parse_capabilities(b"20040101   ").unwrap();
        assert!(caps.has_thermal_sensor);
    }

    #[test]
    fn test_parse_capabilities_rejects_bad_dimensions() {
        assert!(matches!(
            parse_capabilities(b"2x04020    "),
            Err(Error::CapabilityParse(_))
        ));
        assert!(parse_capabilities(b"0004020    ").is_err());
        assert!(parse_capabilities(b"2004").is_err());
    }

    #[test]
    fn test_rom_size_formula() {
        assert_eq!(rom_size_kbit(b'1'), 1);
        assert_eq!(rom_size_kbit(b'2'), 2);
        assert_eq!(rom_size_kbit(b'4'), 8);
        assert_eq!(rom_size_kbit(b'0'), 0);
        assert_eq!(rom_size_kbit(0xFF), 0);
    }

    #[test]
    fn test_parse_temperature() {
        let reading = parse_temperature(b"0721C").unwrap();
        assert_eq!(
            reading,
            SensorReading::Value(Temperature {
                value: 72,
                unit: TemperatureUnit::Celsius
            })
        );

        let reading = parse_temperature(b"098 F").unwrap();
        assert_eq!(reading.value().unwrap().unit, TemperatureUnit::Fahrenheit);
    }

    #[test]
    fn test_parse_temperature_out_of_range() {
        assert_eq!(
            parse_temperature(b"T0721").unwrap(),
            SensorReading::OutOfRange
        );
        assert_eq!(parse_temperature(b"Txxxx").unwrap(), SensorReading::OutOfRange);
    }

    #[test]
    fn test_parse_temperature_strict() {
        assert!(matches!(
            parse_temperature(b"07x1C"),
            Err(Error::SensorParse { .. })
        ));
        assert!(parse_temperature(b"   1C").is_err());
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!(parse_contrast(b"C 128").unwrap(), SensorReading::Value(128));
        assert_eq!(parse_contrast(b"xx001").unwrap(), SensorReading::Value(1));
        assert_eq!(
            parse_brightness(b"BR  254").unwrap(),
            SensorReading::Value(254)
        );
        assert_eq!(parse_brightness(b"BR: 000").unwrap(), SensorReading::OutOfRange);
    }

    #[test]
    fn test_parse_levels_strict() {
        assert!(parse_contrast(b"C 12x").is_err());
        assert!(parse_contrast(b"C    ").is_err());
        assert!(parse_contrast(b"C 999").is_err());
        assert!(parse_brightness(b"BR").is_err());
    }

    #[test]
    fn test_reading_display() {
        let reading = SensorReading::Value(Temperature {
            value: 31,
            unit: TemperatureUnit::Celsius,
        });
        assert_eq!(reading.to_string(), "31 deg C");
        assert_eq!(SensorReading::<u8>::Unsupported.to_string(), "unsupported");
    }
}
