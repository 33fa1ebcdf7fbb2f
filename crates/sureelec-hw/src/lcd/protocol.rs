//! LCD protocol definitions and encoding.
//!
//! Protocol structure:
//! - Every command starts with the escape byte 0xFE followed by an opcode
//! - Parameters follow the opcode as raw bytes
//! - Line writes send a 4-byte header, then the line's characters
//! - Queries are answered with a fixed number of ASCII bytes

use std::time::Duration;

/// Command escape byte.
pub const ESCAPE: u8 = 0xFE;

/// Sequence that puts the module into a known state.
pub const INIT_SEQUENCE: [u8; 5] = [ESCAPE, b'S', b'u', b'r', b'e'];

/// Settle time after the init sequence.
pub const INIT_DELAY: Duration = Duration::from_millis(10);

/// Settle time after a command or before reading its response.
pub const COMMAND_DELAY: Duration = Duration::from_millis(10);

/// Settle time after writing one line.
pub const LINE_DELAY: Duration = Duration::from_millis(25);

/// Capability response length.
pub const CAPABILITIES_LEN: usize = 11;

/// Temperature response length.
pub const TEMPERATURE_LEN: usize = 5;

/// Contrast response length.
pub const CONTRAST_LEN: usize = 5;

/// Brightness response length.
pub const BRIGHTNESS_LEN: usize = 7;

/// Lowest level accepted for contrast and brightness.
pub const LEVEL_MIN: u8 = 1;

/// Highest level accepted for contrast and brightness.
pub const LEVEL_MAX: u8 = 255;

/// LCD command opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Write one line of characters.
    WriteLine = 0x47,
    /// Switch the display (backlight and characters) on or off.
    ToggleDisplay = 0x64,
    /// Set contrast level.
    SetContrast = 0x50,
    /// Set backlight brightness level.
    SetBrightness = 0x98,
    /// Report dimensions and fitted options.
    QueryCapabilities = 0x76,
    /// Report on-board temperature.
    QueryTemperature = 0x77,
    /// Report contrast level.
    QueryContrast = 0x63,
    /// Report brightness level.
    QueryBrightness = 0x62,
}

/// Commands that are answered by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Capabilities,
    Temperature,
    Contrast,
    Brightness,
}

impl Query {
    /// Returns the opcode that issues this query.
    pub fn command(&self) -> Command {
        match self {
            Query::Capabilities => Command::QueryCapabilities,
            Query::Temperature => Command::QueryTemperature,
            Query::Contrast => Command::QueryContrast,
            Query::Brightness => Command::QueryBrightness,
        }
    }

    /// Returns the number of bytes in the answer.
    pub fn response_len(&self) -> usize {
        match self {
            Query::Capabilities => CAPABILITIES_LEN,
            Query::Temperature => TEMPERATURE_LEN,
            Query::Contrast => CONTRAST_LEN,
            Query::Brightness => BRIGHTNESS_LEN,
        }
    }
}

/// Clamps a requested contrast or brightness level to 1-255.
pub fn clamp_level(value: i32) -> u8 {
    value.clamp(LEVEL_MIN as i32, LEVEL_MAX as i32) as u8
}

/// Builds the header that precedes a line's characters.
pub fn build_write_line_header(line: u8) -> [u8; 4] {
    [ESCAPE, Command::WriteLine as u8, 0x01, line]
}

/// Builds a display on/off toggle packet.
pub fn build_toggle_packet() -> [u8; 2] {
    [ESCAPE, Command::ToggleDisplay as u8]
}

/// Builds a set-contrast packet. The level must already be clamped.
pub fn build_contrast_packet(level: u8) -> [u8; 3] {
    [ESCAPE, Command::SetContrast as u8, level]
}

/// Builds a set-brightness packet. The level must already be clamped.
pub fn build_brightness_packet(level: u8) -> [u8; 3] {
    [ESCAPE, Command::SetBrightness as u8, level]
}

/// Builds a query packet.
pub fn build_query_packet(query: Query) -> [u8; 2] {
    [ESCAPE, query.command() as u8]
}
