//! SureElec LCD Hardware Library
//!
//! Host-side driver for SureElec character LCD modules attached over a
//! USB serial bridge. Provides the serial transport, the binary command
//! protocol, a local framebuffer mirror of the display, and the sensor
//! queries (temperature, contrast, brightness) the modules expose.

pub mod error;
pub mod lcd;
pub mod scroll;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, ErrorKind, Result};
pub use lcd::{
    DeviceCapabilities, Framebuffer, LcdSession, SensorReading, SessionOptions, SessionState,
    Temperature, TemperatureUnit,
};
pub use scroll::ScrollDirection;
pub use transport::{SerialLink, Transport};

/// Serial line speed used by the modules.
pub const BAUD_RATE: u32 = 9600;

/// Character written into cells that hold no text.
pub const PAD_BYTE: u8 = b' ';
