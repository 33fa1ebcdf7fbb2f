//! Character LCD module.
//!
//! Provides control over SureElec character displays via a serial line.

mod device;

pub mod framebuffer;
pub mod protocol;
pub mod response;

pub use device::{LcdSession, SessionOptions, SessionState};
pub use framebuffer::Framebuffer;
pub use protocol::{Command, Query};
pub use response::{DeviceCapabilities, SensorReading, Temperature, TemperatureUnit};
