//! Serial transport.
//!
//! Owns the open serial line. Writes are retried until every byte is out;
//! reads accumulate until the requested count arrives, each wait for data
//! bounded by a deadline. Responses routinely arrive split across several
//! deliveries, so a single read is never assumed to return a full answer.

use crate::{Error, Result, BAUD_RATE};
use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;
use tokio_serial::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info, warn};

/// Port deadline until the first read sets its own. Writes poll against it.
const PORT_TIMEOUT: Duration = Duration::from_secs(1);

/// Byte-level access to a serial line.
///
/// Implemented for serial ports opened through `tokio-serial`; tests supply
/// scripted links.
pub trait SerialLink {
    /// Writes some of `data`, returning how many bytes were accepted.
    fn write_some(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Waits up to `timeout` for input and reads what is available.
    ///
    /// Returns `Ok(0)` when the deadline passes with nothing to read.
    fn read_some(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Waits until written bytes have left the host.
    fn flush(&mut self) -> io::Result<()>;

    /// Drops anything sitting in the receive buffer.
    fn discard_input(&mut self) -> io::Result<()>;
}

impl SerialLink for Box<dyn SerialPort> {
    fn write_some(&mut self, data: &[u8]) -> io::Result<usize> {
        io::Write::write(self, data)
    }

    fn read_some(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.set_timeout(timeout).map_err(io::Error::from)?;
        match io::Read::read(self, buf) {
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(0)
            }
            other => other,
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(self)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// Serial transport for one LCD module.
pub struct Transport<L = Box<dyn SerialPort>> {
    link: L,
    /// Set when a read gave up early; late bytes of that response may still arrive.
    desynced: bool,
}

impl Transport {
    /// Opens and configures the serial line at `path`.
    ///
    /// The line runs raw at [`BAUD_RATE`], 8 data bits, no parity, one stop
    /// bit, no flow control, with modem control lines ignored.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let device = path.display().to_string();

        let probe = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| Error::OpenFailed {
                path: device.clone(),
                source,
            })?;
        if !probe.is_terminal() {
            debug!("Device {} is not a TTY", device);
            return Err(Error::NotATerminal(device));
        }
        drop(probe);

        // serialport applies raw mode with CLOCAL | CREAD when opening.
        let mut port = tokio_serial::new(device.as_str(), BAUD_RATE)
            .timeout(PORT_TIMEOUT)
            .open()
            .map_err(|e| Error::OpenFailed {
                path: device.clone(),
                source: io::Error::from(e),
            })?;

        configure(port.as_mut()).map_err(|source| Error::ConfigFailed {
            path: device.clone(),
            source,
        })?;

        info!("Serial port {} opened at {} baud", device, BAUD_RATE);
        Ok(Self::new(port))
    }
}

fn configure(port: &mut dyn SerialPort) -> std::result::Result<(), tokio_serial::Error> {
    port.set_baud_rate(BAUD_RATE)?;
    port.set_data_bits(DataBits::Eight)?;
    port.set_parity(Parity::None)?;
    port.set_stop_bits(StopBits::One)?;
    port.set_flow_control(FlowControl::None)?;
    Ok(())
}

impl<L: SerialLink> Transport<L> {
    /// Wraps an already configured link.
    pub fn new(link: L) -> Self {
        Self {
            link,
            desynced: false,
        }
    }

    /// Writes all of `data`, retrying partial writes.
    ///
    /// If an earlier read timed out, pending input is discarded first so the
    /// next response starts on a clean boundary.
    pub fn write_exact(&mut self, data: &[u8]) -> Result<usize> {
        if self.desynced {
            self.resync()?;
        }

        let mut written = 0;
        while written < data.len() {
            match self.link.write_some(&data[written..]) {
                Ok(0) => {
                    return Err(Error::WriteFailed(io::Error::from(
                        io::ErrorKind::WriteZero,
                    )))
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Cannot write to port: {}", e);
                    return Err(Error::WriteFailed(e));
                }
            }
        }
        self.link.flush().map_err(Error::WriteFailed)?;

        debug!("Wrote {} bytes: {:02X?}", written, data);
        Ok(written)
    }

    /// Reads exactly `count` bytes.
    ///
    /// Each wait for data is bounded by `timeout`; a wait that ends with
    /// nothing to read fails with [`Error::Timeout`].
    pub fn read_exact(&mut self, count: usize, timeout: Duration) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; count];
        let mut received = 0;

        while received < count {
            match self.link.read_some(&mut buf[received..], timeout) {
                Ok(0) => {
                    debug!("No answer from device after {} of {} bytes", received, count);
                    self.desynced = true;
                    return Err(Error::Timeout {
                        expected: count,
                        received,
                    });
                }
                Ok(n) => {
                    received += n;
                    debug!("Got {} bytes, up to {}", n, received);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.desynced = true;
                    return Err(Error::ReadFailed(e));
                }
            }
        }

        debug!("Buffer: {:?}", String::from_utf8_lossy(&buf));
        Ok(buf)
    }

    /// Discards unread input left over from an abandoned exchange.
    pub fn resync(&mut self) -> Result<()> {
        warn!("Discarding stale input after an incomplete response");
        self.link.discard_input().map_err(Error::ReadFailed)?;
        self.desynced = false;
        Ok(())
    }

    /// Returns true if a late response may still be pending on the line.
    pub fn is_desynced(&self) -> bool {
        self.desynced
    }

    /// Releases the serial line.
    pub fn close(self) {
        debug!("Closing serial transport");
        drop(self.link);
    }
}
