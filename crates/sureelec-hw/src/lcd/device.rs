//! LCD session over a serial transport.

use crate::scroll::ScrollDirection;
use crate::transport::{SerialLink, Transport};
use crate::{Error, Result};
use std::path::Path;
use std::time::Duration;
use tokio_serial::SerialPort;
use tracing::{debug, info, info_span, Span};

use super::framebuffer::Framebuffer;
use super::protocol::{
    build_brightness_packet, build_contrast_packet, build_query_packet, build_toggle_packet,
    build_write_line_header, clamp_level, Query, COMMAND_DELAY, INIT_DELAY, INIT_SEQUENCE,
    LINE_DELAY,
};
use super::response::{
    parse_brightness, parse_capabilities, parse_contrast, parse_temperature, DeviceCapabilities,
    SensorReading, Temperature,
};

/// Timing used by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Longest wait for each delivery of response bytes.
    pub read_timeout: Duration,
    /// Settle time after the init sequence.
    pub init_delay: Duration,
    /// Settle time after a command.
    pub command_delay: Duration,
    /// Settle time after each line write.
    pub line_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(1),
            init_delay: INIT_DELAY,
            command_delay: COMMAND_DELAY,
            line_delay: LINE_DELAY,
        }
    }
}

/// Lifecycle of a session.
///
/// A session value only ever reports `Ready` or `Closed`: the earlier
/// states exist while `open` runs, and a failed handshake returns an error
/// instead of a session. They show up in the session's debug log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Handshaking,
    Ready,
    Closed,
    Failed,
}

/// Resources that exist only while the session is ready.
struct Active<L> {
    transport: Transport<L>,
    framebuffer: Framebuffer,
}

/// Open connection to one LCD module.
///
/// The protocol is half-duplex: every operation writes one command and,
/// for queries, reads its answer before returning.
pub struct LcdSession<L = Box<dyn SerialPort>> {
    active: Option<Active<L>>,
    state: SessionState,
    capabilities: DeviceCapabilities,
    options: SessionOptions,
    contrast: Option<u8>,
    brightness: Option<u8>,
    display_on: bool,
    span: Span,
}

impl LcdSession {
    /// Opens the module at `path` with default timing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, SessionOptions::default())
    }

    /// Opens the module at `path`.
    pub fn open_with(path: impl AsRef<Path>, options: SessionOptions) -> Result<Self> {
        let path = path.as_ref();
        let span = info_span!("lcd_session", device = %path.display());
        let transport = span.in_scope(|| {
            debug!(
                "Session state {:?} -> {:?}",
                SessionState::Unopened,
                SessionState::Handshaking
            );
            Transport::open(path).inspect_err(|e| {
                debug!("Session state {:?}: {}", SessionState::Failed, e);
            })
        })?;
        Self::handshake_in(transport, options, span)
    }
}

impl<L: SerialLink> LcdSession<L> {
    /// Runs the handshake over an already opened transport.
    ///
    /// Sends the init sequence and queries the module's capabilities. No
    /// session is returned unless both succeed.
    pub fn handshake(transport: Transport<L>, options: SessionOptions) -> Result<Self> {
        Self::handshake_in(transport, options, info_span!("lcd_session"))
    }

    fn handshake_in(
        mut transport: Transport<L>,
        options: SessionOptions,
        span: Span,
    ) -> Result<Self> {
        let entered = span.enter();

        let capabilities = match Self::init_device(&mut transport, &options) {
            Ok(capabilities) => capabilities,
            Err(e) => {
                debug!("Session state {:?}: {}", SessionState::Failed, e);
                transport.close();
                return Err(e);
            }
        };

        info!(
            "LCD ready: {}x{}, clock: {}, ROM: {} kbit, light sensor: {}, thermal sensor: {}",
            capabilities.width,
            capabilities.height,
            capabilities.has_real_time_clock,
            capabilities.rom_size_kbit,
            capabilities.has_light_sensor,
            capabilities.has_thermal_sensor
        );

        let framebuffer =
            Framebuffer::with_dimensions(capabilities.width as usize, capabilities.height as usize);

        drop(entered);
        Ok(Self {
            active: Some(Active {
                transport,
                framebuffer,
            }),
            state: SessionState::Ready,
            capabilities,
            options,
            contrast: None,
            brightness: None,
            display_on: true,
            span,
        })
    }

    fn init_device(
        transport: &mut Transport<L>,
        options: &SessionOptions,
    ) -> Result<DeviceCapabilities> {
        debug!("Sending init sequence");
        transport.write_exact(&INIT_SEQUENCE)?;
        std::thread::sleep(options.init_delay);

        transport.write_exact(&build_query_packet(Query::Capabilities))?;
        std::thread::sleep(options.command_delay);
        let raw = transport.read_exact(Query::Capabilities.response_len(), options.read_timeout)?;
        parse_capabilities(&raw)
    }

    fn active(&mut self) -> Result<&mut Active<L>> {
        self.active.as_mut().ok_or(Error::SessionClosed)
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns what the module reported at handshake.
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Returns the local mirror of the display contents.
    pub fn framebuffer(&self) -> Result<&Framebuffer> {
        self.active
            .as_ref()
            .map(|active| &active.framebuffer)
            .ok_or(Error::SessionClosed)
    }

    /// Last contrast level sent, if any.
    pub fn contrast(&self) -> Option<u8> {
        self.contrast
    }

    /// Last brightness level sent, if any.
    pub fn brightness(&self) -> Option<u8> {
        self.brightness
    }

    /// Whether the display is believed to be switched on.
    pub fn display_on(&self) -> bool {
        self.display_on
    }

    /// Writes `text` to a line (1-based), replacing the whole line.
    pub fn write_line(&mut self, line: usize, text: impl AsRef<[u8]>) -> Result<()> {
        let _enter = self.span.clone().entered();
        let line_delay = self.options.line_delay;
        let active = self.active()?;

        let row = active.framebuffer.write_line(line, text.as_ref())?.to_vec();
        debug!("Framebuffer: {:?}", active.framebuffer);
        Self::send_row(&mut active.transport, line, &row, line_delay)
    }

    fn send_row(
        transport: &mut Transport<L>,
        line: usize,
        row: &[u8],
        line_delay: Duration,
    ) -> Result<()> {
        // Lines are bounded by the two-digit height the module reports.
        transport.write_exact(&build_write_line_header(line as u8))?;
        transport.write_exact(row)?;
        std::thread::sleep(line_delay);
        Ok(())
    }

    /// Blanks the framebuffer and rewrites every line.
    pub fn clear_display(&mut self) -> Result<()> {
        self.active()?.framebuffer.clear();
        self.refresh()
    }

    /// Re-sends every line from the framebuffer without changing it.
    pub fn refresh(&mut self) -> Result<()> {
        let _enter = self.span.clone().entered();
        let line_delay = self.options.line_delay;
        let active = self.active()?;

        for line in 1..=active.framebuffer.height() {
            let row = active.framebuffer.row(line)?.to_vec();
            Self::send_row(&mut active.transport, line, &row, line_delay)?;
        }
        debug!("Refreshed {} lines", active.framebuffer.height());
        Ok(())
    }

    /// Switches the display on or off.
    pub fn toggle_display(&mut self) -> Result<()> {
        let _enter = self.span.clone().entered();
        self.command(&build_toggle_packet())?;
        self.display_on = !self.display_on;
        debug!("Display toggled, now {}", if self.display_on { "on" } else { "off" });
        Ok(())
    }

    /// Sets the contrast level, clamped to 1-255. Returns the level sent.
    pub fn set_contrast(&mut self, value: i32) -> Result<u8> {
        let _enter = self.span.clone().entered();
        let level = clamp_level(value);
        self.command(&build_contrast_packet(level))?;
        self.contrast = Some(level);
        debug!("Set contrast to {}", level);
        Ok(level)
    }

    /// Sets the backlight brightness, clamped to 1-255. Returns the level sent.
    pub fn set_brightness(&mut self, value: i32) -> Result<u8> {
        let _enter = self.span.clone().entered();
        let level = clamp_level(value);
        self.command(&build_brightness_packet(level))?;
        self.brightness = Some(level);
        debug!("Set brightness to {}", level);
        Ok(level)
    }

    /// Reads the on-board temperature.
    ///
    /// Modules without a thermal sensor report `Unsupported` without any
    /// traffic on the line.
    pub fn get_temperature(&mut self) -> Result<SensorReading<Temperature>> {
        let _enter = self.span.clone().entered();
        self.active()?;
        if !self.capabilities.has_thermal_sensor {
            debug!("No thermal sensor fitted");
            return Ok(SensorReading::Unsupported);
        }

        let raw = self.query(Query::Temperature)?;
        let reading = parse_temperature(&raw)?;
        debug!("Temperature: {}", reading);
        Ok(reading)
    }

    /// Reads the contrast level from the module.
    pub fn get_contrast(&mut self) -> Result<SensorReading<u8>> {
        let _enter = self.span.clone().entered();
        let raw = self.query(Query::Contrast)?;
        parse_contrast(&raw)
    }

    /// Reads the brightness level from the module.
    pub fn get_brightness(&mut self) -> Result<SensorReading<u8>> {
        let _enter = self.span.clone().entered();
        let raw = self.query(Query::Brightness)?;
        parse_brightness(&raw)
    }

    /// Scrolls the display contents and repaints every line.
    ///
    /// Lines opened by the scroll are blank; callers normally write new
    /// content into them afterwards.
    pub fn scroll(&mut self, direction: ScrollDirection, distance: usize) -> Result<()> {
        self.scroll_lines(direction, distance, false)
    }

    /// Like [`scroll`](Self::scroll), but lines shifted off one edge
    /// re-enter at the other.
    pub fn scroll_wrapping(&mut self, direction: ScrollDirection, distance: usize) -> Result<()> {
        self.scroll_lines(direction, distance, true)
    }

    fn scroll_lines(
        &mut self,
        direction: ScrollDirection,
        distance: usize,
        wrap: bool,
    ) -> Result<()> {
        {
            let _enter = self.span.clone().entered();
            self.active()?.framebuffer.scroll(direction, distance, wrap)?;
            debug!("Scrolled {} by {} (wrap: {})", direction, distance, wrap);
        }
        self.refresh()
    }

    /// Closes the session and releases the serial line.
    pub fn close(&mut self) -> Result<()> {
        let _enter = self.span.clone().entered();
        let active = self.active.take().ok_or(Error::SessionClosed)?;
        active.transport.close();
        self.state = SessionState::Closed;
        info!("LCD session closed");
        Ok(())
    }

    fn command(&mut self, packet: &[u8]) -> Result<()> {
        let delay = self.options.command_delay;
        self.active()?.transport.write_exact(packet)?;
        std::thread::sleep(delay);
        Ok(())
    }

    fn query(&mut self, query: Query) -> Result<Vec<u8>> {
        let timeout = self.options.read_timeout;
        self.command(&build_query_packet(query))?;
        self.active()?
            .transport
            .read_exact(query.response_len(), timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::TemperatureUnit;
    use crate::testing::{line_frames, LinkHandle, ScriptedLink};
    use std::io;

    const CAPS_20X4: &[u8] = b"20041110   ";
    const CAPS_THERMAL: &[u8] = b"20041111   ";

    fn immediate() -> SessionOptions {
        SessionOptions {
            read_timeout: Duration::from_millis(10),
            init_delay: Duration::ZERO,
            command_delay: Duration::ZERO,
            line_delay: Duration::ZERO,
        }
    }

    fn open_session(caps: &[u8]) -> (LcdSession<ScriptedLink>, LinkHandle) {
        let (link, handle) = ScriptedLink::pair();
        handle.respond(caps);
        let session = LcdSession::handshake(Transport::new(link), immediate()).unwrap();
        handle.clear_written();
        (session, handle)
    }

    #[test]
    fn test_handshake() {
        let (link, handle) = ScriptedLink::pair();
        handle.respond(b"20");
        handle.respond(b"041210   ");

        let session = LcdSession::handshake(Transport::new(link), immediate()).unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.capabilities().width, 20);
        assert_eq!(session.capabilities().height, 4);
        assert_eq!(session.capabilities().rom_size_kbit, 2);
        assert!(session.display_on());

        let fb = session.framebuffer().unwrap();
        assert_eq!((fb.width(), fb.height()), (20, 4));
        assert_eq!(
            handle.written(),
            vec![0xFE, b'S', b'u', b'r', b'e', 0xFE, 0x76]
        );
    }

    #[test]
    fn test_handshake_fails_without_answer() {
        let (link, _handle) = ScriptedLink::pair();
        let err = LcdSession::handshake(Transport::new(link), immediate())
            .err()
            .unwrap();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_handshake_fails_on_write_error() {
        let (link, handle) = ScriptedLink::pair();
        handle.fail_writes(io::ErrorKind::BrokenPipe);
        handle.respond(CAPS_20X4);
        let err = LcdSession::handshake(Transport::new(link), immediate())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::WriteFailed(ref e) if e.kind() == io::ErrorKind::BrokenPipe
        ));
        assert!(handle.written().is_empty());
    }

    #[test]
    fn test_handshake_fails_on_garbage() {
        let (link, handle) = ScriptedLink::pair();
        handle.respond(b"??????????\n");
        let err = LcdSession::handshake(Transport::new(link), immediate())
            .err()
            .unwrap();
        assert!(matches!(err, Error::CapabilityParse(_)));
    }

    #[test]
    fn test_write_line_pads() {
        let (mut session, handle) = open_session(CAPS_20X4);
        session.write_line(2, "Hello world!").unwrap();

        let frames = line_frames(&handle.written(), 20);
        assert_eq!(frames, vec![(2, b"Hello world!        ".to_vec())]);
        assert_eq!(handle.written().len(), 24);
    }

    #[test]
    fn test_write_line_truncates() {
        let (mut session, handle) = open_session(CAPS_20X4);
        session
            .write_line(1, "This line is far too long for the display")
            .unwrap();

        let frames = line_frames(&handle.written(), 20);
        assert_eq!(frames, vec![(1, b"This line is far too".to_vec())]);
    }

    #[test]
    fn test_write_line_invalid_sends_nothing() {
        let (mut session, handle) = open_session(CAPS_20X4);
        for line in [0, 5, 42] {
            let err = session.write_line(line, "x").unwrap_err();
            assert!(matches!(err, Error::InvalidLine { .. }));
        }
        assert!(handle.written().is_empty());
    }

    #[test]
    fn test_clear_then_refresh() {
        let (mut session, handle) = open_session(CAPS_20X4);
        session.write_line(3, "stale").unwrap();
        session.clear_display().unwrap();
        handle.clear_written();

        session.refresh().unwrap();
        let frames = line_frames(&handle.written(), 20);
        assert_eq!(frames.len(), 4);
        for (i, (line, payload)) in frames.iter().enumerate() {
            assert_eq!(*line as usize, i + 1);
            assert_eq!(payload, &vec![b' '; 20]);
        }
    }

    #[test]
    fn test_refresh_keeps_content() {
        let (mut session, handle) = open_session(CAPS_20X4);
        session.write_line(1, "one").unwrap();
        session.write_line(4, "four").unwrap();
        handle.clear_written();

        session.refresh().unwrap();
        let frames = line_frames(&handle.written(), 20);
        assert_eq!(frames[0].1, b"one                 ");
        assert_eq!(frames[3].1, b"four                ");
        assert_eq!(session.framebuffer().unwrap().row(1).unwrap(), b"one                 ");
    }

    #[test]
    fn test_scroll_up_retransmits() {
        let (mut session, handle) = open_session(CAPS_20X4);
        for line in 1..=4 {
            session.write_line(line, format!("row {}", line)).unwrap();
        }
        handle.clear_written();

        session.scroll(ScrollDirection::Up, 2).unwrap();
        let frames = line_frames(&handle.written(), 20);
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], (1, b"row 3               ".to_vec()));
        assert_eq!(frames[1], (2, b"row 4               ".to_vec()));
        assert_eq!(frames[2].0, 3);
        assert_eq!(frames[3].0, 4);
    }

    #[test]
    fn test_scroll_wrapping() {
        let (mut session, _handle) = open_session(CAPS_20X4);
        for line in 1..=4 {
            session.write_line(line, format!("row {}", line)).unwrap();
        }

        session.scroll_wrapping(ScrollDirection::Down, 1).unwrap();
        let fb = session.framebuffer().unwrap();
        assert_eq!(&fb.row(1).unwrap()[..5], b"row 4");
        assert_eq!(&fb.row(2).unwrap()[..5], b"row 1");
    }

    #[test]
    fn test_scroll_horizontal_rejected() {
        let (mut session, handle) = open_session(CAPS_20X4);
        let err = session.scroll(ScrollDirection::Right, 1).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDirection(_)));
        assert!(handle.written().is_empty());
    }

    #[test]
    fn test_set_contrast_clamps() {
        let (mut session, handle) = open_session(CAPS_20X4);
        assert_eq!(session.set_contrast(300).unwrap(), 255);
        assert_eq!(session.contrast(), Some(255));
        assert_eq!(session.set_contrast(0).unwrap(), 1);
        assert_eq!(session.contrast(), Some(1));
        assert_eq!(handle.written(), vec![0xFE, 0x50, 0xFF, 0xFE, 0x50, 0x01]);
    }

    #[test]
    fn test_set_brightness_clamps() {
        let (mut session, handle) = open_session(CAPS_20X4);
        assert_eq!(session.set_brightness(254).unwrap(), 254);
        assert_eq!(session.set_brightness(1000).unwrap(), 255);
        assert_eq!(session.brightness(), Some(255));
        assert_eq!(handle.written(), vec![0xFE, 0x98, 0xFE, 0xFE, 0x98, 0xFF]);
    }

    #[test]
    fn test_toggle_display() {
        let (mut session, handle) = open_session(CAPS_20X4);
        session.toggle_display().unwrap();
        assert!(!session.display_on());
        session.toggle_display().unwrap();
        assert!(session.display_on());
        assert_eq!(handle.written(), vec![0xFE, 0x64, 0xFE, 0x64]);
    }

    #[test]
    fn test_temperature_unsupported_without_io() {
        let (mut session, handle) = open_session(CAPS_20X4);
        assert_eq!(session.get_temperature().unwrap(), SensorReading::Unsupported);
        assert!(handle.written().is_empty());
    }

    #[test]
    fn test_temperature() {
        let (mut session, handle) = open_session(CAPS_THERMAL);
        handle.respond(b"0721C");

        let reading = session.get_temperature().unwrap();
        assert_eq!(
            reading,
            SensorReading::Value(Temperature {
                value: 72,
                unit: TemperatureUnit::Celsius
            })
        );
        assert_eq!(handle.written(), vec![0xFE, 0x77]);
    }

    #[test]
    fn test_temperature_out_of_range() {
        let (mut session, handle) = open_session(CAPS_THERMAL);
        handle.respond(b"T    ");
        assert_eq!(session.get_temperature().unwrap(), SensorReading::OutOfRange);
    }

    #[test]
    fn test_parse_error_keeps_session_ready() {
        let (mut session, handle) = open_session(CAPS_20X4);
        handle.respond(b"C abc");
        let err = session.get_contrast().unwrap_err();
        assert!(matches!(err, Error::SensorParse { .. }));
        assert_eq!(session.state(), SessionState::Ready);

        handle.respond(b"C 200");
        assert_eq!(session.get_contrast().unwrap(), SensorReading::Value(200));
    }

    #[test]
    fn test_get_brightness() {
        let (mut session, handle) = open_session(CAPS_20X4);
        handle.respond(b"BRT 254");
        assert_eq!(session.get_brightness().unwrap(), SensorReading::Value(254));
        assert_eq!(handle.written(), vec![0xFE, 0x62]);
    }

    #[test]
    fn test_query_timeout_then_resync() {
        let (mut session, handle) = open_session(CAPS_20X4);
        handle.respond(b"C ");

        assert!(session.get_contrast().unwrap_err().is_timeout());

        handle.respond(b"C 128");
        session.get_contrast().unwrap();
        assert_eq!(handle.discards(), 1);
    }

    #[test]
    fn test_closed_session_rejects_operations() {
        let (mut session, handle) = open_session(CAPS_THERMAL);
        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);

        assert!(matches!(session.write_line(1, "x"), Err(Error::SessionClosed)));
        assert!(matches!(session.clear_display(), Err(Error::SessionClosed)));
        assert!(matches!(session.refresh(), Err(Error::SessionClosed)));
        assert!(matches!(session.toggle_display(), Err(Error::SessionClosed)));
        assert!(matches!(session.set_contrast(5), Err(Error::SessionClosed)));
        assert!(matches!(session.get_temperature(), Err(Error::SessionClosed)));
        assert!(matches!(
            session.scroll(ScrollDirection::Up, 1),
            Err(Error::SessionClosed)
        ));
        assert!(matches!(session.close(), Err(Error::SessionClosed)));
        assert!(session.framebuffer().is_err());
        assert!(handle.written().is_empty());
    }

    // Hardware tests are skipped by default
    #[test]
    #[ignore]
    fn test_device_open() {
        let session = LcdSession::open("/dev/ttyUSB0");
        assert!(session.is_ok());
    }
}
