//! Scripted serial link used by the unit tests.

use crate::transport::SerialLink;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Duration;

/// One delivery from the simulated device.
#[derive(Debug, Clone)]
pub enum Chunk {
    /// Bytes that become readable.
    Data(Vec<u8>),
    /// Bytes of an abandoned response, dropped by `discard_input`.
    Late(Vec<u8>),
    /// A wait that ends without data.
    Silence,
    /// The read fails with this error.
    Error(io::ErrorKind),
}

#[derive(Default)]
struct State {
    written: Vec<u8>,
    incoming: VecDeque<Chunk>,
    write_limit: Option<usize>,
    write_error: Option<io::ErrorKind>,
    discards: usize,
}

/// Link half handed to the transport.
pub struct ScriptedLink {
    state: Rc<RefCell<State>>,
}

/// Test half used to script responses and inspect traffic.
#[derive(Clone)]
pub struct LinkHandle {
    state: Rc<RefCell<State>>,
}

impl ScriptedLink {
    pub fn pair() -> (Self, LinkHandle) {
        let state = Rc::new(RefCell::new(State::default()));
        (
            Self {
                state: state.clone(),
            },
            LinkHandle { state },
        )
    }
}

impl LinkHandle {
    pub fn push(&self, chunk: Chunk) {
        self.state.borrow_mut().incoming.push_back(chunk);
    }

    /// Queues a complete response in one delivery.
    pub fn respond(&self, data: &[u8]) {
        self.push(Chunk::Data(data.to_vec()));
    }

    pub fn limit_writes(&self, max: usize) {
        self.state.borrow_mut().write_limit = Some(max);
    }

    pub fn fail_writes(&self, kind: io::ErrorKind) {
        self.state.borrow_mut().write_error = Some(kind);
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.borrow().written.clone()
    }

    pub fn clear_written(&self) {
        self.state.borrow_mut().written.clear();
    }

    pub fn discards(&self) -> usize {
        self.state.borrow().discards
    }
}

impl SerialLink for ScriptedLink {
    fn write_some(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        if let Some(kind) = state.write_error {
            return Err(io::Error::from(kind));
        }
        let n = state.write_limit.map_or(data.len(), |max| max.min(data.len()));
        state.written.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn read_some(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        match state.incoming.pop_front() {
            Some(Chunk::Data(bytes)) | Some(Chunk::Late(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    state.incoming.push_front(Chunk::Data(bytes[n..].to_vec()));
                }
                Ok(n)
            }
            Some(Chunk::Error(kind)) => Err(io::Error::from(kind)),
            Some(Chunk::Silence) | None => Ok(0),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn discard_input(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.discards += 1;
        while matches!(
            state.incoming.front(),
            Some(Chunk::Late(_)) | Some(Chunk::Silence)
        ) {
            state.incoming.pop_front();
        }
        Ok(())
    }
}

/// Splits a byte stream into write-line frames: `(line, payload)`.
///
/// Bytes that are not part of a write-line frame are skipped.
pub fn line_frames(stream: &[u8], width: usize) -> Vec<(u8, Vec<u8>)> {
    let mut frames = Vec::new();
    let mut i = 0;
    while i + 4 <= stream.len() {
        if stream[i..i + 3] == [0xFE, 0x47, 0x01] {
            let line = stream[i + 3];
            let start = i + 4;
            let end = (start + width).min(stream.len());
            frames.push((line, stream[start..end].to_vec()));
            i = end;
        } else {
            i += 1;
        }
    }
    frames
}
