//! # Controller port
//!
//! Byte level access to the serial port the motor/sensor controller is attached to.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{PoseEstError, Params};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A non-blocking byte port.
pub trait CtrlPort: Send {
    /// Number of bytes which can be read without blocking.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes, returning the number read.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Discard everything in the input and output buffers.
    fn clear(&mut self) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The real serial port.
pub struct SerialCtrlPort {
    port: Box<dyn SerialPort>,
}

/// An in-memory port used for testing.
///
/// Bytes pushed through the [`MockCtrlHandle`] are read by the port, bytes written by the port can
/// be collected from the handle.
pub struct MockCtrlPort {
    state: Arc<Mutex<MockState>>,
}

/// Test side of a [`MockCtrlPort`].
#[derive(Clone)]
pub struct MockCtrlHandle {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    input: Vec<u8>,
    output: Vec<u8>,
    num_clears: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SerialCtrlPort {
    /// Open the port given in the parameters.
    pub fn open(params: &Params) -> Result<Self, PoseEstError> {
        let port = serialport::new(&params.port_path, params.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(1))
            .open()
            .map_err(|e| PoseEstError::SerialOpenError(params.port_path.clone(), e))?;

        info!(
            "Opened controller serial port {} at {} baud",
            params.port_path, params.baud_rate
        );

        Ok(Self { port })
    }
}

impl CtrlPort for SerialCtrlPort {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        or_on_timeout(self.port.read(buf), 0)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        // A dropped demand is resent on the next motor cycle
        or_on_timeout(self.port.write_all(data), ())
    }

    fn clear(&mut self) -> io::Result<()> {
        Ok(self.port.clear(ClearBuffer::All)?)
    }
}

impl MockCtrlPort {
    pub fn new() -> (Self, MockCtrlHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));

        (
            Self {
                state: state.clone(),
            },
            MockCtrlHandle { state },
        )
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("MockCtrlPort mutex poisoned")
    }
}

impl CtrlPort for MockCtrlPort {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.state().input.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state();
        let n = buf.len().min(state.input.len());
        buf[..n].copy_from_slice(&state.input[..n]);
        state.input.drain(..n);
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.state().output.extend_from_slice(data);
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        let mut state = self.state();
        state.input.clear();
        state.output.clear();
        state.num_clears += 1;
        Ok(())
    }
}

impl MockCtrlHandle {
    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("MockCtrlPort mutex poisoned")
    }

    /// Make bytes available to read from the port.
    pub fn push(&self, data: &[u8]) {
        self.state().input.extend_from_slice(data);
    }

    /// Take everything written to the port so far.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.state().output)
    }

    /// Number of unread input bytes.
    pub fn pending_input(&self) -> usize {
        self.state().input.len()
    }

    /// Number of times the port buffers have been cleared.
    pub fn num_clears(&self) -> usize {
        self.state().num_clears
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Replace a timed out or would-block result with `value`, other errors are passed through.
fn or_on_timeout<T>(result: io::Result<T>, value: T) -> io::Result<T> {
    match result {
        Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
            Ok(value)
        }
        r => r,
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mock_port() {
        let (mut port, handle) = MockCtrlPort::new();

        handle.push(b"$IMU,1,2,3\r\n");
        assert_eq!(port.bytes_available().unwrap(), 12);

        let mut buf = [0u8; 4];
        assert_eq!(port.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"$IMU");
        assert_eq!(handle.pending_input(), 8);

        port.write_all(b"$JETSON,0,0,0,\r\n").unwrap();
        assert_eq!(handle.take_output(), b"$JETSON,0,0,0,\r\n".to_vec());
        assert!(handle.take_output().is_empty());

        port.clear().unwrap();
        assert_eq!(handle.pending_input(), 0);
        assert_eq!(handle.num_clears(), 1);
    }

    #[test]
    fn test_timeouts_are_not_errors() {
        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "timed out");
        assert_eq!(or_on_timeout::<usize>(Err(timed_out), 0).unwrap(), 0);

        let would_block = io::Error::new(io::ErrorKind::WouldBlock, "busy");
        assert!(or_on_timeout(Err(would_block), ()).is_ok());

        assert_eq!(or_on_timeout(Ok(7usize), 0).unwrap(), 7);

        let broken = io::Error::new(io::ErrorKind::BrokenPipe, "unplugged");
        assert_eq!(
            or_on_timeout(Err(broken), ()).unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
    }
}
