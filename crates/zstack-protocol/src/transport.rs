//! Serial transport for the MT protocol

use crate::types::ProtocolError;

use serial2::SerialPort;
use std::time::Duration;

/// Baud rate used by Z-Stack 3.x coordinator firmware
pub const BAUD_RATE: u32 = 115200;

/// Read timeout; keeps reads non-blocking from the client's point of view
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Byte-level transport the client drives
///
/// `read` must return `Ok(0)` promptly when no data is available so the
/// cooperative pump never stalls. The client owns the transport exclusively.
pub trait SerialTransport {
    /// Read available bytes into `buf`; 0 means no data right now
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError>;

    /// Write bytes, returning the count written
    fn write(&mut self, data: &[u8]) -> Result<usize, ProtocolError>;
}

/// UART transport over a real serial device
///
/// Opens the port raw 8-N-1 at 115200 with no flow control, which is what
/// CC2652-class dongles expect.
pub struct UartTransport {
    port: SerialPort,
}

impl UartTransport {
    /// Open the serial device at `path`
    pub fn open(path: &str) -> Result<Self, ProtocolError> {
        tracing::info!("Opening serial port {}", path);

        let mut port = SerialPort::open(path, BAUD_RATE).map_err(ProtocolError::SerialError)?;
        port.set_read_timeout(READ_TIMEOUT)
            .map_err(ProtocolError::SerialError)?;

        Ok(Self { port })
    }
}

impl SerialTransport for UartTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(ref e) if e.raw_os_error() == Some(libc::EAGAIN) => Ok(0),
            Err(e) => {
                tracing::error!("Serial read error: {}", e);
                Err(ProtocolError::SerialError(e))
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ProtocolError> {
        tracing::debug!("Writing {} bytes to serial port", data.len());
        self.port.write_all(data).map_err(ProtocolError::SerialError)?;
        self.port.flush().map_err(ProtocolError::SerialError)?;
        Ok(data.len())
    }
}
