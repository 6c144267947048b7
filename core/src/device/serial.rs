use crate::device::{LineDevice, LinePort};
use crate::prelude::DeviceError;
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

pub type SerialDevice = LineDevice<Box<dyn SerialPort>>;

/// Longest answer line accepted before the exchange is abandoned.
pub const MAX_LINE_BYTES: usize = 4096;

fn default_baud_rate() -> u32 {
    19_200
}

fn default_timeout_ms() -> u64 {
    1_000
}

/// Where and how to reach one instrument. The answer width is fixed by the
/// instrument kind and passed to [`open_serial`] separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub name: String,
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl DeviceSpec {
    pub fn new(name: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: port.into(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Opens the port as 8N1 and performs the request-mode handshake.
pub fn open_serial(spec: &DeviceSpec, arity: usize) -> Result<SerialDevice, DeviceError> {
    let port = serialport::new(&spec.port, spec.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(Duration::from_millis(spec.timeout_ms))
        .open()
        .map_err(|err| DeviceError::Connection {
            device: spec.name.clone(),
            source: io::Error::from(err),
        })?;
    log::info!("opened {} on {} at {} baud", spec.name, spec.port, spec.baud_rate);
    LineDevice::handshake(spec.name.clone(), arity, port)
}

/// Reads bytes up to `\n` (stripped, along with a trailing `\r`).
///
/// The whole line must arrive within `timeout` and fit in
/// [`MAX_LINE_BYTES`]; a chatty port that never terminates its answer fails
/// with `TimedOut` or `InvalidData` instead of blocking the caller.
pub fn read_line_within<R: Read + ?Sized>(
    reader: &mut R,
    timeout: Duration,
) -> io::Result<String> {
    let deadline = Instant::now() + timeout;
    let mut line = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    loop {
        if Instant::now() >= deadline {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no line terminator within {} ms", timeout.as_millis()),
            ));
        }
        match reader.read(&mut byte)? {
            0 => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            _ if byte[0] == b'\n' => break,
            _ if line.len() >= MAX_LINE_BYTES => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("answer exceeds {MAX_LINE_BYTES} bytes without a terminator"),
                ));
            }
            _ => line.push(byte[0]),
        }
    }
    let text = String::from_utf8_lossy(&line);
    Ok(text.trim_end_matches('\r').to_string())
}

impl LinePort for Box<dyn SerialPort> {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)?;
        self.flush()
    }

    fn receive_line(&mut self) -> io::Result<String> {
        let timeout = self.timeout();
        read_line_within(self, timeout)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }

    fn discard_output(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Output).map_err(io::Error::from)
    }
}
