use crate::device::DeviceChannel;
use crate::prelude::{DeviceError, ProtocolError};
use log::{debug, trace};
use std::io;

pub const MODE_COMMAND: &[u8] = b"Rate 0\n";
pub const QUERY_COMMAND: &[u8] = b"?\n";

/// Byte transport underneath the line protocol.
pub trait LinePort: Send {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;
    /// Reads up to and including the next `\n`; the terminator is stripped.
    fn receive_line(&mut self) -> io::Result<String>;
    fn discard_input(&mut self) -> io::Result<()>;
    fn discard_output(&mut self) -> io::Result<()>;
}

/// Parses one answer line. The token count must equal `arity` exactly.
pub fn parse_response(line: &str, arity: usize) -> Result<Vec<f64>, ProtocolError> {
    let values = line
        .split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| ProtocolError::Malformed {
                token: token.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() != arity {
        return Err(ProtocolError::ShapeMismatch {
            expected: arity,
            received: values.len(),
        });
    }
    Ok(values)
}

/// An instrument in request mode behind some [`LinePort`].
pub struct LineDevice<P: LinePort> {
    name: String,
    arity: usize,
    port: Option<P>,
}

impl<P: LinePort> LineDevice<P> {
    /// Switches the instrument to request mode and drops its greeting.
    pub fn handshake(name: impl Into<String>, arity: usize, mut port: P) -> Result<Self, DeviceError> {
        let name = name.into();
        let connection = |source: io::Error| DeviceError::Connection {
            device: name.clone(),
            source,
        };
        port.discard_output().map_err(connection)?;
        port.send(MODE_COMMAND).map_err(connection)?;
        let greeting = port.receive_line().map_err(connection)?;
        debug!("{} switched to request mode: {:?}", name, greeting);
        port.discard_input().map_err(connection)?;

        Ok(Self {
            name,
            arity,
            port: Some(port),
        })
    }

    fn protocol(&self, error: ProtocolError) -> DeviceError {
        DeviceError::Protocol {
            device: self.name.clone(),
            error,
        }
    }
}

impl<P: LinePort> DeviceChannel for LineDevice<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn query(&mut self) -> Result<Vec<f64>, DeviceError> {
        let port = match self.port.as_mut() {
            Some(port) => port,
            None => return Err(DeviceError::Closed(self.name.clone())),
        };
        let exchange = (|| {
            port.discard_input()?;
            port.send(QUERY_COMMAND)?;
            port.receive_line()
        })();
        let line = exchange.map_err(|err| self.protocol(ProtocolError::Io(err)))?;
        trace!("{} answered {:?}", self.name, line);
        parse_response(&line, self.arity).map_err(|err| self.protocol(err))
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("{} closed", self.name);
        }
    }
}
