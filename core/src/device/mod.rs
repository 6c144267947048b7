//! Request/response transport to one instrument.
//!
//! Every instrument speaks the same newline-terminated text protocol: a mode
//! command puts it into request mode, after which each `?` is answered with
//! one line of tab-separated numbers.

pub mod line;
pub mod serial;

pub use line::{parse_response, LineDevice, LinePort};
pub use serial::{open_serial, DeviceSpec, SerialDevice};

use crate::prelude::DeviceError;

/// Contract the acquisition task relies on.
pub trait DeviceChannel: Send {
    fn name(&self) -> &str;
    /// Number of values every answer must contain.
    fn arity(&self) -> usize;
    fn query(&mut self) -> Result<Vec<f64>, DeviceError>;
    /// Releases the transport. Calling it again is a no-op.
    fn close(&mut self);
}

impl<D: DeviceChannel + ?Sized> DeviceChannel for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn arity(&self) -> usize {
        (**self).arity()
    }

    fn query(&mut self) -> Result<Vec<f64>, DeviceError> {
        (**self).query()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::DeviceChannel;
    use crate::prelude::{DeviceError, ProtocolError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Answers every query with the same values, optionally failing after a
    /// number of successful queries.
    pub(crate) struct FixedDevice {
        name: String,
        values: Vec<f64>,
        fail_after: Option<usize>,
        pub(crate) queries: Arc<AtomicUsize>,
        closed: bool,
    }

    impl FixedDevice {
        pub(crate) fn new(name: &str, values: Vec<f64>) -> Self {
            Self {
                name: name.into(),
                values,
                fail_after: None,
                queries: Arc::new(AtomicUsize::new(0)),
                closed: false,
            }
        }

        pub(crate) fn failing_after(mut self, successes: usize) -> Self {
            self.fail_after = Some(successes);
            self
        }
    }

    impl DeviceChannel for FixedDevice {
        fn name(&self) -> &str {
            &self.name
        }

        fn arity(&self) -> usize {
            self.values.len()
        }

        fn query(&mut self) -> Result<Vec<f64>, DeviceError> {
            if self.closed {
                return Err(DeviceError::Closed(self.name.clone()));
            }
            let done = self.queries.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|limit| done >= limit) {
                return Err(DeviceError::Protocol {
                    device: self.name.clone(),
                    error: ProtocolError::ShapeMismatch {
                        expected: self.values.len(),
                        received: self.values.len() - 1,
                    },
                });
            }
            // Keep the acquisition loop from spinning flat out in tests.
            std::thread::sleep(std::time::Duration::from_millis(1));
            Ok(self.values.clone())
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }
}
