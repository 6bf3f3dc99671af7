//! I2C hardware abstraction trait.

use std::sync::Arc;

use parking_lot::Mutex;

use super::Result;
use crate::tracing::prelude::*;

/// I2C-specific errors
#[derive(Debug, thiserror::Error)]
pub enum I2cError {
    /// No acknowledgment from device
    #[error("No acknowledgment from device at address 0x{0:02x}")]
    NoAck(u8),

    /// Fewer bytes went out than were handed to the adapter
    #[error("Short write to 0x{addr:02x}: {written} of {expected} bytes")]
    ShortWrite { addr: u8, written: usize, expected: usize },

    /// Bus error
    #[error("Bus error")]
    BusError,
}

/// I2C bus abstraction.
///
/// Transactions are synchronous: a call returns once the transfer has
/// completed or failed.
pub trait I2c: Send {
    /// Write data to an I2C device.
    fn write(&mut self, addr: u8, data: &[u8]) -> Result<()>;

    /// Check whether a device acknowledges at `addr`.
    fn probe(&mut self, addr: u8) -> Result<bool>;
}

/// A named endpoint at one address on a shared bus.
///
/// Two clients of the same composite device share the underlying adapter;
/// each transaction locks the adapter for its own duration only.
pub struct I2cClient<B> {
    name: &'static str,
    addr: u8,
    bus: Arc<Mutex<B>>,
}

impl<B: I2c> I2cClient<B> {
    pub fn new(bus: Arc<Mutex<B>>, name: &'static str, addr: u8) -> Self {
        Self { name, addr, bus }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn addr(&self) -> u8 {
        self.addr
    }

    /// Write one command byte followed by one value byte.
    pub fn write_byte_data(&self, cmd: u8, val: u8) -> Result<()> {
        self.bus.lock().write(self.addr, &[cmd, val])
    }

    /// Obtain a handle for a second address on the same bus.
    ///
    /// Returns `None` when nothing answers at `addr`.
    pub fn new_secondary(&self, name: &'static str, addr: u8) -> Option<I2cClient<B>> {
        match self.bus.lock().probe(addr) {
            Ok(true) => Some(I2cClient::new(Arc::clone(&self.bus), name, addr)),
            Ok(false) => None,
            Err(e) => {
                debug!(name, addr, error = %e, "Probe failed");
                None
            }
        }
    }
}

impl<B> std::fmt::Debug for I2cClient<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I2cClient")
            .field("name", &self.name)
            .field("addr", &format_args!("0x{:02x}", self.addr))
            .finish()
    }
}
