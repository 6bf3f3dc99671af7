//! Ordered (command, value) write sequences.
//!
//! A sequence is issued one write at a time against a single peripheral and
//! stops at the first failed write. There are no retries, and writes that
//! already went out are not rolled back.

use crate::error::{Error, Result};
use crate::hw_trait::{I2c, I2cClient};
use crate::tracing::prelude::*;

/// One register write: command byte then value byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub cmd: u8,
    pub val: u8,
}

impl Command {
    pub const fn new(cmd: u8, val: u8) -> Self {
        Self { cmd, val }
    }
}

/// Issue `sequence` in order against `client`, aborting on the first failure.
pub fn run<B: I2c>(client: &I2cClient<B>, sequence: &[Command]) -> Result<()> {
    let name = client.name();
    let addr = client.addr();
    trace!(name, addr, len = sequence.len(), "Issuing bus sequence");

    for (step, command) in sequence.iter().enumerate() {
        trace!(name, step, cmd = command.cmd, val = command.val, "Bus write");
        if let Err(source) = client.write_byte_data(command.cmd, command.val) {
            error!(name, addr, step, error = %source, "Bus sequence aborted");
            return Err(Error::Bus { name, addr, source });
        }
    }

    Ok(())
}
