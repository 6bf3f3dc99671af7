//! Linux i2c-dev backend.
//!
//! Talks to an adapter through its `/dev/i2c-N` character device. The slave
//! address is selected with the `I2C_SLAVE` ioctl; plain `read(2)` and
//! `write(2)` then address that slave.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::libc::c_int;

use super::{HwError, I2c, I2cError, Result};
use crate::tracing::prelude::*;

/// ioctl request selecting the slave address for subsequent transfers.
const I2C_SLAVE: u16 = 0x0703;

nix::ioctl_write_int_bad!(i2c_set_slave, I2C_SLAVE);

/// An open i2c-dev adapter.
#[derive(Debug)]
pub struct LinuxI2c {
    file: File,
    path: PathBuf,
    selected: Option<u8>,
}

impl LinuxI2c {
    /// Open the adapter at `path`, e.g. `/dev/i2c-1`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        debug!(path = %path.display(), "Opened I2C adapter");
        Ok(Self {
            file,
            path,
            selected: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn select(&mut self, addr: u8) -> Result<()> {
        if addr > 0x7f {
            return Err(HwError::InvalidParameter(format!(
                "7-bit address expected, got 0x{addr:02x}"
            )));
        }
        if self.selected == Some(addr) {
            return Ok(());
        }
        // SAFETY: the descriptor is owned by `self.file` and stays open for
        // the duration of the call; I2C_SLAVE takes its argument by value.
        unsafe { i2c_set_slave(self.file.as_raw_fd(), c_int::from(addr)) }
            .map_err(io::Error::from)?;
        self.selected = Some(addr);
        Ok(())
    }
}

// The adapter reports a missing acknowledge as ENXIO or EREMOTEIO.
fn is_nack(e: &io::Error) -> bool {
    matches!(
        e.raw_os_error().map(Errno::from_raw),
        Some(Errno::ENXIO) | Some(Errno::EREMOTEIO)
    )
}

impl I2c for LinuxI2c {
    fn write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        self.select(addr)?;
        match self.file.write(data) {
            Ok(n) if n == data.len() => Ok(()),
            Ok(n) => Err(I2cError::ShortWrite {
                addr,
                written: n,
                expected: data.len(),
            }
            .into()),
            Err(e) if is_nack(&e) => Err(I2cError::NoAck(addr).into()),
            Err(e) => Err(e.into()),
        }
    }

    fn probe(&mut self, addr: u8) -> Result<bool> {
        self.select(addr)?;
        let mut byte = [0u8; 1];
        match self.file.read(&mut byte) {
            Ok(_) => Ok(true),
            Err(e) if is_nack(&e) || e.raw_os_error() == Some(Errno::EIO as i32) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
