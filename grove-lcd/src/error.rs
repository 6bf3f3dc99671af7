//! Common error types for grove-lcd.
//!
//! This module provides a centralized Error enum using thiserror, with
//! conversions from the bus layer and a mapping onto the POSIX result codes
//! reported to callers of the byte-stream and control-request surfaces.

use nix::errno::Errno;
use thiserror::Error;

use crate::hw_trait::HwError;

/// Main error type for grove-lcd operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A bus transaction against a peripheral did not complete
    #[error("Bus error on {name}@0x{addr:02x}: {source}")]
    Bus {
        name: &'static str,
        addr: u8,
        #[source]
        source: HwError,
    },

    /// The logical device record could not be created
    #[error("Allocation failure: {0}")]
    Allocation(String),

    /// A payload could not cross the caller boundary
    #[error("Bad address while copying payload")]
    Fault,

    /// Malformed byte-stream write
    #[error("Format error: {0}")]
    Format(String),

    /// Request rejected before touching any state
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Peripheral required by the operation is not bound
    #[error("No such device: {0}")]
    NoDevice(String),

    /// Device-node registration failed
    #[error("Registration error: {0}")]
    Registration(String),
}

impl Error {
    /// Result code reported to a caller for this error.
    pub fn errno(&self) -> Errno {
        match self {
            Error::Io(_) | Error::Bus { .. } => Errno::EIO,
            Error::Config(_) | Error::Format(_) | Error::InvalidArgument(_) => Errno::EINVAL,
            Error::Allocation(_) => Errno::ENOMEM,
            Error::Fault => Errno::EFAULT,
            Error::NoDevice(_) => Errno::ENODEV,
            Error::Registration(_) => Errno::EBUSY,
        }
    }
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
