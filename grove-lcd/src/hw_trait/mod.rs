//! Hardware abstraction layer traits.
//!
//! This module defines the I2C bus interface that the peripheral drivers are
//! written against, together with the named per-address handle the device
//! owns, a Linux `/dev/i2c-N` backend and an in-process simulated bus.

pub mod i2c;
pub mod linux;
pub mod sim;

// Re-export traits
pub use i2c::{I2c, I2cClient, I2cError};
pub use linux::LinuxI2c;
pub use sim::SimI2c;

/// Common error type for hardware operations
#[derive(Debug, thiserror::Error)]
pub enum HwError {
    /// I/O error from underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bus-level failure
    #[error("I2C error: {0}")]
    I2c(#[from] I2cError),

    /// Invalid parameter or argument
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, HwError>;
