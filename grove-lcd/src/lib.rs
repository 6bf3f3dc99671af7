//! Driver for the Grove-LCD RGB backlight.
//!
//! The Grove-LCD is one physical module made of two I2C peripherals: an RGB
//! backlight controller and a 16x2 character LCD controller. This crate
//! binds both behind a single [`LogicalDevice`], keeps the backlight color
//! and two lines of text in memory, and exposes them through a byte-stream
//! interface ([`LogicalDevice::read`], [`LogicalDevice::write`]) and a set of
//! control requests ([`LogicalDevice::ioctl`]).

pub mod binder;
pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod hw_trait;
pub mod peripheral;
pub mod registry;
pub mod sequencer;
pub mod server;
pub mod state;
pub mod stream;
pub mod tracing;

pub use device::LogicalDevice;
pub use error::{Error, Result};
pub use state::{Color, LineId, LINE_SIZE};
