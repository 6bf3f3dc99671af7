//! Drivers for the two controllers inside the Grove-LCD RGB backlight.
//!
//! The module is built from two independent I2C controllers: a PCA9633-style
//! LED driver for the backlight and an HD44780-compatible LCD controller.
//! Each submodule holds the register map and the write sequences issued to
//! that controller.

pub mod lcd;
pub mod rgb;
