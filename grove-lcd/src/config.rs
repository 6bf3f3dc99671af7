//! Configuration management for grove-lcd.
//!
//! Configuration is read from a TOML file. Every field has a default, so an
//! empty file (or no file at all) describes a Grove-LCD on `/dev/i2c-1` at
//! its factory addresses.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::peripheral::{lcd, rgb};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "GROVE_LCD_CONFIG";

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Bus configuration
    pub bus: BusConfig,

    /// Logical device configuration
    pub device: DeviceConfig,

    /// Daemon configuration
    pub daemon: DaemonConfig,
}

/// Which I2C adapter to use.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BusConfig {
    /// i2c-dev node of the adapter
    pub path: PathBuf,

    /// Use the in-process simulated bus instead of real hardware
    pub simulate: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/i2c-1"),
            simulate: false,
        }
    }
}

/// Logical device configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device-node name
    pub name: String,

    /// Address of the backlight controller (primary)
    pub rgb_address: u8,

    /// Address of the LCD controller (secondary)
    pub lcd_address: u8,

    /// Fail attach when the LCD controller does not answer
    pub require_lcd: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "grove".to_string(),
            rgb_address: rgb::RGB_I2C_ADDR,
            lcd_address: lcd::LCD_I2C_ADDR,
            require_lcd: false,
        }
    }
}

/// Daemon process configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Unix socket requests are served on
    pub socket: PathBuf,

    /// Default log level when RUST_LOG is unset
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket: PathBuf::from("/run/grove-lcd.sock"),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `$GROVE_LCD_CONFIG`, or use defaults.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_from(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let device = &self.device;
        if device.name.is_empty() {
            return Err(Error::Config("device.name must not be empty".into()));
        }
        for (field, addr) in [
            ("rgb_address", device.rgb_address),
            ("lcd_address", device.lcd_address),
        ] {
            if addr > 0x7f {
                return Err(Error::Config(format!(
                    "device.{field} 0x{addr:02x} is not a 7-bit address"
                )));
            }
        }
        if device.rgb_address == device.lcd_address {
            return Err(Error::Config(
                "device.rgb_address and device.lcd_address must differ".into(),
            ));
        }
        Ok(())
    }
}
