//! Binding of the two bus peripherals behind one logical device.
//!
//! The backlight controller is the primary peripheral: it is the one the
//! caller matched and hands in. The LCD controller sits at a second address
//! on the same bus and is looked up from the primary. Not every adapter
//! detects it reliably, so its absence is a valid, degraded configuration.
//!
//! [`Attachment`] owns both handles and records everything acquired while
//! bringing the device up. Dropping it, or calling [`Attachment::release`],
//! blanks whatever was initialized and then gives resources back in reverse
//! order of acquisition.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::hw_trait::{I2c, I2cClient};
use crate::peripheral::{lcd, rgb};
use crate::registry::{DeviceId, DeviceRegistry};
use crate::sequencer;
use crate::state::Color;
use crate::tracing::prelude::*;

/// Name the secondary handle is bound under.
pub const LCD_CLIENT_NAME: &str = "lcd";

/// The optional second peripheral.
#[derive(Debug)]
pub enum Secondary<B> {
    Present(I2cClient<B>),
    Absent,
}

impl<B: I2c> Secondary<B> {
    pub fn as_present(&self) -> Option<&I2cClient<B>> {
        match self {
            Secondary::Present(client) => Some(client),
            Secondary::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Secondary::Present(_))
    }
}

/// Look up the peripheral at `addr` on the primary's bus.
pub fn bind_secondary<B: I2c>(
    primary: &I2cClient<B>,
    name: &'static str,
    addr: u8,
) -> Secondary<B> {
    match primary.new_secondary(name, addr) {
        Some(client) => {
            debug!(name, addr, "Bound secondary peripheral");
            Secondary::Present(client)
        }
        None => Secondary::Absent,
    }
}

#[derive(Debug)]
enum Resource {
    Secondary,
    DeviceNode(DeviceId),
}

/// Handles and acquired resources of one logical device.
pub struct Attachment<B: I2c> {
    rgb: I2cClient<B>,
    lcd: Secondary<B>,
    registry: Arc<dyn DeviceRegistry>,
    rgb_ready: bool,
    lcd_ready: bool,
    resources: Vec<Resource>,
}

impl<B: I2c> Attachment<B> {
    pub fn new(primary: I2cClient<B>, registry: Arc<dyn DeviceRegistry>) -> Self {
        Self {
            rgb: primary,
            lcd: Secondary::Absent,
            registry,
            rgb_ready: false,
            lcd_ready: false,
            resources: Vec::new(),
        }
    }

    pub fn rgb(&self) -> &I2cClient<B> {
        &self.rgb
    }

    pub fn lcd(&self) -> &Secondary<B> {
        &self.lcd
    }

    pub fn device_id(&self) -> Option<DeviceId> {
        self.resources.iter().find_map(|r| match r {
            Resource::DeviceNode(id) => Some(*id),
            Resource::Secondary => None,
        })
    }

    /// Run the backlight power-on sequence, finishing with `color`.
    pub fn init_rgb(&mut self, color: Color) -> Result<()> {
        debug!(addr = self.rgb.addr(), "Initializing RGB backlight");
        sequencer::run(&self.rgb, &rgb::init_sequence(color)).inspect_err(|_| {
            error!("Failed to initialize the RGB backlight");
        })?;
        self.rgb_ready = true;
        Ok(())
    }

    /// Bind the LCD controller at `addr`.
    ///
    /// With `required` unset a missing controller is logged and the device
    /// carries on without it.
    pub fn bind_lcd(&mut self, addr: u8, required: bool) -> Result<()> {
        self.lcd = bind_secondary(&self.rgb, LCD_CLIENT_NAME, addr);
        match &self.lcd {
            Secondary::Present(_) => {
                self.resources.push(Resource::Secondary);
                Ok(())
            }
            Secondary::Absent if required => {
                error!(addr, "Can not fetch secondary I2C device");
                Err(Error::NoDevice(format!("{LCD_CLIENT_NAME}@0x{addr:02x}")))
            }
            Secondary::Absent => {
                info!(addr, "Can not fetch secondary I2C device, continuing without LCD");
                Ok(())
            }
        }
    }

    /// Run the LCD power-on sequence if the controller is bound.
    pub fn init_lcd(&mut self) -> Result<()> {
        if let Secondary::Present(client) = &self.lcd {
            debug!(addr = client.addr(), "Initializing LCD");
            sequencer::run(client, &lcd::init_sequence()).inspect_err(|_| {
                error!("Failed to initialize the LCD");
            })?;
            self.lcd_ready = true;
        }
        Ok(())
    }

    /// Publish the device under `name`.
    pub fn register(&mut self, name: &str) -> Result<DeviceId> {
        let id = self.registry.register_device_node(name)?;
        self.resources.push(Resource::DeviceNode(id));
        Ok(id)
    }

    /// Blank initialized peripherals, then release resources newest first.
    ///
    /// Teardown is best effort: a failed blank sequence is logged and the
    /// remaining steps still run. The first failure is returned.
    pub fn release(&mut self) -> Result<()> {
        let mut first_err = None;

        if std::mem::take(&mut self.lcd_ready) {
            if let Secondary::Present(client) = &self.lcd {
                if let Err(e) = sequencer::run(client, &lcd::blank_sequence()) {
                    warn!(error = %e, "Failed to blank the LCD");
                    first_err.get_or_insert(e);
                }
            }
        }

        if std::mem::take(&mut self.rgb_ready) {
            if let Err(e) = sequencer::run(&self.rgb, &rgb::blank_sequence()) {
                warn!(error = %e, "Failed to blank the RGB backlight");
                first_err.get_or_insert(e);
            }
        }

        while let Some(resource) = self.resources.pop() {
            match resource {
                Resource::DeviceNode(id) => self.registry.unregister_device_node(id),
                Resource::Secondary => {
                    if let Secondary::Present(client) =
                        std::mem::replace(&mut self.lcd, Secondary::Absent)
                    {
                        debug!(addr = client.addr(), "Unregistered secondary peripheral");
                    }
                }
            }
        }

        first_err.map_or(Ok(()), Err)
    }
}

impl<B: I2c> Drop for Attachment<B> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "Errors while releasing device");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_trait::SimI2c;
    use crate::registry::LocalRegistry;
    use parking_lot::Mutex;

    const RGB: u8 = rgb::RGB_I2C_ADDR;
    const LCD: u8 = lcd::LCD_I2C_ADDR;

    fn setup(present: &[u8]) -> (Arc<Mutex<SimI2c>>, Arc<LocalRegistry>, Attachment<SimI2c>) {
        let bus = Arc::new(Mutex::new(SimI2c::new(present)));
        let registry = Arc::new(LocalRegistry::default());
        let primary = I2cClient::new(Arc::clone(&bus), "rgb", RGB);
        let attachment = Attachment::new(primary, registry.clone());
        (bus, registry, attachment)
    }

    #[test]
    fn test_bind_secondary_absent() {
        let (_bus, _registry, mut attachment) = setup(&[RGB]);
        attachment.bind_lcd(LCD, false).unwrap();
        assert!(!attachment.lcd().is_present());
    }

    #[test]
    fn test_required_secondary_absent_fails() {
        let (_bus, _registry, mut attachment) = setup(&[RGB]);
        let err = attachment.bind_lcd(LCD, true).unwrap_err();
        assert!(matches!(err, Error::NoDevice(_)));
    }

    #[test]
    fn test_drop_unwinds_in_reverse() {
        let (bus, registry, mut attachment) = setup(&[RGB, LCD]);
        attachment.init_rgb(Color::DEFAULT).unwrap();
        attachment.bind_lcd(LCD, false).unwrap();
        attachment.init_lcd().unwrap();
        attachment.register("grove").unwrap();
        assert_eq!(registry.len(), 1);
        bus.lock().clear_log();

        drop(attachment);

        assert!(registry.is_empty());
        let writes: Vec<(u8, Vec<u8>)> = bus.lock().writes().to_vec();
        assert_eq!(
            writes,
            vec![
                (LCD, vec![0x80, 0x01]),
                (LCD, vec![0x80, 0x08]),
                (RGB, vec![0x04, 0x00]),
                (RGB, vec![0x03, 0x00]),
                (RGB, vec![0x02, 0x00]),
            ]
        );
    }

    #[test]
    fn test_release_continues_after_bus_failure() {
        let (bus, registry, mut attachment) = setup(&[RGB, LCD]);
        attachment.init_rgb(Color::DEFAULT).unwrap();
        attachment.bind_lcd(LCD, false).unwrap();
        attachment.init_lcd().unwrap();
        attachment.register("grove").unwrap();
        bus.lock().fail_after(LCD, 0);

        assert!(matches!(attachment.release(), Err(Error::Bus { addr: LCD, .. })));
        // The backlight still got blanked and the node is gone.
        assert_eq!(bus.lock().pairs_to(RGB).last(), Some(&(0x02, 0x00)));
        assert!(registry.is_empty());
        assert!(!attachment.lcd().is_present());

        // Nothing left to do the second time around.
        bus.lock().clear_log();
        attachment.release().unwrap();
        assert!(bus.lock().writes().is_empty());
    }

    #[test]
    fn test_uninitialized_attachment_releases_quietly() {
        let (bus, _registry, attachment) = setup(&[RGB]);
        drop(attachment);
        assert!(bus.lock().writes().is_empty());
    }
}
