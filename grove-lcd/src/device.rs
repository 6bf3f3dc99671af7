//! The logical Grove-LCD device.
//!
//! A [`LogicalDevice`] exists between a successful attach and detach. It owns
//! the peripheral handles and the shared state, and every entry point goes
//! through it. One lock guards the state; an operation keeps it for its whole
//! duration, bus writes included, so callers are strictly serialized and the
//! in-memory state never disagrees with what an in-flight operation is
//! writing to the hardware.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::binder::{Attachment, Secondary};
use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::hw_trait::{I2c, I2cClient};
use crate::peripheral::{lcd, rgb};
use crate::registry::{DeviceId, DeviceRegistry};
use crate::sequencer;
use crate::state::{Color, DeviceState, LineId, LINE_SIZE};
use crate::tracing::prelude::*;

pub struct LogicalDevice<B: I2c> {
    name: String,
    id: DeviceId,
    attachment: Attachment<B>,
    state: Mutex<DeviceState>,
}

impl<B: I2c> LogicalDevice<B> {
    /// Bring up the device behind the matched `primary` peripheral.
    ///
    /// The device is registered only after the backlight and, when bound,
    /// the LCD have been initialized. Any failure unwinds everything
    /// acquired so far.
    pub fn attach(
        primary: I2cClient<B>,
        registry: Arc<dyn DeviceRegistry>,
        config: &DeviceConfig,
    ) -> Result<Self> {
        info!(name = %config.name, addr = primary.addr(), "Attaching device");

        let mut attachment = Attachment::new(primary, registry);
        attachment.init_rgb(Color::DEFAULT)?;
        attachment.bind_lcd(config.lcd_address, config.require_lcd)?;
        attachment.init_lcd()?;
        let id = attachment.register(&config.name)?;

        info!(
            name = %config.name,
            %id,
            lcd = attachment.lcd().is_present(),
            "Device attached"
        );
        Ok(Self {
            name: config.name.clone(),
            id,
            attachment,
            state: Mutex::new(DeviceState::new(Color::DEFAULT)),
        })
    }

    /// Blank the peripherals and release everything the device holds.
    ///
    /// Bus failures are reported but do not stop the teardown.
    pub fn detach(mut self) -> Result<()> {
        info!(name = %self.name, id = %self.id, "Detaching device");
        let mut state = self.state.lock();
        state.color = Color::OFF;
        state.clear_lines();
        self.attachment.release()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn has_lcd(&self) -> bool {
        self.attachment.lcd().is_present()
    }

    /// Take the state lock.
    pub(crate) fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock()
    }

    /// Store `color` and program it into the backlight.
    ///
    /// Takes the locked state so the write happens under the lock.
    pub(crate) fn apply_color(&self, state: &mut DeviceState, color: Color) -> Result<()> {
        state.color = color;
        sequencer::run(self.attachment.rgb(), &rgb::color_sequence(color))
    }

    /// Blank both lines and clear the panel.
    ///
    /// Without an LCD only the buffers are cleared and `NoDevice` is
    /// returned.
    pub(crate) fn apply_clear(&self, state: &mut DeviceState) -> Result<()> {
        state.clear_lines();
        match self.attachment.lcd() {
            Secondary::Present(client) => sequencer::run(client, &lcd::clear_sequence()),
            Secondary::Absent => Err(Error::NoDevice(format!("{}: no LCD bound", self.name))),
        }
    }

    pub fn get_color(&self) -> Color {
        self.lock().color
    }

    pub fn set_color(&self, color: Color) -> Result<()> {
        let mut state = self.lock();
        self.apply_color(&mut state, color)
    }

    pub fn clear_lcd(&self) -> Result<()> {
        let mut state = self.lock();
        self.apply_clear(&mut state)
    }

    /// Buffer `text` for `line`. Nothing is sent to the panel.
    pub fn write_line(&self, line: LineId, text: &[u8]) {
        self.lock().set_line(line, text);
    }

    pub fn read_lines(&self) -> Vec<u8> {
        self.lock().lines_text()
    }

    pub fn line_capacity(&self) -> usize {
        LINE_SIZE
    }
}

impl<B: I2c> std::fmt::Debug for LogicalDevice<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalDevice")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("lcd", &self.has_lcd())
            .finish()
    }
}
