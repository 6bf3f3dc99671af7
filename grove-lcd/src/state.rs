//! In-memory device state: backlight color and the two display lines.
//!
//! The whole record sits behind one lock owned by the logical device; the
//! types here are plain values and do no locking themselves.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Characters per display line.
pub const LINE_SIZE: usize = 16;

/// Byte used to pad a line to `LINE_SIZE`.
const PAD: u8 = b' ';

/// Backlight color, one 8-bit PWM value per channel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    /// Color programmed when the device is attached.
    pub const DEFAULT: Color = Color::new(0x00, 0xff, 0x00);
    pub const OFF: Color = Color::new(0x00, 0x00, 0x00);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub const fn to_bytes(self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }

    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }
}

/// Which of the two display lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineId {
    One,
    Two,
}

impl LineId {
    fn index(self) -> usize {
        match self {
            LineId::One => 0,
            LineId::Two => 1,
        }
    }
}

impl TryFrom<u8> for LineId {
    type Error = Error;

    fn try_from(position: u8) -> Result<Self> {
        match position {
            1 => Ok(LineId::One),
            2 => Ok(LineId::Two),
            other => Err(Error::InvalidArgument(format!("no display line {other}"))),
        }
    }
}

/// One fixed-width line of display text, always padded to `LINE_SIZE`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DisplayLine([u8; LINE_SIZE]);

impl DisplayLine {
    pub const fn blank() -> Self {
        Self([PAD; LINE_SIZE])
    }

    /// Replace the contents with `text`, truncated at the first NUL or at
    /// `LINE_SIZE` bytes, whichever comes first.
    pub fn set(&mut self, text: &[u8]) {
        let len = text
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(text.len())
            .min(LINE_SIZE);
        self.0 = [PAD; LINE_SIZE];
        self.0[..len].copy_from_slice(&text[..len]);
    }

    pub fn as_bytes(&self) -> &[u8; LINE_SIZE] {
        &self.0
    }
}

impl Default for DisplayLine {
    fn default() -> Self {
        Self::blank()
    }
}

impl fmt::Display for DisplayLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for DisplayLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayLine({:?})", self.to_string())
    }
}

/// Everything the device remembers between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub color: Color,
    lines: [DisplayLine; 2],
}

impl DeviceState {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            lines: [DisplayLine::blank(); 2],
        }
    }

    pub fn line(&self, id: LineId) -> &DisplayLine {
        &self.lines[id.index()]
    }

    pub fn set_line(&mut self, id: LineId, text: &[u8]) {
        self.lines[id.index()].set(text);
    }

    pub fn clear_lines(&mut self) {
        self.lines = [DisplayLine::blank(); 2];
    }

    /// Both lines, each followed by a newline.
    pub fn lines_text(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 * (LINE_SIZE + 1));
        for line in &self.lines {
            out.extend_from_slice(line.as_bytes());
            out.push(b'\n');
        }
        out
    }
}
