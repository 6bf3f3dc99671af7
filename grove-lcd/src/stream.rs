//! Byte-stream surface of the device.
//!
//! Reading yields a text snapshot of the color and both display lines.
//! Writing accepts a short color command of the form `r<N> g<N> b<N>`.

use std::io::Write as _;

use crate::device::LogicalDevice;
use crate::error::{Error, Result};
use crate::hw_trait::I2c;
use crate::state::{Color, DeviceState, LINE_SIZE};

/// Largest write accepted, in bytes.
pub const MAX_WRITE: usize = 15;

const SNAPSHOT_HEADER: &str = "Grove-LCD RGB Backlight\n";
const SNAPSHOT_CAPACITY: usize = 128 + 2 * (LINE_SIZE + 1);

/// Render the read-side snapshot of `state`.
pub fn format_snapshot(state: &DeviceState) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.try_reserve(SNAPSHOT_CAPACITY)
        .map_err(|e| Error::Allocation(e.to_string()))?;

    let Color { red, green, blue } = state.color;
    write!(
        out,
        "{SNAPSHOT_HEADER}Red: 0x{red:x}\nGreen: 0x{green:x}\nBlue: 0x{blue:x}\nDisplay Text:\n"
    )?;
    out.extend_from_slice(&state.lines_text());
    Ok(out)
}

/// The three channels of a color command, in the order they must appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    const ORDER: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    fn tag(self) -> char {
        match self {
            Channel::Red => 'r',
            Channel::Green => 'g',
            Channel::Blue => 'b',
        }
    }
}

/// One space-delimited token of a color command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub position: usize,
    pub text: &'a str,
}

/// Lazily splits a command into tokens on single spaces.
///
/// Consecutive spaces produce empty tokens, which the grammar rejects.
pub struct Tokenizer<'a> {
    parts: std::iter::Enumerate<std::str::Split<'a, char>>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            parts: input.split(' ').enumerate(),
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.parts
            .next()
            .map(|(position, text)| Token { position, text })
    }
}

fn parse_channel(token: Token<'_>, channel: Channel) -> Result<u8> {
    let digits = token.text.strip_prefix(channel.tag()).ok_or_else(|| {
        Error::Format(format!(
            "token {} must start with '{}', got {:?}",
            token.position,
            channel.tag(),
            token.text
        ))
    })?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Format(format!(
            "token {}: {:?} is not a decimal number",
            token.position, digits
        )));
    }
    digits.parse::<u8>().map_err(|_| {
        Error::Format(format!(
            "token {}: {} is out of range 0-255",
            token.position, digits
        ))
    })
}

/// Parse `r<N> g<N> b<N>`; one trailing newline is tolerated.
pub fn parse_color(input: &[u8]) -> Result<Color> {
    let text = std::str::from_utf8(input)
        .map_err(|_| Error::Format("command is not valid UTF-8".into()))?;
    let text = text.strip_suffix('\n').unwrap_or(text);

    let mut tokens = Tokenizer::new(text);
    let mut values = [0u8; 3];
    for (value, channel) in values.iter_mut().zip(Channel::ORDER) {
        let token = tokens
            .next()
            .ok_or_else(|| Error::Format(format!("missing '{}' token", channel.tag())))?;
        *value = parse_channel(token, channel)?;
    }
    if let Some(extra) = tokens.next() {
        return Err(Error::Format(format!(
            "unexpected token {} {:?}",
            extra.position, extra.text
        )));
    }

    Ok(Color::from_bytes(values))
}

impl<B: I2c> LogicalDevice<B> {
    /// Copy part of the status snapshot into `buf`, starting at `offset`.
    ///
    /// Returns 0 once `offset` reaches the end of the snapshot.
    pub fn read(&self, offset: &mut u64, buf: &mut [u8]) -> Result<usize> {
        let state = self.lock();
        let snapshot = format_snapshot(&state)?;

        let start = match usize::try_from(*offset) {
            Ok(start) if start < snapshot.len() => start,
            _ => return Ok(0),
        };
        let count = (snapshot.len() - start).min(buf.len());
        buf[..count].copy_from_slice(&snapshot[start..start + count]);
        *offset += count as u64;
        Ok(count)
    }

    /// Parse a color command and program it into the backlight.
    ///
    /// Malformed input is rejected before any state or bus is touched.
    pub fn write(&self, offset: &mut u64, data: &[u8]) -> Result<usize> {
        let start = usize::try_from(*offset)
            .ok()
            .filter(|&start| start < MAX_WRITE)
            .ok_or_else(|| Error::InvalidArgument(format!("offset {offset} out of range")))?;
        if data.len() > MAX_WRITE - start {
            return Err(Error::InvalidArgument(format!(
                "write of {} bytes exceeds {} byte limit",
                data.len(),
                MAX_WRITE
            )));
        }

        let color = parse_color(data)?;

        let mut state = self.lock();
        self.apply_color(&mut state, color)?;
        *offset += data.len() as u64;
        Ok(data.len())
    }
}
