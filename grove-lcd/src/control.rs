//! Control-request surface of the device.
//!
//! A closed set of ioctl-style requests, each carrying a fixed-size payload
//! across the caller boundary. Payloads are copied in before any state is
//! touched and copied out only after the request has been applied, so a
//! failed copy never leaves a half-applied request behind.

use std::mem::size_of;

use strum::IntoEnumIterator;

use crate::device::LogicalDevice;
use crate::error::{Error, Result};
use crate::hw_trait::I2c;
use crate::state::{Color, LineId, LINE_SIZE};
use crate::tracing::prelude::*;

/// ioctl type byte of every request.
pub const IOC_MAGIC: u8 = b'g';

/// Text capacity of a [`StringPayload`]: both lines plus their newlines.
pub const STRING_CAPACITY: usize = 2 * LINE_SIZE + 2;

pub const COLOR_PAYLOAD_SIZE: usize = size_of::<Color>();
pub const STRING_PAYLOAD_SIZE: usize = size_of::<StringPayload>();

pub const GET_COLOR: u32 = nix::request_code_read!(IOC_MAGIC, 1, COLOR_PAYLOAD_SIZE) as u32;
pub const SET_COLOR: u32 = nix::request_code_write!(IOC_MAGIC, 2, COLOR_PAYLOAD_SIZE) as u32;
pub const CLEAR_LCD: u32 = nix::request_code_none!(IOC_MAGIC, 3) as u32;
pub const WRITE_LINE: u32 = nix::request_code_write!(IOC_MAGIC, 4, STRING_PAYLOAD_SIZE) as u32;
pub const READ_LINES: u32 = nix::request_code_read!(IOC_MAGIC, 5, STRING_PAYLOAD_SIZE) as u32;
pub const GET_LINE_CAPACITY: u32 = nix::request_code_read!(IOC_MAGIC, 6, size_of::<u32>()) as u32;

/// Text exchanged with WRITE_LINE and READ_LINES.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringPayload {
    /// Target line for WRITE_LINE (1 or 2)
    pub position: u8,
    /// NUL-terminated unless full
    pub data: [u8; STRING_CAPACITY],
}

impl StringPayload {
    pub fn new(position: u8, text: &[u8]) -> Self {
        let mut data = [0u8; STRING_CAPACITY];
        let len = text.len().min(STRING_CAPACITY);
        data[..len].copy_from_slice(&text[..len]);
        Self { position, data }
    }

    /// Text up to the first NUL.
    pub fn text(&self) -> &[u8] {
        let len = self
            .data
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(STRING_CAPACITY);
        &self.data[..len]
    }

    pub fn to_bytes(&self) -> [u8; STRING_PAYLOAD_SIZE] {
        let mut out = [0u8; STRING_PAYLOAD_SIZE];
        out[0] = self.position;
        out[1..].copy_from_slice(&self.data);
        out
    }

    pub fn from_bytes(raw: &[u8; STRING_PAYLOAD_SIZE]) -> Self {
        let mut data = [0u8; STRING_CAPACITY];
        data.copy_from_slice(&raw[1..]);
        Self {
            position: raw[0],
            data,
        }
    }
}

/// The recognized requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    GetColor,
    SetColor,
    ClearLcd,
    WriteLine,
    ReadLines,
    GetLineCapacity,
}

impl Request {
    pub const fn code(self) -> u32 {
        match self {
            Request::GetColor => GET_COLOR,
            Request::SetColor => SET_COLOR,
            Request::ClearLcd => CLEAR_LCD,
            Request::WriteLine => WRITE_LINE,
            Request::ReadLines => READ_LINES,
            Request::GetLineCapacity => GET_LINE_CAPACITY,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Request::iter().find(|request| request.code() == code)
    }
}

/// Caller-side memory a request argument points at.
///
/// Either copy may fail, e.g. when the caller's buffer is too small.
pub trait UserBuffer {
    /// Fill `dst` from the caller.
    fn copy_in(&self, dst: &mut [u8]) -> Result<()>;

    /// Hand `src` back to the caller.
    fn copy_out(&mut self, src: &[u8]) -> Result<()>;
}

/// A caller buffer backed by a byte slice.
#[derive(Debug)]
pub struct UserSlice<'a> {
    buf: &'a mut [u8],
}

impl<'a> UserSlice<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }
}

impl UserBuffer for UserSlice<'_> {
    fn copy_in(&self, dst: &mut [u8]) -> Result<()> {
        let src = self.buf.get(..dst.len()).ok_or(Error::Fault)?;
        dst.copy_from_slice(src);
        Ok(())
    }

    fn copy_out(&mut self, src: &[u8]) -> Result<()> {
        let dst = self.buf.get_mut(..src.len()).ok_or(Error::Fault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

/// The argument of a request that was issued without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArg;

impl UserBuffer for NoArg {
    fn copy_in(&self, _dst: &mut [u8]) -> Result<()> {
        Err(Error::Fault)
    }

    fn copy_out(&mut self, _src: &[u8]) -> Result<()> {
        Err(Error::Fault)
    }
}

// Input decoded from the caller before the state lock is taken.
enum Input {
    None,
    Color(Color),
    Line(LineId, StringPayload),
}

fn decode_input(request: Request, arg: &dyn UserBuffer) -> Result<Input> {
    match request {
        Request::SetColor => {
            let mut raw = [0u8; COLOR_PAYLOAD_SIZE];
            arg.copy_in(&mut raw)?;
            Ok(Input::Color(Color::from_bytes(raw)))
        }
        Request::WriteLine => {
            let mut raw = [0u8; STRING_PAYLOAD_SIZE];
            arg.copy_in(&mut raw)?;
            let payload = StringPayload::from_bytes(&raw);
            let line = LineId::try_from(payload.position)?;
            Ok(Input::Line(line, payload))
        }
        _ => Ok(Input::None),
    }
}

impl<B: I2c> LogicalDevice<B> {
    /// Execute the control request `code` with argument `arg`.
    ///
    /// Unknown codes are rejected with `InvalidArgument` and change nothing.
    pub fn ioctl(&self, code: u32, arg: &mut dyn UserBuffer) -> Result<i64> {
        let request = Request::from_code(code).ok_or_else(|| {
            debug!(code, "Unknown control request");
            Error::InvalidArgument(format!("unknown request 0x{code:08x}"))
        })?;
        trace!(%request, "Control request");

        let input = decode_input(request, arg)?;

        let mut state = self.lock();
        match (request, input) {
            (Request::GetColor, _) => {
                let color = state.color;
                arg.copy_out(&color.to_bytes()).map_err(|_| {
                    Error::InvalidArgument("color could not be copied out".into())
                })?;
            }
            (Request::SetColor, Input::Color(color)) => {
                self.apply_color(&mut state, color)?;
            }
            (Request::ClearLcd, _) => {
                self.apply_clear(&mut state)?;
            }
            (Request::WriteLine, Input::Line(line, payload)) => {
                state.set_line(line, payload.text());
            }
            (Request::ReadLines, _) => {
                let payload = StringPayload::new(0, &state.lines_text());
                arg.copy_out(&payload.to_bytes())?;
            }
            (Request::GetLineCapacity, _) => {
                arg.copy_out(&(LINE_SIZE as u32).to_ne_bytes())?;
            }
            (request, _) => {
                return Err(Error::InvalidArgument(format!("{request}: missing payload")));
            }
        }

        Ok(0)
    }
}
