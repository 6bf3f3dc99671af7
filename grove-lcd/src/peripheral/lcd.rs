//! Character LCD controller.
//!
//! Every transfer is a control byte followed by one byte of payload. The
//! control byte says whether the payload is an instruction or display data.

use bitflags::bitflags;

use crate::sequencer::Command;

/// LCD controller I2C address
pub const LCD_I2C_ADDR: u8 = 0x3e;

/// Control bytes
pub mod control {
    /// Payload is an instruction
    pub const COMMAND: u8 = 0x80;
    /// Payload is character data
    pub const DATA: u8 = 0x40;
}

/// Instruction opcodes
pub mod instructions {
    pub const CLEAR_DISPLAY: u8 = 0x01;
    pub const RETURN_HOME: u8 = 0x02;
    pub const ENTRY_MODE_SET: u8 = 0x04;
    pub const DISPLAY_CONTROL: u8 = 0x08;
    pub const FUNCTION_SET: u8 = 0x20;
}

bitflags! {
    /// Flags for `FUNCTION_SET`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FunctionSet: u8 {
        const EIGHT_BIT = 0x10;
        const TWO_LINE = 0x08;
        const FONT_5X10 = 0x04;
    }

    /// Flags for `DISPLAY_CONTROL`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DisplayControl: u8 {
        const DISPLAY_ON = 0x04;
        const CURSOR_ON = 0x02;
        const BLINK_ON = 0x01;
    }

    /// Flags for `ENTRY_MODE_SET`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryMode: u8 {
        const INCREMENT = 0x02;
        const SHIFT = 0x01;
    }
}

fn instruction(opcode: u8) -> Command {
    Command::new(control::COMMAND, opcode)
}

/// Two-line mode, display on with cursor hidden, cleared, left-to-right entry.
pub fn init_sequence() -> [Command; 4] {
    [
        instruction(instructions::FUNCTION_SET | FunctionSet::TWO_LINE.bits()),
        instruction(instructions::DISPLAY_CONTROL | DisplayControl::DISPLAY_ON.bits()),
        instruction(instructions::CLEAR_DISPLAY),
        instruction(instructions::ENTRY_MODE_SET | EntryMode::INCREMENT.bits()),
    ]
}

pub fn clear_sequence() -> [Command; 1] {
    [instruction(instructions::CLEAR_DISPLAY)]
}

/// Clear the panel and switch it off.
pub fn blank_sequence() -> [Command; 2] {
    [
        instruction(instructions::CLEAR_DISPLAY),
        instruction(instructions::DISPLAY_CONTROL | DisplayControl::empty().bits()),
    ]
}
