//! RGB backlight controller.
//!
//! A four-channel PWM LED driver; three channels drive the red, green and
//! blue backlight LEDs.

use crate::sequencer::Command;
use crate::state::Color;

/// Backlight controller I2C address
pub const RGB_I2C_ADDR: u8 = 0x62;

/// Register addresses
pub mod registers {
    pub const MODE1: u8 = 0x00;
    pub const MODE2: u8 = 0x01;
    pub const PWM_BLUE: u8 = 0x02;
    pub const PWM_GREEN: u8 = 0x03;
    pub const PWM_RED: u8 = 0x04;
    pub const LEDOUT: u8 = 0x08;
}

/// MODE1 with SLEEP cleared: oscillator running
pub const MODE1_NORMAL: u8 = 0x00;
/// MODE2 defaults
pub const MODE2_DEFAULT: u8 = 0x00;
/// Every LED output controlled by its PWM register
pub const LEDOUT_PWM_ALL: u8 = 0xAA;

/// Power-on sequence: leave sleep, route outputs to PWM, then program `color`.
pub fn init_sequence(color: Color) -> [Command; 6] {
    let [red, green, blue] = color_sequence(color);
    [
        Command::new(registers::MODE1, MODE1_NORMAL),
        Command::new(registers::MODE2, MODE2_DEFAULT),
        Command::new(registers::LEDOUT, LEDOUT_PWM_ALL),
        red,
        green,
        blue,
    ]
}

/// Program the three PWM channels, red first.
pub fn color_sequence(color: Color) -> [Command; 3] {
    [
        Command::new(registers::PWM_RED, color.red),
        Command::new(registers::PWM_GREEN, color.green),
        Command::new(registers::PWM_BLUE, color.blue),
    ]
}

/// Turn the backlight off.
pub fn blank_sequence() -> [Command; 3] {
    color_sequence(Color::OFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(seq: &[Command]) -> Vec<(u8, u8)> {
        seq.iter().map(|c| (c.cmd, c.val)).collect()
    }

    #[test]
    fn test_init_sequence() {
        assert_eq!(
            pairs(&init_sequence(Color::DEFAULT)),
            vec![
                (0x00, 0x00),
                (0x01, 0x00),
                (0x08, 0xaa),
                (0x04, 0x00),
                (0x03, 0xff),
                (0x02, 0x00),
            ]
        );
    }

    #[test]
    fn test_blank_sequence() {
        assert_eq!(pairs(&blank_sequence()), vec![(0x04, 0), (0x03, 0), (0x02, 0)]);
    }
}
