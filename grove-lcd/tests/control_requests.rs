//! Control requests against an attached device.

use std::sync::Arc;

use parking_lot::Mutex;

use grove_lcd::config::DeviceConfig;
use grove_lcd::control::{
    self, NoArg, StringPayload, UserSlice, COLOR_PAYLOAD_SIZE, STRING_PAYLOAD_SIZE,
};
use grove_lcd::hw_trait::{I2cClient, SimI2c};
use grove_lcd::peripheral::{lcd::LCD_I2C_ADDR, rgb::RGB_I2C_ADDR};
use grove_lcd::registry::LocalRegistry;
use grove_lcd::{Color, Error, LogicalDevice};

fn attach(present: &[u8]) -> (Arc<Mutex<SimI2c>>, LogicalDevice<SimI2c>) {
    let bus = Arc::new(Mutex::new(SimI2c::new(present)));
    let primary = I2cClient::new(Arc::clone(&bus), "rgb", RGB_I2C_ADDR);
    let device = LogicalDevice::attach(
        primary,
        Arc::new(LocalRegistry::default()),
        &DeviceConfig::default(),
    )
    .unwrap();
    bus.lock().clear_log();
    (bus, device)
}

fn get_color(device: &LogicalDevice<SimI2c>) -> Color {
    let mut raw = [0u8; COLOR_PAYLOAD_SIZE];
    device
        .ioctl(control::GET_COLOR, &mut UserSlice::new(&mut raw))
        .unwrap();
    Color::from_bytes(raw)
}

fn set_color(device: &LogicalDevice<SimI2c>, color: Color) -> grove_lcd::Result<i64> {
    let mut raw = color.to_bytes();
    device.ioctl(control::SET_COLOR, &mut UserSlice::new(&mut raw))
}

fn write_line(device: &LogicalDevice<SimI2c>, position: u8, text: &[u8]) -> grove_lcd::Result<i64> {
    let mut raw = StringPayload::new(position, text).to_bytes();
    device.ioctl(control::WRITE_LINE, &mut UserSlice::new(&mut raw))
}

fn read_lines(device: &LogicalDevice<SimI2c>) -> Vec<u8> {
    let mut raw = [0u8; STRING_PAYLOAD_SIZE];
    device
        .ioctl(control::READ_LINES, &mut UserSlice::new(&mut raw))
        .unwrap();
    StringPayload::from_bytes(&raw).text().to_vec()
}

#[test]
fn color_round_trip_through_both_interfaces() {
    let (bus, device) = attach(&[RGB_I2C_ADDR, LCD_I2C_ADDR]);

    assert_eq!(set_color(&device, Color::new(10, 20, 30)).unwrap(), 0);
    assert_eq!(get_color(&device), Color::new(10, 20, 30));
    assert_eq!(
        bus.lock().pairs_to(RGB_I2C_ADDR),
        vec![(0x04, 10), (0x03, 20), (0x02, 30)]
    );

    let mut offset = 0;
    device.write(&mut offset, b"r1 g2 b3").unwrap();
    assert_eq!(get_color(&device), Color::new(1, 2, 3));
}

#[test]
fn write_line_then_read_lines() {
    let (bus, device) = attach(&[RGB_I2C_ADDR, LCD_I2C_ADDR]);

    write_line(&device, 1, b"Hello").unwrap();
    write_line(&device, 2, b"an overly long second line").unwrap();

    assert_eq!(
        read_lines(&device),
        b"Hello           \nan overly long s\n".to_vec()
    );
    // Buffered only.
    assert!(bus.lock().writes().is_empty());
}

#[test]
fn write_line_rejects_bad_position() {
    let (_bus, device) = attach(&[RGB_I2C_ADDR, LCD_I2C_ADDR]);
    write_line(&device, 1, b"keep").unwrap();

    for position in [0, 3, 0xff] {
        let err = write_line(&device, position, b"lost").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
    assert!(read_lines(&device).starts_with(b"keep "));
}

#[test]
fn clear_lcd_blanks_buffers_and_panel() {
    let (bus, device) = attach(&[RGB_I2C_ADDR, LCD_I2C_ADDR]);
    write_line(&device, 1, b"Hello").unwrap();

    device.ioctl(control::CLEAR_LCD, &mut NoArg).unwrap();

    let blank = format!("{:16}\n{:16}\n", "", "").into_bytes();
    assert_eq!(read_lines(&device), blank);
    assert_eq!(bus.lock().pairs_to(LCD_I2C_ADDR), vec![(0x80, 0x01)]);
}

#[test]
fn clear_lcd_without_lcd_reports_no_device() {
    let (bus, device) = attach(&[RGB_I2C_ADDR]);
    write_line(&device, 2, b"text").unwrap();

    let err = device.ioctl(control::CLEAR_LCD, &mut NoArg).unwrap_err();
    assert!(matches!(err, Error::NoDevice(_)));
    assert_eq!(err.errno(), nix::errno::Errno::ENODEV);
    // The in-memory lines are still cleared.
    assert!(read_lines(&device).iter().all(|&b| b == b' ' || b == b'\n'));
    assert!(bus.lock().writes().is_empty());
}

#[test]
fn line_capacity() {
    let (_bus, device) = attach(&[RGB_I2C_ADDR]);
    let mut raw = [0u8; 4];
    device
        .ioctl(control::GET_LINE_CAPACITY, &mut UserSlice::new(&mut raw))
        .unwrap();
    assert_eq!(u32::from_ne_bytes(raw), 16);
}

#[test]
fn unknown_request_changes_nothing() {
    let (bus, device) = attach(&[RGB_I2C_ADDR, LCD_I2C_ADDR]);
    let mut raw = [1u8, 2, 3];

    let err = device
        .ioctl(0x1234_5678, &mut UserSlice::new(&mut raw))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(err.errno(), nix::errno::Errno::EINVAL);
    assert_eq!(get_color(&device), Color::DEFAULT);
    assert!(bus.lock().writes().is_empty());
}

#[test]
fn short_input_buffer_faults_without_side_effects() {
    let (bus, device) = attach(&[RGB_I2C_ADDR, LCD_I2C_ADDR]);

    let mut short = [1u8, 2];
    let err = device
        .ioctl(control::SET_COLOR, &mut UserSlice::new(&mut short))
        .unwrap_err();
    assert!(matches!(err, Error::Fault));
    assert_eq!(err.errno(), nix::errno::Errno::EFAULT);

    let err = device.ioctl(control::WRITE_LINE, &mut NoArg).unwrap_err();
    assert!(matches!(err, Error::Fault));

    assert_eq!(get_color(&device), Color::DEFAULT);
    assert!(bus.lock().writes().is_empty());
}

#[test]
fn short_output_buffer() {
    let (_bus, device) = attach(&[RGB_I2C_ADDR, LCD_I2C_ADDR]);

    let mut short = [0u8; 2];
    let err = device
        .ioctl(control::GET_COLOR, &mut UserSlice::new(&mut short))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let mut short = [0u8; 8];
    let err = device
        .ioctl(control::READ_LINES, &mut UserSlice::new(&mut short))
        .unwrap_err();
    assert!(matches!(err, Error::Fault));
}

#[test]
fn failed_bus_write_reports_io_error() {
    let (bus, device) = attach(&[RGB_I2C_ADDR, LCD_I2C_ADDR]);
    bus.lock().fail_after(RGB_I2C_ADDR, 1);

    let err = set_color(&device, Color::new(7, 8, 9)).unwrap_err();
    assert!(matches!(err, Error::Bus { addr: RGB_I2C_ADDR, .. }));
    assert_eq!(err.errno(), nix::errno::Errno::EIO);
    // Only the first channel reached the controller.
    assert_eq!(bus.lock().pairs_to(RGB_I2C_ADDR), vec![(0x04, 7)]);
}
