//! Request server for the daemon.
//!
//! A consumer talks to the daemon over a Unix socket, one JSON object per
//! line. Every request maps onto a byte-stream call or a control request
//! against the [`LogicalDevice`]; control requests go through the same
//! payload copies a native caller would use.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::control::{
    self, NoArg, StringPayload, UserSlice, COLOR_PAYLOAD_SIZE, STRING_PAYLOAD_SIZE,
};
use crate::device::LogicalDevice;
use crate::error::{Error, Result};
use crate::hw_trait::I2c;
use crate::state::Color;
use crate::tracing::prelude::*;

/// Longest request line accepted.
const MAX_LINE: usize = 1024;

/// Largest read served in one request.
const MAX_READ: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Read { offset: u64, len: usize },
    Write { offset: u64, data: String },
    GetColor,
    SetColor { color: Color },
    ClearLcd,
    WriteLine { line: u8, text: String },
    ReadLines,
    LineCapacity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Done,
    Data { data: String, offset: u64 },
    Written { count: usize, offset: u64 },
    Color { color: Color },
    Lines { text: String },
    Capacity { size: u32 },
    Error { errno: i32, message: String },
}

impl Response {
    fn from_error(error: &Error) -> Self {
        Response::Error {
            errno: error.errno() as i32,
            message: error.to_string(),
        }
    }
}

/// Execute one request against `device`.
pub fn handle<B: I2c>(device: &LogicalDevice<B>, request: Request) -> Response {
    execute(device, request).unwrap_or_else(|e| {
        debug!(error = %e, "Request failed");
        Response::from_error(&e)
    })
}

fn execute<B: I2c>(device: &LogicalDevice<B>, request: Request) -> Result<Response> {
    match request {
        Request::Read { mut offset, len } => {
            let mut buf = vec![0u8; len.min(MAX_READ)];
            let count = device.read(&mut offset, &mut buf)?;
            buf.truncate(count);
            Ok(Response::Data {
                data: String::from_utf8_lossy(&buf).into_owned(),
                offset,
            })
        }
        Request::Write { mut offset, data } => {
            let count = device.write(&mut offset, data.as_bytes())?;
            Ok(Response::Written { count, offset })
        }
        Request::GetColor => {
            let mut raw = [0u8; COLOR_PAYLOAD_SIZE];
            device.ioctl(control::GET_COLOR, &mut UserSlice::new(&mut raw))?;
            Ok(Response::Color {
                color: Color::from_bytes(raw),
            })
        }
        Request::SetColor { color } => {
            let mut raw = color.to_bytes();
            device.ioctl(control::SET_COLOR, &mut UserSlice::new(&mut raw))?;
            Ok(Response::Done)
        }
        Request::ClearLcd => {
            device.ioctl(control::CLEAR_LCD, &mut NoArg)?;
            Ok(Response::Done)
        }
        Request::WriteLine { line, text } => {
            let mut raw = StringPayload::new(line, text.as_bytes()).to_bytes();
            device.ioctl(control::WRITE_LINE, &mut UserSlice::new(&mut raw))?;
            Ok(Response::Done)
        }
        Request::ReadLines => {
            let mut raw = [0u8; STRING_PAYLOAD_SIZE];
            device.ioctl(control::READ_LINES, &mut UserSlice::new(&mut raw))?;
            let payload = StringPayload::from_bytes(&raw);
            Ok(Response::Lines {
                text: String::from_utf8_lossy(payload.text()).into_owned(),
            })
        }
        Request::LineCapacity => {
            let mut raw = [0u8; 4];
            device.ioctl(control::GET_LINE_CAPACITY, &mut UserSlice::new(&mut raw))?;
            Ok(Response::Capacity {
                size: u32::from_ne_bytes(raw),
            })
        }
    }
}

/// Parse one request line and render the response line.
pub fn handle_line<B: I2c>(device: &LogicalDevice<B>, line: &str) -> String {
    let response = match serde_json::from_str::<Request>(line) {
        Ok(request) => handle(device, request),
        Err(e) => Response::Error {
            errno: Errno::EINVAL as i32,
            message: format!("malformed request: {e}"),
        },
    };
    render(&response)
}

fn render(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        error!(error = %e, "Failed to serialize response");
        format!(r#"{{"status":"error","errno":{},"message":"internal"}}"#, Errno::EIO as i32)
    })
}

/// Accept connections until `running` is cancelled.
pub async fn serve<B>(
    listener: UnixListener,
    device: Arc<LogicalDevice<B>>,
    running: CancellationToken,
) -> Result<()>
where
    B: I2c + 'static,
{
    let tracker = TaskTracker::new();

    loop {
        tokio::select! {
            _ = running.cancelled() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                trace!("Client connected.");
                tracker.spawn(connection(stream, Arc::clone(&device), running.clone()));
            }
        }
    }

    tracker.close();
    tracker.wait().await;
    Ok(())
}

async fn connection<B>(stream: UnixStream, device: Arc<LogicalDevice<B>>, running: CancellationToken)
where
    B: I2c + 'static,
{
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE));

    loop {
        let line = tokio::select! {
            _ = running.cancelled() => break,
            line = framed.next() => line,
        };
        let line = match line {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                warn!(error = %e, "Dropping client");
                break;
            }
            None => break,
        };

        // Device calls block on the bus; keep them off the async workers.
        let device = Arc::clone(&device);
        let reply = tokio::task::spawn_blocking(move || handle_line(&device, &line))
            .await
            .unwrap_or_else(|e| {
                render(&Response::Error {
                    errno: Errno::EIO as i32,
                    message: e.to_string(),
                })
            });

        if let Err(e) = framed.send(reply).await {
            warn!(error = %e, "Error writing response");
            break;
        }
    }

    trace!("Client disconnected.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::hw_trait::{I2cClient, SimI2c};
    use crate::peripheral::{lcd, rgb};
    use crate::registry::LocalRegistry;
    use parking_lot::Mutex;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn device(present: &[u8]) -> LogicalDevice<SimI2c> {
        let bus = Arc::new(Mutex::new(SimI2c::new(present)));
        let primary = I2cClient::new(bus, "rgb", rgb::RGB_I2C_ADDR);
        LogicalDevice::attach(
            primary,
            Arc::new(LocalRegistry::default()),
            &DeviceConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_color_requests() {
        let device = device(&[rgb::RGB_I2C_ADDR, lcd::LCD_I2C_ADDR]);
        let color = Color::new(10, 20, 30);
        assert_eq!(handle(&device, Request::SetColor { color }), Response::Done);
        assert_eq!(handle(&device, Request::GetColor), Response::Color { color });
    }

    #[test]
    fn test_lines_and_capacity() {
        let device = device(&[rgb::RGB_I2C_ADDR, lcd::LCD_I2C_ADDR]);
        let write = Request::WriteLine {
            line: 2,
            text: "bottom".into(),
        };
        assert_eq!(handle(&device, write), Response::Done);
        assert_eq!(
            handle(&device, Request::ReadLines),
            Response::Lines {
                text: "                \nbottom          \n".into()
            }
        );
        assert_eq!(
            handle(&device, Request::LineCapacity),
            Response::Capacity { size: 16 }
        );
    }

    #[test]
    fn test_stream_requests() {
        let device = device(&[rgb::RGB_I2C_ADDR]);
        let written = handle(
            &device,
            Request::Write {
                offset: 0,
                data: "r1 g2 b3".into(),
            },
        );
        assert_eq!(written, Response::Written { count: 8, offset: 8 });

        let Response::Data { data, offset } = handle(&device, Request::Read { offset: 0, len: 64 })
        else {
            panic!("expected data");
        };
        assert!(data.starts_with("Grove-LCD RGB Backlight\nRed: 0x1\nGreen: 0x2\nBlue: 0x3\n"));
        assert_eq!(offset, data.len() as u64);
    }

    #[test]
    fn test_errors_carry_errno() {
        let device = device(&[rgb::RGB_I2C_ADDR]);
        let bad = Request::Write {
            offset: 0,
            data: "x1 g2 b3".into(),
        };
        assert!(matches!(
            handle(&device, bad),
            Response::Error { errno, .. } if errno == Errno::EINVAL as i32
        ));
        assert!(matches!(
            handle(&device, Request::ClearLcd),
            Response::Error { errno, .. } if errno == Errno::ENODEV as i32
        ));
    }

    #[test]
    fn test_handle_line() {
        let device = device(&[rgb::RGB_I2C_ADDR]);
        let reply = handle_line(&device, r#"{"op":"set_color","color":{"red":1,"green":2,"blue":3}}"#);
        assert_eq!(reply, r#"{"status":"done"}"#);

        let reply = handle_line(&device, r#"{"op":"get_color"}"#);
        assert_eq!(reply, r#"{"status":"color","color":{"red":1,"green":2,"blue":3}}"#);

        let reply = handle_line(&device, "not json");
        assert!(reply.starts_with(r#"{"status":"error","errno":22,"#));
    }

    #[tokio::test]
    async fn test_serve_over_socket() {
        let path = std::env::temp_dir().join(format!("grove-lcd-test-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).unwrap();
        let device = Arc::new(device(&[rgb::RGB_I2C_ADDR, lcd::LCD_I2C_ADDR]));
        let running = CancellationToken::new();
        let server = tokio::spawn(serve(listener, device, running.clone()));

        let stream = UnixStream::connect(&path).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"{\"op\":\"line_capacity\"}\n").await.unwrap();
        let reply = lines.next_line().await.unwrap().unwrap();
        assert_eq!(reply, r#"{"status":"capacity","size":16}"#);

        running.cancel();
        server.await.unwrap().unwrap();
        std::fs::remove_file(&path).unwrap();
    }
}
