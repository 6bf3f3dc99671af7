//! Grove-LCD daemon.
//!
//! Attaches the device on the configured I2C adapter and serves requests on
//! a Unix socket until SIGINT or SIGTERM, then detaches it again.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::net::UnixListener;
use tokio::signal::unix::{self, SignalKind};
use tokio_util::sync::CancellationToken;

use grove_lcd::config::Config;
use grove_lcd::hw_trait::{I2c, I2cClient, LinuxI2c, SimI2c};
use grove_lcd::registry::LocalRegistry;
use grove_lcd::tracing::{self, prelude::*};
use grove_lcd::{server, LogicalDevice};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => Config::load_from(Path::new(&path))?,
        None => Config::load()?,
    };
    tracing::init_journald_or_stdout(&config.daemon.log_level);

    if config.bus.simulate {
        info!("Using simulated I2C bus.");
        let bus = SimI2c::new(&[config.device.rgb_address, config.device.lcd_address]);
        run(bus, config).await
    } else {
        let bus = LinuxI2c::open(&config.bus.path)
            .with_context(|| format!("opening {}", config.bus.path.display()))?;
        run(bus, config).await
    }
}

async fn run<B: I2c + 'static>(bus: B, config: Config) -> Result<()> {
    let primary = I2cClient::new(
        Arc::new(Mutex::new(bus)),
        "rgb",
        config.device.rgb_address,
    );
    let registry = Arc::new(LocalRegistry::default());
    let device = Arc::new(
        LogicalDevice::attach(primary, registry, &config.device).context("attaching device")?,
    );

    let socket = &config.daemon.socket;
    if socket.exists() {
        std::fs::remove_file(socket)
            .with_context(|| format!("removing stale socket {}", socket.display()))?;
    }
    let listener = UnixListener::bind(socket)
        .with_context(|| format!("binding {}", socket.display()))?;

    let running = CancellationToken::new();
    let server = tokio::spawn(server::serve(listener, Arc::clone(&device), running.clone()));
    info!(socket = %socket.display(), "Started.");

    let mut sigint = unix::signal(SignalKind::interrupt())?;
    let mut sigterm = unix::signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }

    trace!("Shutting down.");
    running.cancel();
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Server stopped with error"),
        Err(e) => error!(error = %e, "Server task failed"),
    }
    let _ = std::fs::remove_file(socket);

    match Arc::try_unwrap(device) {
        Ok(device) => device.detach().context("detaching device")?,
        Err(_) => warn!("Device still in use, releasing on drop"),
    }

    info!("Exiting.");
    Ok(())
}
