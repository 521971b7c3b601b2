//! Talk to a unit over USB serial, or through a TCP bridge
//!
//! ```text
//! WATERBRIDGE_VID=1a86 WATERBRIDGE_PID=7523 cargo run --example serial_bridge
//! WATERBRIDGE_TCP=192.168.1.50:4001 cargo run --example serial_bridge
//! ```
//!
//! Set `WATERBRIDGE_PROFILE=quota` for quota-card firmware.

use std::time::Duration;

use anyhow::{bail, Context};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::interval;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use waterbridge::{
    Command, ControllerConfig, Device, DeviceController, LinkState, Profile, SerialTransport,
    TcpTransport, DEFAULT_BAUD_RATE,
};

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn hex_u16(name: &str, default: &str) -> anyhow::Result<u16> {
    let value = env_or(name, default);
    u16::from_str_radix(value.trim_start_matches("0x"), 16)
        .with_context(|| format!("{} must be a hex USB id, got {}", name, value))
}

fn controller(config: ControllerConfig) -> anyhow::Result<DeviceController> {
    if let Ok(target) = std::env::var("WATERBRIDGE_TCP") {
        let (host, port) = target
            .rsplit_once(':')
            .context("WATERBRIDGE_TCP must be host:port")?;
        let port = port.parse().context("invalid TCP port")?;

        return Ok(DeviceController::new(TcpTransport::new(host, port), config));
    }

    let vendor_id = hex_u16("WATERBRIDGE_VID", "1a86")?;
    let product_id = hex_u16("WATERBRIDGE_PID", "7523")?;

    let ports = SerialTransport::usb_ports()?;
    info!("{} USB serial ports attached", ports.len());
    for port in &ports {
        info!(
            "  {} {:04x}:{:04x} {}",
            port.port_name,
            port.vendor_id,
            port.product_id,
            port.product.as_deref().unwrap_or("")
        );
    }

    let baud_rate = match std::env::var("WATERBRIDGE_BAUD") {
        Ok(value) => value.parse().context("WATERBRIDGE_BAUD must be a number")?,
        Err(_) => DEFAULT_BAUD_RATE,
    };

    Ok(DeviceController::serial(vendor_id, product_id, baud_rate, config))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let profile = match env_or("WATERBRIDGE_PROFILE", "prepaid").as_str() {
        "prepaid" => Profile::Prepaid,
        "quota" => Profile::Quota,
        other => bail!("unknown profile {}", other),
    };

    let controller = controller(ControllerConfig::default().with_profile(profile))?;
    let mut events = controller.subscribe();
    let mut link = controller.watch_link();
    controller.start();

    let mut heartbeat = interval(Duration::from_secs(5));

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!("{}", event),
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            },
            changed = link.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *link.borrow_and_update();
                info!("Link {}", state);
            },
            _ = heartbeat.tick() => {
                if controller.link_state() == LinkState::Open {
                    controller.send(Command::PlayAudio { machine_id: 0, audio_index: 1 })?;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}
