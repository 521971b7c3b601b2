//! Drive the simulator through a relay and print one machine's events
//!
//! ```text
//! RUST_LOG=waterbridge=debug MACHINE_ID=1 cargo run --example simulator
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;
use waterbridge::{
    CardData, CardDate, Command, DeviceSimulator, Event, Relay, RfidRecord, RfidTag,
    SimulatorConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let machine_id: u8 = std::env::var("MACHINE_ID")
        .unwrap_or_else(|_| "0".to_string())
        .parse()
        .context("MACHINE_ID must be 0-255")?;

    let config = SimulatorConfig::default()
        .with_rfid_detect_interval(Duration::from_secs(5))
        .with_rfid_removal_delay(Duration::from_secs(3));

    let relay = Relay::new(Arc::new(DeviceSimulator::new(config)));
    relay.start();

    let mut room = relay.join(machine_id);
    println!("Joined {}", Relay::<DeviceSimulator>::room_name(machine_id));

    let printer = tokio::spawn(async move {
        while let Ok(event) = room.recv().await {
            match &event {
                Event::Status(status) => println!("  {}", status),
                _ => println!("> {}", event),
            }
        }
    });

    relay.dispatch(Command::Config { machine_id, max_flow_allowed: 100 })?;
    relay.dispatch(Command::PlayAudio { machine_id, audio_index: 1 })?;
    relay.dispatch(Command::OpenVan { machine_id, volume: 400 })?;
    sleep(Duration::from_secs(3)).await;

    // Second fill, cancelled halfway
    relay.dispatch(Command::OpenVan { machine_id, volume: 1000 })?;
    sleep(Duration::from_millis(2500)).await;
    relay.dispatch(Command::CancelOpenVan { machine_id })?;

    let record = RfidRecord::new(
        RfidTag::new([0xDE, 0xAD, 0xBE, 0xEF])?,
        CardData::Prepaid {
            balance: 20_000,
            issue_date: CardDate::new(24, 6, 1),
            expire_date: CardDate::new(25, 6, 1),
        },
    );
    relay.dispatch(Command::UpdateRfid { machine_id, record })?;

    sleep(Duration::from_secs(10)).await;
    printer.abort();

    Ok(())
}
