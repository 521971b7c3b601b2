//! # waterbridge
//!
//! Host side of the water vending unit serial protocol.
//!
//! ## Features
//!
//! - Binary frame codec with stream reassembly
//! - USB serial discovery with automatic reconnect
//! - Software simulator with realistic timing
//! - Per-machine event rooms
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use waterbridge::{Command, DeviceSimulator, Relay, SimulatorConfig};
//!
//! #[tokio::main]
//! async fn main() -> waterbridge::Result<()> {
//!     // Swap in a DeviceController to drive real hardware
//!     let relay = Relay::new(Arc::new(DeviceSimulator::new(SimulatorConfig::default())));
//!     relay.start();
//!
//!     let mut room = relay.join(0);
//!     relay.dispatch(Command::OpenVan { machine_id: 0, volume: 200 })?;
//!
//!     // Ack, then the result once the water has run
//!     for _ in 0..2 {
//!         if let Ok(event) = room.recv().await {
//!             println!("{}", event);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod controller;
pub mod device;
pub mod error;
pub mod relay;
pub mod simulator;

// Re-exports
pub use controller::{ControllerConfig, DeviceController};
pub use device::{Device, LinkState};
pub use error::{Error, Result};
pub use relay::Relay;
pub use simulator::{DeviceSimulator, MachineState, SimulatorConfig};

// Re-export protocol and transport types
pub use waterbridge_core::{
    Codec, Command, CommandKind, Event, Message, Profile, ProtocolId, Reassembler, ResultCode,
    ResyncPolicy,
};
#[cfg(feature = "serial")]
pub use waterbridge_transport::{SerialTransport, DEFAULT_BAUD_RATE};
pub use waterbridge_transport::{TcpTransport, Transport};
pub use waterbridge_types::{
    CardData, CardDate, ErrorFlags, MachineId, RfidRecord, RfidTag, StatusSnapshot,
};
