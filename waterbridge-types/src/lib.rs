//! Type definitions for waterbridge
//!
//! Plain data shared by the codec, the controller and the simulator:
//! machine identifiers, RFID card records and status snapshots.

pub mod error;
pub mod rfid;
pub mod status;

pub use error::{Error, Result};
pub use rfid::{CardData, CardDate, RfidRecord, RfidTag};
pub use status::{ErrorFlags, StatusSnapshot};

/// Identifier of one vending unit on the serial bus
pub type MachineId = u8;
