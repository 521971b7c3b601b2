//! # waterbridge-core
//!
//! Core protocol implementation for RFID water vending units.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure and encoding/decoding
//! - Checksum calculation
//! - Protocol ids, result codes and profiles
//! - Stream reassembly of chunked serial input
//!
//! Nothing here performs I/O.

pub mod checksum;
pub mod codec;
pub mod constants;
pub mod error;
pub mod message;
pub mod protocol;
pub mod reassembler;

pub use codec::{Codec, Decoded};
pub use error::{Error, Result};
pub use message::{Command, Event, Message};
pub use protocol::{CommandKind, Profile, ProtocolId, ResultCode};
pub use reassembler::{Reassembler, ReassemblerStats, ResyncPolicy};
