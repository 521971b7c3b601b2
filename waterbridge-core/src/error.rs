//! Error types for waterbridge-core

use crate::protocol::{ProtocolId, Profile};

/// Result type alias for waterbridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
///
/// None of these are fatal: the reassembler logs them and either keeps
/// the buffered bytes or discards them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// First byte of the window is not the start sentinel
    #[error("Bad start byte: 0x{0:02X}")]
    BadStartByte(u8),

    /// Protocol id byte is not part of the active profile
    #[error("Unknown protocol id: 0x{0:02X}")]
    UnknownProtocolId(u8),

    /// Checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:02X}, received 0x{received:02X}")]
    ChecksumMismatch {
        expected: u8,
        received: u8,
    },

    /// Frame checksum is fine but the payload does not fit the layout
    #[error("Malformed {id} payload: {reason}")]
    MalformedPayload {
        id: ProtocolId,
        reason: String,
    },

    /// Result byte outside the known result codes
    #[error("Unknown result code: 0x{0:02X}")]
    UnknownResultCode(u8),

    /// No frame could be decoded before the accumulator filled up
    #[error("Receive buffer overflow: {len} bytes buffered (max: {max} bytes)")]
    BufferOverflow {
        len: usize,
        max: usize,
    },

    /// Message cannot be expressed in the active profile
    #[error("{id} is not supported by the {profile} profile")]
    ProfileMismatch {
        id: ProtocolId,
        profile: Profile,
    },

    /// Domain value failed validation
    #[error("Invalid value: {0}")]
    Types(#[from] waterbridge_types::Error),
}

impl Error {
    /// Check if the frame is unparseable at the current offset
    pub fn is_framing_error(&self) -> bool {
        matches!(self, Self::BadStartByte(_) | Self::UnknownProtocolId(_))
    }
}
