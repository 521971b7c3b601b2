//! Protocol identifiers and result codes

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Message kind carried in the second byte of every frame
///
/// Each command has a request id, an acknowledgement id (`request + 1`)
/// and a result id (`request + 2`). `Status` and `RfidDetected` are
/// emitted by the unit on its own.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProtocolId {
    Config = 0x01,
    ConfigAck = 0x02,
    ConfigResult = 0x03,

    CommandOpenVan = 0x41,
    CommandOpenVanAck = 0x42,
    CommandOpenVanResult = 0x43,
    CommandCancelOpenVan = 0x44,
    CommandCancelOpenVanAck = 0x45,
    CommandCancelOpenVanResult = 0x46,

    CommandPlayAudio = 0x51,
    CommandPlayAudioAck = 0x52,
    CommandPlayAudioResult = 0x53,

    CommandUpdateRfid = 0x61,
    CommandUpdateRfidAck = 0x62,
    CommandUpdateRfidResult = 0x63,

    // Autonomous events
    Status = 0x81,
    RfidDetected = 0xC1,
}

impl ProtocolId {
    /// Check if this is a host-to-unit request
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Self::Config
                | Self::CommandOpenVan
                | Self::CommandCancelOpenVan
                | Self::CommandPlayAudio
                | Self::CommandUpdateRfid
        )
    }

    /// Check if this is an acknowledgement
    pub fn is_ack(self) -> bool {
        matches!(
            self,
            Self::ConfigAck
                | Self::CommandOpenVanAck
                | Self::CommandCancelOpenVanAck
                | Self::CommandPlayAudioAck
                | Self::CommandUpdateRfidAck
        )
    }

    /// Check if this is a delayed command result
    pub fn is_result(self) -> bool {
        matches!(
            self,
            Self::ConfigResult
                | Self::CommandOpenVanResult
                | Self::CommandCancelOpenVanResult
                | Self::CommandPlayAudioResult
                | Self::CommandUpdateRfidResult
        )
    }

    /// Command family this id belongs to (`None` for autonomous events)
    pub fn command_kind(self) -> Option<CommandKind> {
        match self {
            Self::Config | Self::ConfigAck | Self::ConfigResult => Some(CommandKind::Config),
            Self::CommandOpenVan | Self::CommandOpenVanAck | Self::CommandOpenVanResult => {
                Some(CommandKind::OpenVan)
            }
            Self::CommandCancelOpenVan
            | Self::CommandCancelOpenVanAck
            | Self::CommandCancelOpenVanResult => Some(CommandKind::CancelOpenVan),
            Self::CommandPlayAudio | Self::CommandPlayAudioAck | Self::CommandPlayAudioResult => {
                Some(CommandKind::PlayAudio)
            }
            Self::CommandUpdateRfid
            | Self::CommandUpdateRfidAck
            | Self::CommandUpdateRfidResult => Some(CommandKind::UpdateRfid),
            Self::Status | Self::RfidDetected => None,
        }
    }

    /// Check if this id exists in the given protocol profile
    pub fn is_supported_by(self, profile: Profile) -> bool {
        match profile {
            Profile::Prepaid => true,
            Profile::Quota => self.command_kind() != Some(CommandKind::CancelOpenVan),
        }
    }

    /// Parse a wire byte under a protocol profile
    pub fn from_wire(value: u8, profile: Profile) -> Result<Self> {
        let id = Self::try_from(value)?;

        if !id.is_supported_by(profile) {
            return Err(Error::UnknownProtocolId(value));
        }

        Ok(id)
    }

    /// Get protocol id name
    pub fn name(self) -> &'static str {
        match self {
            Self::Config => "CONFIG",
            Self::ConfigAck => "CONFIG_ACK",
            Self::ConfigResult => "CONFIG_RESULT",
            Self::CommandOpenVan => "COMMAND_OPEN_VAN",
            Self::CommandOpenVanAck => "COMMAND_OPEN_VAN_ACK",
            Self::CommandOpenVanResult => "COMMAND_OPEN_VAN_RESULT",
            Self::CommandCancelOpenVan => "COMMAND_CANCEL_OPEN_VAN",
            Self::CommandCancelOpenVanAck => "COMMAND_CANCEL_OPEN_VAN_ACK",
            Self::CommandCancelOpenVanResult => "COMMAND_CANCEL_OPEN_VAN_RESULT",
            Self::CommandPlayAudio => "COMMAND_PLAY_AUDIO",
            Self::CommandPlayAudioAck => "COMMAND_PLAY_AUDIO_ACK",
            Self::CommandPlayAudioResult => "COMMAND_PLAY_AUDIO_RESULT",
            Self::CommandUpdateRfid => "COMMAND_UPDATE_RFID",
            Self::CommandUpdateRfidAck => "COMMAND_UPDATE_RFID_ACK",
            Self::CommandUpdateRfidResult => "COMMAND_UPDATE_RFID_RESULT",
            Self::Status => "STATUS",
            Self::RfidDetected => "RFID_DETECTED",
        }
    }
}

impl From<ProtocolId> for u8 {
    fn from(id: ProtocolId) -> u8 {
        id as u8
    }
}

impl TryFrom<u8> for ProtocolId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::Config),
            0x02 => Ok(Self::ConfigAck),
            0x03 => Ok(Self::ConfigResult),
            0x41 => Ok(Self::CommandOpenVan),
            0x42 => Ok(Self::CommandOpenVanAck),
            0x43 => Ok(Self::CommandOpenVanResult),
            0x44 => Ok(Self::CommandCancelOpenVan),
            0x45 => Ok(Self::CommandCancelOpenVanAck),
            0x46 => Ok(Self::CommandCancelOpenVanResult),
            0x51 => Ok(Self::CommandPlayAudio),
            0x52 => Ok(Self::CommandPlayAudioAck),
            0x53 => Ok(Self::CommandPlayAudioResult),
            0x61 => Ok(Self::CommandUpdateRfid),
            0x62 => Ok(Self::CommandUpdateRfidAck),
            0x63 => Ok(Self::CommandUpdateRfidResult),
            0x81 => Ok(Self::Status),
            0xC1 => Ok(Self::RfidDetected),
            _ => Err(Error::UnknownProtocolId(value)),
        }
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

/// Command family shared by a request, its ack and its result
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Config,
    OpenVan,
    CancelOpenVan,
    PlayAudio,
    UpdateRfid,
}

impl CommandKind {
    pub fn request_id(self) -> ProtocolId {
        match self {
            Self::Config => ProtocolId::Config,
            Self::OpenVan => ProtocolId::CommandOpenVan,
            Self::CancelOpenVan => ProtocolId::CommandCancelOpenVan,
            Self::PlayAudio => ProtocolId::CommandPlayAudio,
            Self::UpdateRfid => ProtocolId::CommandUpdateRfid,
        }
    }

    pub fn ack_id(self) -> ProtocolId {
        match self {
            Self::Config => ProtocolId::ConfigAck,
            Self::OpenVan => ProtocolId::CommandOpenVanAck,
            Self::CancelOpenVan => ProtocolId::CommandCancelOpenVanAck,
            Self::PlayAudio => ProtocolId::CommandPlayAudioAck,
            Self::UpdateRfid => ProtocolId::CommandUpdateRfidAck,
        }
    }

    pub fn result_id(self) -> ProtocolId {
        match self {
            Self::Config => ProtocolId::ConfigResult,
            Self::OpenVan => ProtocolId::CommandOpenVanResult,
            Self::CancelOpenVan => ProtocolId::CommandCancelOpenVanResult,
            Self::PlayAudio => ProtocolId::CommandPlayAudioResult,
            Self::UpdateRfid => ProtocolId::CommandUpdateRfidResult,
        }
    }
}

/// Outcome byte carried by every `*Result` message
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ResultCode {
    Success = 0x00,
    Failed = 0x01,
    RfidNotAvailable = 0x70,
    RfidInvalidFormat = 0x71,
    RfidIdNotMatched = 0x72,
    RfidAuthenticationFailed = 0x73,
    RfidCannotWrite = 0x74,
}

impl ResultCode {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }

    /// Check if the failure came from the RFID reader
    pub fn is_rfid_error(self) -> bool {
        matches!(
            self,
            Self::RfidNotAvailable
                | Self::RfidInvalidFormat
                | Self::RfidIdNotMatched
                | Self::RfidAuthenticationFailed
                | Self::RfidCannotWrite
        )
    }
}

impl From<ResultCode> for u8 {
    fn from(code: ResultCode) -> u8 {
        code as u8
    }
}

impl TryFrom<u8> for ResultCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::Success),
            0x01 => Ok(Self::Failed),
            0x70 => Ok(Self::RfidNotAvailable),
            0x71 => Ok(Self::RfidInvalidFormat),
            0x72 => Ok(Self::RfidIdNotMatched),
            0x73 => Ok(Self::RfidAuthenticationFailed),
            0x74 => Ok(Self::RfidCannotWrite),
            _ => Err(Error::UnknownResultCode(value)),
        }
    }
}

/// Wire layout revision
///
/// Two incompatible layouts exist in the field. `Prepaid` units have a
/// cancel command and store a balance plus expiry date on cards.
/// `Quota` units cancel by opening with zero volume and store a
/// validity flag plus water volume on cards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    #[default]
    Prepaid,
    Quota,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepaid => f.write_str("prepaid"),
            Self::Quota => f.write_str("quota"),
        }
    }
}
