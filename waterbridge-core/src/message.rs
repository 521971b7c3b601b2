//! Typed protocol messages
//!
//! [`Command`]s travel from the host to a unit, [`Event`]s travel back.
//! [`Message`] is either direction and is what the codec works with.

use std::fmt;

use serde::{Deserialize, Serialize};
use waterbridge_types::{MachineId, RfidRecord, StatusSnapshot};

use crate::protocol::{CommandKind, ProtocolId, ResultCode};

/// Request sent to a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Set the maximum water flow the unit may dispense
    Config {
        machine_id: MachineId,
        max_flow_allowed: u8,
    },

    /// Open the solenoid valve for `volume` cc
    OpenVan {
        machine_id: MachineId,
        volume: u16,
    },

    /// Close the solenoid valve early
    CancelOpenVan {
        machine_id: MachineId,
    },

    /// Play one of the stored audio prompts
    PlayAudio {
        machine_id: MachineId,
        audio_index: u8,
    },

    /// Write a record to the card on the reader
    UpdateRfid {
        machine_id: MachineId,
        record: RfidRecord,
    },
}

impl Command {
    pub fn machine_id(&self) -> MachineId {
        match self {
            Self::Config { machine_id, .. }
            | Self::OpenVan { machine_id, .. }
            | Self::CancelOpenVan { machine_id }
            | Self::PlayAudio { machine_id, .. }
            | Self::UpdateRfid { machine_id, .. } => *machine_id,
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Config { .. } => CommandKind::Config,
            Self::OpenVan { .. } => CommandKind::OpenVan,
            Self::CancelOpenVan { .. } => CommandKind::CancelOpenVan,
            Self::PlayAudio { .. } => CommandKind::PlayAudio,
            Self::UpdateRfid { .. } => CommandKind::UpdateRfid,
        }
    }

    pub fn protocol_id(&self) -> ProtocolId {
        self.kind().request_id()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[machine={}]", self.protocol_id().name(), self.machine_id())
    }
}

/// Message emitted by a unit
///
/// An `Ack` and its `Result` are correlated with the originating command
/// only through the command kind and the machine id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Command received
    Ack {
        command: CommandKind,
        machine_id: MachineId,
    },

    /// Command finished
    Result {
        command: CommandKind,
        machine_id: MachineId,
        result: ResultCode,
    },

    /// Periodic heartbeat
    Status(StatusSnapshot),

    /// A card was placed on the reader
    RfidDetected {
        machine_id: MachineId,
        record: RfidRecord,
    },
}

impl Event {
    pub fn ack(command: CommandKind, machine_id: MachineId) -> Self {
        Self::Ack { command, machine_id }
    }

    pub fn success(command: CommandKind, machine_id: MachineId) -> Self {
        Self::Result {
            command,
            machine_id,
            result: ResultCode::Success,
        }
    }

    pub fn machine_id(&self) -> MachineId {
        match self {
            Self::Ack { machine_id, .. }
            | Self::Result { machine_id, .. }
            | Self::RfidDetected { machine_id, .. } => *machine_id,
            Self::Status(status) => status.machine_id,
        }
    }

    pub fn protocol_id(&self) -> ProtocolId {
        match self {
            Self::Ack { command, .. } => command.ack_id(),
            Self::Result { command, .. } => command.result_id(),
            Self::Status(_) => ProtocolId::Status,
            Self::RfidDetected { .. } => ProtocolId::RfidDetected,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Result { result, .. } => write!(
                f,
                "{}[machine={}](result={:?})",
                self.protocol_id().name(),
                self.machine_id(),
                result
            ),
            Self::Status(status) => write!(f, "{}", status),
            _ => write!(f, "{}[machine={}]", self.protocol_id().name(), self.machine_id()),
        }
    }
}

/// Any message that can appear in a frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Command(Command),
    Event(Event),
}

impl Message {
    pub fn machine_id(&self) -> MachineId {
        match self {
            Self::Command(command) => command.machine_id(),
            Self::Event(event) => event.machine_id(),
        }
    }

    pub fn protocol_id(&self) -> ProtocolId {
        match self {
            Self::Command(command) => command.protocol_id(),
            Self::Event(event) => event.protocol_id(),
        }
    }

    /// Take the event out of a message received from a unit
    pub fn into_event(self) -> Option<Event> {
        match self {
            Self::Event(event) => Some(event),
            Self::Command(_) => None,
        }
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}

impl From<Event> for Message {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(command) => command.fmt(f),
            Self::Event(event) => event.fmt(f),
        }
    }
}
