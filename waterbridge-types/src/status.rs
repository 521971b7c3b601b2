//! Machine status snapshots

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::MachineId;

bitflags::bitflags! {
    /// Sensor fault mask reported in every status heartbeat
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ErrorFlags: u8 {
        /// Object position sensor fault
        const POSITION_SENSOR = 1;

        /// Water flow sensor fault
        const FLOW_SENSOR = 1 << 1;

        /// RFID reader fault
        const RFID_READER = 1 << 2;

        /// Audio output fault
        const AUDIO = 1 << 3;
    }
}

impl ErrorFlags {
    pub fn position_sensor(self) -> bool {
        self.contains(Self::POSITION_SENSOR)
    }

    pub fn flow_sensor(self) -> bool {
        self.contains(Self::FLOW_SENSOR)
    }

    pub fn rfid_reader(self) -> bool {
        self.contains(Self::RFID_READER)
    }

    pub fn audio(self) -> bool {
        self.contains(Self::AUDIO)
    }
}

/// Periodic status of one machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub machine_id: MachineId,

    /// A container is standing under the nozzle
    pub object_placed: bool,

    pub solenoid_open: bool,

    /// Flow sensor reading (cc/s)
    pub water_flow: u8,

    /// A card is lying on the reader
    pub rfid_placed: bool,

    pub errors: ErrorFlags,
}

impl StatusSnapshot {
    /// Idle machine with no faults
    pub fn idle(machine_id: MachineId) -> Self {
        Self {
            machine_id,
            object_placed: false,
            solenoid_open: false,
            water_flow: 0,
            rfid_placed: false,
            errors: ErrorFlags::empty(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Status[{}](placed={}, solenoid={}, flow={}, rfid={}, errors=0x{:X})",
            self.machine_id,
            self.object_placed,
            self.solenoid_open,
            self.water_flow,
            self.rfid_placed,
            self.errors.bits()
        )
    }
}
