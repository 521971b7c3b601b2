//! Device capability shared by the controller and the simulator

use std::fmt;

use tokio::sync::broadcast;
use waterbridge_core::{Command, Event};

use crate::error::Result;

/// Command sink and event source for a fleet of vending units
///
/// [`DeviceController`](crate::DeviceController) talks to real hardware,
/// [`DeviceSimulator`](crate::DeviceSimulator) models it in software. Both
/// answer every command with an ack event followed later by a result
/// event, so callers can swap one for the other.
pub trait Device: Send + Sync {
    /// Begin operating; calling it again has no effect
    ///
    /// Must be called from within a Tokio runtime.
    fn start(&self);

    /// Hand a command to the device without waiting for its outcome
    ///
    /// Completion is reported later through [`Device::subscribe`] as an
    /// ack and a result carrying the same machine id.
    fn send(&self, command: Command) -> Result<()>;

    /// Receive every event the device emits from now on
    ///
    /// A receiver that falls behind loses the oldest events.
    fn subscribe(&self) -> broadcast::Receiver<Event>;
}

/// Transport lifecycle of a [`DeviceController`](crate::DeviceController)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Waiting for the hardware to show up
    Searching,

    /// Stream open, frames flow both ways
    Open,

    /// Stream lost or controller stopped
    Closed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Searching => f.write_str("searching"),
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}
