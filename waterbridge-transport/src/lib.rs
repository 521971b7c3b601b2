//! Transport layer for the vending unit protocol
//!
//! Provides byte-stream access to the unit: USB serial for the real
//! hardware, TCP for serial-over-network bridges.

pub mod error;
#[cfg(feature = "serial")]
pub mod serial;
pub mod tcp;

pub use error::{Error, Result};
#[cfg(feature = "serial")]
pub use serial::{SerialTransport, UsbPort, DEFAULT_BAUD_RATE};
pub use tcp::TcpTransport;

use async_trait::async_trait;
use bytes::BytesMut;

/// Transport trait for different communication methods
///
/// A transport owns at most one open stream at a time. The controller
/// calls [`Transport::probe`] while no stream is open and
/// [`Transport::connect`] once the hardware shows up.
#[async_trait]
pub trait Transport: Send {
    /// Check whether the device is currently reachable
    async fn probe(&mut self) -> Result<bool>;

    /// Open the stream
    async fn connect(&mut self) -> Result<()>;

    /// Close the stream
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Send raw bytes
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive the next chunk of raw bytes
    ///
    /// Must be cancel safe: dropping the future loses no data.
    async fn receive(&mut self) -> Result<BytesMut>;

    /// Human readable endpoint name
    fn endpoint(&self) -> String;
}
