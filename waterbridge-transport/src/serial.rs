//! USB serial transport
//!
//! The unit enumerates as a USB CDC / UART bridge. It is located by its
//! USB vendor and product id rather than by port name, since the name
//! changes across reboots and re-plugs.

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialPortType, SerialStream};
use tracing::{debug, trace, warn};

use crate::{error::*, Transport};

/// Line speed of the unit's UART bridge
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// A USB serial port found on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbPort {
    pub port_name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub product: Option<String>,
}

/// Serial transport for units attached over USB
pub struct SerialTransport {
    vendor_id: u16,
    product_id: u16,
    baud_rate: u32,
    port_name: Option<String>,
    stream: Option<SerialStream>,
}

impl SerialTransport {
    /// Create a transport matching the given USB vendor/product id pair
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            baud_rate: DEFAULT_BAUD_RATE,
            port_name: None,
            stream: None,
        }
    }

    /// Set line speed
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// List every USB serial port currently attached
    pub fn usb_ports() -> Result<Vec<UsbPort>> {
        let ports = tokio_serial::available_ports()?
            .into_iter()
            .filter_map(|port| match port.port_type {
                SerialPortType::UsbPort(info) => Some(UsbPort {
                    port_name: port.port_name,
                    vendor_id: info.vid,
                    product_id: info.pid,
                    product: info.product,
                }),
                _ => None,
            })
            .collect();

        Ok(ports)
    }

    fn find_port(&self) -> Result<Option<String>> {
        let port = Self::usb_ports()?
            .into_iter()
            .find(|port| port.vendor_id == self.vendor_id && port.product_id == self.product_id)
            .map(|port| port.port_name);

        Ok(port)
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn probe(&mut self) -> Result<bool> {
        self.port_name = self.find_port()?;

        if let Some(name) = &self.port_name {
            debug!(
                "Found {:04x}:{:04x} at {}",
                self.vendor_id, self.product_id, name
            );
        }

        Ok(self.port_name.is_some())
    }

    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        if self.port_name.is_none() {
            self.probe().await?;
        }

        let name = self.port_name.clone().ok_or(Error::DeviceNotFound {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
        })?;

        debug!("Opening {} at {} baud...", name, self.baud_rate);

        let stream = tokio_serial::new(&name, self.baud_rate).open_native_async()?;

        debug!("Opened {}", name);

        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.stream.take().is_some() {
            debug!("Closed {}", self.endpoint());
        }

        // The port may come back under another name
        self.port_name = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        trace!("Sending {} bytes: {}", data.len(), hex::encode(data));

        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn receive(&mut self) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::with_capacity(256);

        let n = stream.read_buf(&mut buf).await?;

        if n == 0 {
            warn!("Received 0 bytes");
            return Err(Error::ConnectionClosed);
        }

        trace!("Received {} bytes: {}", n, hex::encode(&buf));

        Ok(buf)
    }

    fn endpoint(&self) -> String {
        self.port_name.clone().unwrap_or_else(|| {
            format!("usb {:04x}:{:04x}", self.vendor_id, self.product_id)
        })
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("Serial transport dropped while still connected");
        }
    }
}
