//! Hardware controller
//!
//! Owns one transport to the vending hardware. A background task keeps
//! probing until the hardware shows up, opens the stream, feeds received
//! bytes through a [`Reassembler`] and publishes the decoded events. If
//! the stream fails it is closed and discovery starts over.

use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use waterbridge_core::{
    constants::{DEFAULT_PROBE_INTERVAL, DEFAULT_RX_MAX},
    Codec, Command, Event, Message, Profile, Reassembler, ResyncPolicy,
};
use waterbridge_transport::Transport;

#[cfg(feature = "serial")]
use waterbridge_transport::SerialTransport;

use crate::device::{Device, LinkState};
use crate::error::Result;

/// Controller settings
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Payload layout spoken by the hardware
    pub profile: Profile,

    /// Delay between discovery attempts
    pub probe_interval: Duration,

    /// Receive buffer cap
    pub rx_max: usize,

    /// What to do with undecodable bytes
    pub resync: ResyncPolicy,

    /// Events kept for slow subscribers
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            probe_interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL),
            rx_max: DEFAULT_RX_MAX,
            resync: ResyncPolicy::default(),
            event_capacity: 256,
        }
    }
}

impl ControllerConfig {
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_probe_interval(mut self, probe_interval: Duration) -> Self {
        self.probe_interval = probe_interval;
        self
    }

    pub fn with_rx_max(mut self, rx_max: usize) -> Self {
        self.rx_max = rx_max;
        self
    }

    pub fn with_resync_policy(mut self, resync: ResyncPolicy) -> Self {
        self.resync = resync;
        self
    }

    pub fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }
}

/// Controller for real hardware
///
/// # Examples
///
/// ```no_run
/// use waterbridge::{Command, ControllerConfig, Device, DeviceController, TcpTransport};
///
/// #[tokio::main]
/// async fn main() -> waterbridge::Result<()> {
///     let controller = DeviceController::new(
///         TcpTransport::new("192.168.1.50", 4001),
///         ControllerConfig::default(),
///     );
///
///     let mut events = controller.subscribe();
///     controller.start();
///
///     controller.send(Command::PlayAudio { machine_id: 0, audio_index: 1 })?;
///
///     while let Ok(event) = events.recv().await {
///         println!("{}", event);
///     }
///     Ok(())
/// }
/// ```
pub struct DeviceController {
    config: ControllerConfig,
    codec: Codec,
    // Handed to the driver task on start
    transport: Mutex<Option<Box<dyn Transport>>>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<BytesMut>>>,
    outbound: mpsc::UnboundedSender<BytesMut>,
    events: broadcast::Sender<Event>,
    link: watch::Sender<LinkState>,
}

impl DeviceController {
    /// Create a controller on top of any transport
    pub fn new(transport: impl Transport + 'static, config: ControllerConfig) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (link, _) = watch::channel(LinkState::Searching);
        let transport: Box<dyn Transport> = Box::new(transport);

        Self {
            codec: Codec::new(config.profile),
            config,
            transport: Mutex::new(Some(transport)),
            outbound_rx: Mutex::new(Some(outbound_rx)),
            outbound,
            events,
            link,
        }
    }

    /// Create a controller for a unit attached over USB
    #[cfg(feature = "serial")]
    pub fn serial(
        vendor_id: u16,
        product_id: u16,
        baud_rate: u32,
        config: ControllerConfig,
    ) -> Self {
        Self::new(
            SerialTransport::new(vendor_id, product_id).with_baud_rate(baud_rate),
            config,
        )
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Current link state
    pub fn link_state(&self) -> LinkState {
        *self.link.borrow()
    }

    /// Follow link state changes
    pub fn watch_link(&self) -> watch::Receiver<LinkState> {
        self.link.subscribe()
    }
}

impl Device for DeviceController {
    fn start(&self) {
        let (Some(transport), Some(outbound)) =
            (self.transport.lock().take(), self.outbound_rx.lock().take())
        else {
            debug!("Controller already started");
            return;
        };

        info!("Starting controller on {}", transport.endpoint());

        tokio::spawn(drive(
            transport,
            outbound,
            self.events.clone(),
            self.link.clone(),
            self.config.clone(),
        ));
    }

    fn send(&self, command: Command) -> Result<()> {
        let message = Message::from(command);
        let frame = self.codec.encode(&message)?;

        if self.link_state() != LinkState::Open {
            debug!("Link not open, dropping {}", message);
            return Ok(());
        }

        debug!("Queueing {}", message);

        // Fails only once the driver task is gone
        if self.outbound.send(frame).is_err() {
            debug!("Controller stopped, dropping {}", message);
        }

        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }
}

/// Driver loop, runs until the controller is dropped
async fn drive(
    mut transport: Box<dyn Transport>,
    mut outbound: mpsc::UnboundedReceiver<BytesMut>,
    events: broadcast::Sender<Event>,
    link: watch::Sender<LinkState>,
    config: ControllerConfig,
) {
    let mut reassembler = Reassembler::new(Codec::new(config.profile))
        .with_max_len(config.rx_max)
        .with_policy(config.resync);

    let mut probe = interval(config.probe_interval);
    probe.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if transport.is_connected() {
            tokio::select! {
                received = transport.receive() => match received {
                    Ok(bytes) => publish(&mut reassembler, &bytes, &events),
                    Err(e) => {
                        warn!("Receive from {} failed: {}", transport.endpoint(), e);
                        close(transport.as_mut(), &mut reassembler, &link).await;
                    }
                },
                frame = outbound.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = transport.send(&frame).await {
                            warn!("Send to {} failed: {}", transport.endpoint(), e);
                            close(transport.as_mut(), &mut reassembler, &link).await;
                        }
                    }
                    None => break,
                },
            }
        } else {
            if *link.borrow() == LinkState::Closed {
                link.send_replace(LinkState::Searching);
            }

            tokio::select! {
                _ = probe.tick() => open(transport.as_mut(), &link).await,
                frame = outbound.recv() => match frame {
                    Some(_) => debug!("Link not open, dropping queued frame"),
                    None => break,
                },
            }
        }
    }

    if transport.is_connected() {
        if let Err(e) = transport.disconnect().await {
            warn!("Disconnect from {} failed: {}", transport.endpoint(), e);
        }
    }

    link.send_replace(LinkState::Closed);
    info!("Controller stopped");
}

async fn open(transport: &mut dyn Transport, link: &watch::Sender<LinkState>) {
    match transport.probe().await {
        Ok(true) => {}
        Ok(false) => {
            trace!("{} not found", transport.endpoint());
            return;
        }
        Err(e) => {
            debug!("Probe failed: {}", e);
            return;
        }
    }

    match transport.connect().await {
        Ok(()) => {
            info!("Link open on {}", transport.endpoint());
            link.send_replace(LinkState::Open);
        }
        Err(e) => debug!("Open {} failed: {}", transport.endpoint(), e),
    }
}

async fn close(
    transport: &mut dyn Transport,
    reassembler: &mut Reassembler,
    link: &watch::Sender<LinkState>,
) {
    if let Err(e) = transport.disconnect().await {
        debug!("Disconnect failed: {}", e);
    }

    // A partial frame from the old stream must not prefix the new one
    reassembler.clear();

    info!("Link closed on {}", transport.endpoint());
    link.send_replace(LinkState::Closed);
}

fn publish(reassembler: &mut Reassembler, bytes: &[u8], events: &broadcast::Sender<Event>) {
    for message in reassembler.push(bytes) {
        match message {
            Message::Event(event) => {
                debug!("Received {}", event);

                // No subscribers is fine
                let _ = events.send(event);
            }
            Message::Command(command) => warn!("Ignoring command frame from hardware: {}", command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use waterbridge_core::{CommandKind, ResultCode};
    use waterbridge_transport::TcpTransport;
    use waterbridge_types::StatusSnapshot;

    use crate::Error;

    const WAIT: Duration = Duration::from_secs(5);

    fn config() -> ControllerConfig {
        ControllerConfig::default().with_probe_interval(Duration::from_millis(10))
    }

    fn frame(message: impl Into<Message>) -> Vec<u8> {
        Codec::default().encode(&message.into()).unwrap().to_vec()
    }

    async fn wait_for_link(controller: &DeviceController, state: LinkState) {
        let mut link = controller.watch_link();
        timeout(WAIT, link.wait_for(|current| *current == state))
            .await
            .expect("link state not reached")
            .unwrap();
    }

    async fn connected() -> (DeviceController, TcpStream, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let controller = DeviceController::new(TcpTransport::new("127.0.0.1", port), config());
        controller.start();

        let (peer, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        wait_for_link(&controller, LinkState::Open).await;

        (controller, peer, listener)
    }

    #[tokio::test]
    async fn test_starts_searching() {
        let controller = DeviceController::new(TcpTransport::new("127.0.0.1", 4001), config());
        assert_eq!(controller.link_state(), LinkState::Searching);
    }

    #[tokio::test]
    async fn test_send_before_open_is_dropped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let controller = DeviceController::new(TcpTransport::new("127.0.0.1", port), config());
        assert_eq!(controller.link_state(), LinkState::Searching);

        controller
            .send(Command::PlayAudio { machine_id: 0, audio_index: 1 })
            .unwrap();

        controller.start();
        let (mut peer, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        wait_for_link(&controller, LinkState::Open).await;

        let second = Command::Config { machine_id: 1, max_flow_allowed: 42 };
        controller.send(second.clone()).unwrap();

        // The first bytes on the link belong to the command sent while open
        let expected = frame(second);
        let mut buf = vec![0u8; expected.len()];
        timeout(WAIT, peer.read_exact(&mut buf)).await.unwrap().unwrap();
        assert_eq!(buf, expected);
    }

    #[tokio::test]
    async fn test_encode_error_reaches_caller() {
        let controller = DeviceController::new(
            TcpTransport::new("127.0.0.1", 4001),
            config().with_profile(Profile::Quota),
        );

        let result = controller.send(Command::CancelOpenVan { machine_id: 0 });
        assert!(matches!(result, Err(Error::Core(_))));
    }

    #[tokio::test]
    async fn test_events_from_split_reads() {
        let (controller, mut peer, _listener) = connected().await;
        let mut events = controller.subscribe();

        let mut bytes = frame(Event::ack(CommandKind::OpenVan, 1));
        bytes.extend(frame(Event::Result {
            command: CommandKind::OpenVan,
            machine_id: 1,
            result: ResultCode::Success,
        }));
        bytes.extend(frame(Event::Status(StatusSnapshot::idle(2))));

        let (head, tail) = bytes.split_at(5);
        peer.write_all(head).await.unwrap();
        peer.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        peer.write_all(tail).await.unwrap();

        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(timeout(WAIT, events.recv()).await.unwrap().unwrap());
        }

        assert_eq!(
            received,
            vec![
                Event::ack(CommandKind::OpenVan, 1),
                Event::success(CommandKind::OpenVan, 1),
                Event::Status(StatusSnapshot::idle(2)),
            ]
        );
    }

    #[tokio::test]
    async fn test_command_written_to_link() {
        let (controller, mut peer, _listener) = connected().await;

        let command = Command::OpenVan { machine_id: 0, volume: 200 };
        controller.send(command.clone()).unwrap();

        let expected = frame(command);
        let mut buf = vec![0u8; expected.len()];
        timeout(WAIT, peer.read_exact(&mut buf)).await.unwrap().unwrap();

        assert_eq!(buf, expected);
        assert_eq!(buf, [0x78, 0x41, 0x03, 0x00, 0x00, 0xC8, 0xC8, 0x79]);
    }

    #[tokio::test]
    async fn test_command_frames_from_hardware_are_ignored() {
        let (controller, mut peer, _listener) = connected().await;
        let mut events = controller.subscribe();

        let mut bytes = frame(Command::CancelOpenVan { machine_id: 0 });
        bytes.extend(frame(Event::ack(CommandKind::Config, 0)));
        peer.write_all(&bytes).await.unwrap();

        let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert_eq!(event, Event::ack(CommandKind::Config, 0));
    }

    #[tokio::test]
    async fn test_reconnects_after_link_loss() {
        let (controller, peer, listener) = connected().await;
        let mut events = controller.subscribe();

        // Half a frame, then the link drops
        let partial = frame(Event::ack(CommandKind::PlayAudio, 0));
        let mut peer = peer;
        peer.write_all(&partial[..3]).await.unwrap();
        drop(peer);

        let (mut peer, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        wait_for_link(&controller, LinkState::Open).await;

        peer.write_all(&frame(Event::ack(CommandKind::Config, 2)))
            .await
            .unwrap();

        // The stale half frame was discarded with the old stream
        let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert_eq!(event, Event::ack(CommandKind::Config, 2));
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (controller, _peer, listener) = connected().await;

        controller.start();

        // A second driver would open a second connection
        let second = timeout(Duration::from_millis(200), listener.accept()).await;
        assert!(second.is_err());
        assert_eq!(controller.link_state(), LinkState::Open);
    }
}
