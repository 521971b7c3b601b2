//! Per-machine event fan-out
//!
//! Clients join the room of the machine they care about and receive only
//! that machine's events. Commands go straight through to the device.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use waterbridge_core::{Command, Event};
use waterbridge_types::MachineId;

use crate::device::Device;
use crate::error::Result;

type Rooms = Arc<Mutex<HashMap<MachineId, broadcast::Sender<Event>>>>;

/// Routes device events to per-machine rooms
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use waterbridge::{Command, DeviceSimulator, Relay, SimulatorConfig};
///
/// #[tokio::main]
/// async fn main() -> waterbridge::Result<()> {
///     let relay = Relay::new(Arc::new(DeviceSimulator::new(SimulatorConfig::default())));
///     relay.start();
///
///     let mut room = relay.join(0);
///     relay.dispatch(Command::PlayAudio { machine_id: 0, audio_index: 2 })?;
///
///     while let Ok(event) = room.recv().await {
///         println!("{}: {}", waterbridge::Relay::<DeviceSimulator>::room_name(0), event);
///     }
///     Ok(())
/// }
/// ```
pub struct Relay<D> {
    device: Arc<D>,
    rooms: Rooms,
    room_capacity: usize,
    started: AtomicBool,
}

impl<D: Device + 'static> Relay<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            rooms: Arc::new(Mutex::new(HashMap::new())),
            room_capacity: 64,
            started: AtomicBool::new(false),
        }
    }

    /// Set how many events a room keeps for slow members
    pub fn with_room_capacity(mut self, room_capacity: usize) -> Self {
        self.room_capacity = room_capacity.max(1);
        self
    }

    /// Name of the room carrying a machine's events
    pub fn room_name(machine_id: MachineId) -> String {
        format!("machine:{}", machine_id)
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Start the device and begin routing its events
    ///
    /// Calling it again has no effect.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Relay already started");
            return;
        }

        // Subscribe first so nothing emitted during start is missed
        let events = self.device.subscribe();
        self.device.start();

        tokio::spawn(route(events, Arc::clone(&self.rooms)));
    }

    /// Join a machine's room
    pub fn join(&self, machine_id: MachineId) -> broadcast::Receiver<Event> {
        let mut rooms = self.rooms.lock();

        let room = rooms.entry(machine_id).or_insert_with(|| {
            debug!("Opening room {}", Self::room_name(machine_id));
            broadcast::channel(self.room_capacity).0
        });

        room.subscribe()
    }

    /// Number of clients in a machine's room
    pub fn members(&self, machine_id: MachineId) -> usize {
        self.rooms
            .lock()
            .get(&machine_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Forward a client command to the device
    pub fn dispatch(&self, command: Command) -> Result<()> {
        info!("Dispatching {}", command);
        self.device.send(command)
    }
}

async fn route(mut events: broadcast::Receiver<Event>, rooms: Rooms) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let machine_id = event.machine_id();
                let mut rooms = rooms.lock();

                let Some(room) = rooms.get(&machine_id) else {
                    continue;
                };

                if room.send(event).is_err() {
                    debug!("Room machine:{} is empty, closing it", machine_id);
                    rooms.remove(&machine_id);
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!("Relay lagging, skipped {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }

    info!("Device event stream closed, relay stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;
    use waterbridge_core::CommandKind;

    use crate::simulator::{DeviceSimulator, SimulatorConfig};

    fn relay() -> Relay<DeviceSimulator> {
        Relay::new(Arc::new(DeviceSimulator::new(SimulatorConfig::default())))
    }

    #[test]
    fn test_room_name() {
        assert_eq!(Relay::<DeviceSimulator>::room_name(3), "machine:3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_routed_by_machine() {
        let relay = relay();
        relay.start();

        let mut room0 = relay.join(0);
        let mut room1 = relay.join(1);

        relay
            .dispatch(Command::PlayAudio { machine_id: 0, audio_index: 1 })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(room0.try_recv().unwrap(), Event::ack(CommandKind::PlayAudio, 0));
        assert_eq!(
            room0.try_recv().unwrap(),
            Event::success(CommandKind::PlayAudio, 0)
        );
        assert!(matches!(room0.try_recv(), Err(TryRecvError::Empty)));
        assert!(matches!(room1.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_routes_once() {
        let relay = relay();
        relay.start();
        relay.start();

        let mut room = relay.join(0);
        relay
            .dispatch(Command::PlayAudio { machine_id: 0, audio_index: 1 })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let mut received = Vec::new();
        while let Ok(event) = room.try_recv() {
            received.push(event);
        }

        assert_eq!(
            received,
            vec![
                Event::ack(CommandKind::PlayAudio, 0),
                Event::success(CommandKind::PlayAudio, 0),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reaches_each_room() {
        let relay = relay();
        relay.start();

        let mut rooms: Vec<_> = (0..3).map(|machine_id| relay.join(machine_id)).collect();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        for (machine_id, room) in rooms.iter_mut().enumerate() {
            match room.try_recv().unwrap() {
                Event::Status(status) => assert_eq!(usize::from(status.machine_id), machine_id),
                other => panic!("Expected status, got {}", other),
            }
            assert!(matches!(room.try_recv(), Err(TryRecvError::Empty)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_members() {
        let relay = relay();

        let first = relay.join(2);
        let second = relay.join(2);
        assert_eq!(relay.members(2), 2);
        assert_eq!(relay.members(1), 0);

        drop(first);
        drop(second);
        assert_eq!(relay.members(2), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_room_is_closed() {
        let relay = relay();
        relay.start();

        drop(relay.join(0));
        relay
            .dispatch(Command::Config { machine_id: 0, max_flow_allowed: 10 })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(relay.rooms.lock().get(&0).is_none());
    }
}
