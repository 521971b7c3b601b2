//! Software model of the vending hardware
//!
//! Answers commands the way a unit does: an ack right away, a result
//! after a command-specific delay. Once started it also emits a status
//! heartbeat for every machine and cycles card detection round-robin.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use waterbridge_core::{
    constants::simulation::{
        DEFAULT_FLOW, FAST_RESULT_DELAY_MS, RFID_DETECT_INTERVAL, RFID_REMOVAL_DELAY,
        SLOW_RESULT_DELAY_MS, STATUS_INTERVAL,
    },
    Command, CommandKind, Error as CoreError, Event, Profile,
};
use waterbridge_types::{
    CardData, CardDate, ErrorFlags, MachineId, RfidRecord, RfidTag, StatusSnapshot,
};

use crate::device::Device;
use crate::error::Result;

/// State of one simulated machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineState {
    pub machine_id: MachineId,
    pub object_placed: bool,
    pub solenoid_open: bool,
    pub flow_rate: u8,
    pub rfid_placed: bool,
    pub rfid: RfidRecord,
    pub errors: ErrorFlags,
    pub max_flow_allowed: Option<u8>,
    // Bumped by every open/cancel; a pending close only applies if unchanged
    valve_generation: u64,
}

impl MachineState {
    pub fn new(machine_id: MachineId, rfid: RfidRecord) -> Self {
        Self {
            machine_id,
            object_placed: false,
            solenoid_open: false,
            flow_rate: 0,
            rfid_placed: false,
            rfid,
            errors: ErrorFlags::empty(),
            max_flow_allowed: None,
            valve_generation: 0,
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            machine_id: self.machine_id,
            object_placed: self.object_placed,
            solenoid_open: self.solenoid_open,
            water_flow: self.flow_rate,
            rfid_placed: self.rfid_placed,
            errors: self.errors,
        }
    }

    fn close_valve(&mut self) {
        self.solenoid_open = false;
        self.flow_rate = 0;
    }
}

/// The three machines a fresh simulator starts with, carrying cards in
/// the layout of `profile`
pub fn default_machines(profile: Profile) -> Vec<MachineState> {
    let issue_date = CardDate::new(24, 1, 1);
    let data = match profile {
        Profile::Prepaid => CardData::Prepaid {
            balance: 50_000,
            issue_date,
            expire_date: CardDate::new(25, 1, 1),
        },
        Profile::Quota => CardData::Quota {
            valid: true,
            volume: 5_000,
            issue_date,
        },
    };

    [[1u8, 2, 3, 4], [3, 4, 5, 6], [7, 8, 9, 10]]
        .into_iter()
        .zip(0..)
        .filter_map(|(tag, machine_id)| {
            let tag = RfidTag::new(tag).ok()?;
            Some(MachineState::new(machine_id, RfidRecord::new(tag, data.clone())))
        })
        .collect()
}

fn card_fits(data: &CardData, profile: Profile) -> bool {
    matches!(
        (data, profile),
        (CardData::Prepaid { .. }, Profile::Prepaid) | (CardData::Quota { .. }, Profile::Quota)
    )
}

/// Simulator settings
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Commands and cards outside this profile are rejected
    pub profile: Profile,

    pub machines: Vec<MachineState>,

    /// Flow while the valve is open, in cc/s
    pub flow_rate: u8,

    pub status_interval: Duration,
    pub rfid_detect_interval: Duration,

    /// How long a detected card stays on the reader
    pub rfid_removal_delay: Duration,

    /// Result delay for cancel and card updates
    pub slow_result_delay: Duration,

    /// Result delay for config and audio
    pub fast_result_delay: Duration,

    pub event_capacity: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self::for_profile(Profile::default())
    }
}

impl SimulatorConfig {
    /// Defaults for a unit speaking `profile`, seeded with matching cards
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            profile,
            machines: default_machines(profile),
            flow_rate: DEFAULT_FLOW,
            status_interval: Duration::from_secs(STATUS_INTERVAL),
            rfid_detect_interval: Duration::from_secs(RFID_DETECT_INTERVAL),
            rfid_removal_delay: Duration::from_secs(RFID_REMOVAL_DELAY),
            slow_result_delay: Duration::from_millis(SLOW_RESULT_DELAY_MS),
            fast_result_delay: Duration::from_millis(FAST_RESULT_DELAY_MS),
            event_capacity: 256,
        }
    }

    pub fn with_machines(mut self, machines: Vec<MachineState>) -> Self {
        self.machines = machines;
        self
    }

    pub fn with_flow_rate(mut self, flow_rate: u8) -> Self {
        self.flow_rate = flow_rate;
        self
    }

    pub fn with_status_interval(mut self, status_interval: Duration) -> Self {
        self.status_interval = status_interval;
        self
    }

    pub fn with_rfid_detect_interval(mut self, rfid_detect_interval: Duration) -> Self {
        self.rfid_detect_interval = rfid_detect_interval;
        self
    }

    pub fn with_rfid_removal_delay(mut self, rfid_removal_delay: Duration) -> Self {
        self.rfid_removal_delay = rfid_removal_delay;
        self
    }

    pub fn with_slow_result_delay(mut self, slow_result_delay: Duration) -> Self {
        self.slow_result_delay = slow_result_delay;
        self
    }

    pub fn with_fast_result_delay(mut self, fast_result_delay: Duration) -> Self {
        self.fast_result_delay = fast_result_delay;
        self
    }

    pub fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }
}

/// Simulated device
///
/// Commands for unknown machines are logged and dropped without an ack.
///
/// # Examples
///
/// ```no_run
/// use waterbridge::{Command, Device, DeviceSimulator, SimulatorConfig};
///
/// #[tokio::main]
/// async fn main() -> waterbridge::Result<()> {
///     let simulator = DeviceSimulator::new(SimulatorConfig::default());
///     let mut events = simulator.subscribe();
///     simulator.start();
///
///     simulator.send(Command::OpenVan { machine_id: 0, volume: 200 })?;
///
///     while let Ok(event) = events.recv().await {
///         println!("{}", event);
///     }
///     Ok(())
/// }
/// ```
pub struct DeviceSimulator {
    shared: Arc<Shared>,
    started: AtomicBool,
}

struct Shared {
    config: SimulatorConfig,
    machines: Mutex<BTreeMap<MachineId, MachineState>>,
    events: broadcast::Sender<Event>,
    detect_cursor: AtomicUsize,
}

/// Work left once a command has been applied
struct Followup {
    delay: Duration,
    close_valve: Option<u64>,
}

impl DeviceSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let machines = config
            .machines
            .iter()
            .map(|machine| (machine.machine_id, machine.clone()))
            .collect();

        Self {
            shared: Arc::new(Shared {
                config,
                machines: Mutex::new(machines),
                events,
                detect_cursor: AtomicUsize::new(0),
            }),
            started: AtomicBool::new(false),
        }
    }

    /// Snapshot of one machine
    pub fn machine(&self, machine_id: MachineId) -> Option<MachineState> {
        self.shared.machines.lock().get(&machine_id).cloned()
    }

    pub fn machine_ids(&self) -> Vec<MachineId> {
        self.shared.machines.lock().keys().copied().collect()
    }

    /// Put an object under the nozzle or take it away
    pub fn set_object_placed(&self, machine_id: MachineId, placed: bool) -> bool {
        self.shared.update(machine_id, |machine| machine.object_placed = placed)
    }

    /// Raise or clear hardware faults reported in the status
    pub fn set_errors(&self, machine_id: MachineId, errors: ErrorFlags) -> bool {
        self.shared.update(machine_id, |machine| machine.errors = errors)
    }

    fn schedule(&self, kind: CommandKind, machine_id: MachineId, followup: Followup) {
        let shared = Arc::clone(&self.shared);

        tokio::spawn(async move {
            sleep(followup.delay).await;

            if let Some(generation) = followup.close_valve {
                shared.close_valve(machine_id, generation);
            }

            shared.emit(Event::success(kind, machine_id));
        });
    }
}

impl Device for DeviceSimulator {
    fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Simulator already started");
            return;
        }

        info!(
            "Starting simulator with {} machines",
            self.shared.config.machines.len()
        );

        tokio::spawn(status_loop(Arc::downgrade(&self.shared)));
        tokio::spawn(rfid_loop(Arc::downgrade(&self.shared)));
    }

    fn send(&self, command: Command) -> Result<()> {
        self.shared.check_profile(&command)?;

        let machine_id = command.machine_id();
        let kind = command.kind();

        let followup = {
            let mut machines = self.shared.machines.lock();

            let Some(machine) = machines.get_mut(&machine_id) else {
                warn!("Unknown machine {}, dropping {}", machine_id, command);
                return Ok(());
            };

            debug!("Simulating {}", command);
            self.shared.emit(Event::ack(kind, machine_id));

            self.shared.apply(machine, command)
        };

        self.schedule(kind, machine_id, followup);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }
}

impl Shared {
    /// Refuse what the hardware of this profile could not be sent
    fn check_profile(&self, command: &Command) -> Result<()> {
        let profile = self.config.profile;
        let id = command.protocol_id();

        let supported = id.is_supported_by(profile)
            && match command {
                Command::UpdateRfid { record, .. } => card_fits(&record.data, profile),
                _ => true,
            };

        if supported {
            Ok(())
        } else {
            warn!("{} is not supported by the {} profile", command, profile);
            Err(CoreError::ProfileMismatch { id, profile }.into())
        }
    }

    fn emit(&self, event: Event) {
        trace!("Emitting {}", event);

        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn update(&self, machine_id: MachineId, f: impl FnOnce(&mut MachineState)) -> bool {
        match self.machines.lock().get_mut(&machine_id) {
            Some(machine) => {
                f(machine);
                true
            }
            None => false,
        }
    }

    fn apply(&self, machine: &mut MachineState, command: Command) -> Followup {
        let config = &self.config;
        let fast = Followup {
            delay: config.fast_result_delay,
            close_valve: None,
        };

        match command {
            Command::Config { max_flow_allowed, .. } => {
                machine.max_flow_allowed = Some(max_flow_allowed);
                fast
            }
            Command::OpenVan { volume, .. } => {
                machine.solenoid_open = true;
                machine.flow_rate = config.flow_rate;
                machine.valve_generation += 1;

                Followup {
                    delay: dispense_time(volume, config.flow_rate),
                    close_valve: Some(machine.valve_generation),
                }
            }
            Command::CancelOpenVan { .. } => {
                machine.close_valve();
                machine.valve_generation += 1;

                Followup {
                    delay: config.slow_result_delay,
                    close_valve: None,
                }
            }
            Command::PlayAudio { audio_index, .. } => {
                debug!("Machine {} playing audio {}", machine.machine_id, audio_index);
                fast
            }
            Command::UpdateRfid { record, .. } => {
                machine.rfid = record;

                Followup {
                    delay: config.slow_result_delay,
                    close_valve: None,
                }
            }
        }
    }

    fn close_valve(&self, machine_id: MachineId, generation: u64) {
        let mut machines = self.machines.lock();

        if let Some(machine) = machines.get_mut(&machine_id) {
            if machine.valve_generation == generation {
                machine.close_valve();
            } else {
                trace!("Machine {} valve reused, leaving it", machine_id);
            }
        }
    }

    fn emit_status(&self) {
        let snapshots: Vec<StatusSnapshot> = self
            .machines
            .lock()
            .values()
            .map(MachineState::status)
            .collect();

        for snapshot in snapshots {
            self.emit(Event::Status(snapshot));
        }
    }

    /// Place the next machine's card on its reader
    fn detect_next_card(&self) -> Option<MachineId> {
        let detected = {
            let mut machines = self.machines.lock();
            if machines.is_empty() {
                return None;
            }

            let index = self.detect_cursor.fetch_add(1, Ordering::Relaxed) % machines.len();
            let machine = machines.values_mut().nth(index)?;
            machine.rfid_placed = true;

            (machine.machine_id, machine.rfid.clone())
        };

        let (machine_id, record) = detected;
        debug!("Machine {} detected {}", machine_id, record);
        self.emit(Event::RfidDetected { machine_id, record });

        Some(machine_id)
    }
}

/// Seconds needed to dispense `volume` cc
fn dispense_time(volume: u16, flow_rate: u8) -> Duration {
    let seconds = f64::from(volume) / (f64::from(flow_rate) * 2.0);
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO)
}

async fn status_loop(shared: Weak<Shared>) {
    let Some(period) = shared.upgrade().map(|shared| shared.config.status_interval) else {
        return;
    };

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.emit_status();
    }

    trace!("Status loop stopped");
}

async fn rfid_loop(weak: Weak<Shared>) {
    let Some((period, removal)) = weak.upgrade().map(|shared| {
        (
            shared.config.rfid_detect_interval,
            shared.config.rfid_removal_delay,
        )
    }) else {
        return;
    };

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(shared) = weak.upgrade() else {
            break;
        };

        if let Some(machine_id) = shared.detect_next_card() {
            let weak = weak.clone();

            tokio::spawn(async move {
                sleep(removal).await;

                if let Some(shared) = weak.upgrade() {
                    shared.update(machine_id, |machine| machine.rfid_placed = false);
                }
            });
        }
    }

    trace!("Card detect loop stopped");
}
