// Device-state monitor
//
// Owns the live DeviceState. Platform connectivity/battery signals arrive
// as events; observers receive fresh snapshots on a broadcast channel and
// never call back into the monitor from the notification path.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

use tailbatch_core::{DeviceState, NetworkType};

/// A signal from the host platform's connectivity or power source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlatformEvent {
    Connectivity {
        network_type: NetworkType,
        is_connected: bool,
    },
    Battery {
        level: f64,
        is_charging: bool,
    },
}

const OBSERVER_CAPACITY: usize = 16;

pub struct DeviceMonitor {
    state: RwLock<DeviceState>,
    updates: broadcast::Sender<DeviceState>,
}

impl DeviceMonitor {
    pub fn new() -> Arc<Self> {
        Self::with_state(DeviceState::default())
    }

    /// Start from a known state; used by hosts that can read connectivity
    /// synchronously at startup, and by tests.
    pub fn with_state(initial: DeviceState) -> Arc<Self> {
        let (updates, _) = broadcast::channel(OBSERVER_CAPACITY);
        Arc::new(Self {
            state: RwLock::new(initial),
            updates,
        })
    }

    /// Current snapshot. Never blocks the signal source.
    pub fn state(&self) -> DeviceState {
        *self.state.read()
    }

    /// Subscribe to state-change snapshots. Slow observers miss
    /// intermediate snapshots rather than backpressuring the monitor.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceState> {
        self.updates.subscribe()
    }

    /// Apply a platform signal and notify observers.
    pub fn apply(&self, event: PlatformEvent) {
        let snapshot = {
            let mut state = self.state.write();
            match event {
                PlatformEvent::Connectivity {
                    network_type,
                    is_connected,
                } => {
                    state.network_type = network_type;
                    state.is_connected = is_connected;
                }
                PlatformEvent::Battery { level, is_charging } => {
                    state.battery_level = level.clamp(0.0, 1.0);
                    state.is_charging = is_charging;
                }
            }
            *state
        };
        debug!(
            network = %snapshot.network_type,
            connected = snapshot.is_connected,
            charging = snapshot.is_charging,
            "device state changed"
        );
        let _ = self.updates.send(snapshot);
    }

    /// Mark that user-initiated traffic just went out; the radio is warm.
    /// Only ever advances forward.
    pub fn record_user_network_activity(&self) {
        let snapshot = {
            let mut state = self.state.write();
            state.last_user_network_activity = Some(Instant::now());
            *state
        };
        let _ = self.updates.send(snapshot);
    }

    /// Consume a platform signal feed on its own task. The sender half is
    /// whatever the host wires to its OS notifications; dropping it ends
    /// the task.
    pub fn drive_platform_signals(
        self: &Arc<Self>,
        mut events: mpsc::Receiver<PlatformEvent>,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                monitor.apply(event);
            }
            debug!("platform signal feed closed");
        })
    }
}
