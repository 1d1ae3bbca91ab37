// Transmit/wait policy
//
// A pure rule table over (device state, options, priority). Rules are
// applied in order; the first match wins. Reasons are free-form strings
// carried only into logging and the transmission log.

use std::time::{Duration, Instant};

use crate::{DeviceState, NetworkType, Priority};

/// Battery fraction below which discretionary traffic waits while
/// discharging.
pub const LOW_BATTERY_THRESHOLD: f64 = 0.20;

/// Policy knobs, snapshotted from configuration at each decision point.
#[derive(Debug, Clone, Copy)]
pub struct PolicyOptions {
    pub allow_cellular: bool,
    pub require_wifi_for_bulk: bool,
    /// Advisory hints carried from configuration; the rule table does not
    /// branch on them.
    pub prefer_wifi: bool,
    pub prefer_charging: bool,
    pub piggyback_window: Duration,
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Transmit(&'static str),
    Wait(&'static str),
}

impl Decision {
    pub fn should_transmit(&self) -> bool {
        matches!(self, Decision::Transmit(_))
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Decision::Transmit(reason) | Decision::Wait(reason) => reason,
        }
    }
}

/// Evaluate the rule table against the current wall clock.
pub fn evaluate(state: &DeviceState, options: &PolicyOptions, priority: Priority) -> Decision {
    evaluate_at(state, options, priority, Instant::now())
}

/// Evaluate the rule table at an explicit instant (piggyback-window math).
pub fn evaluate_at(
    state: &DeviceState,
    options: &PolicyOptions,
    priority: Priority,
    now: Instant,
) -> Decision {
    if !state.is_connected {
        return Decision::Wait("no network");
    }
    if priority == Priority::Immediate {
        return Decision::Transmit("immediate");
    }
    if state.is_cellular() && !options.allow_cellular {
        return Decision::Wait("cellular not allowed");
    }
    if priority == Priority::Bulk && options.require_wifi_for_bulk && !state.is_wifi() {
        return Decision::Wait("bulk requires WiFi");
    }
    let discretionary = matches!(priority, Priority::Deferrable | Priority::Bulk);
    if state.battery_level < LOW_BATTERY_THRESHOLD && !state.is_charging && discretionary {
        return Decision::Wait("low battery");
    }
    if state.is_wifi() && state.is_charging {
        return Decision::Transmit("optimal");
    }
    if (state.is_wifi() || state.is_charging) && priority != Priority::Bulk {
        return Decision::Transmit("good conditions");
    }
    if state.is_within_piggyback_window_at(now, options.piggyback_window) {
        return Decision::Transmit("radio warm");
    }
    if discretionary {
        return Decision::Wait("awaiting better conditions");
    }
    Decision::Transmit("default allow")
}
