use std::time::Instant;

use log::info;

const MS_PER_HOUR: u64 = 3_600_000;
const MS_PER_MINUTE: u64 = 60_000;
const MS_PER_SECOND: u64 = 1_000;

const TRIGGER_ON: i32 = 1;
const TRIGGER_OFF: i32 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LapModeTransition {
    Activated,
    Deactivated,
}

/// Debounces lap-mode on the "both brakes released" condition.
///
/// The counter ramps toward `window` on each cycle that pushes toward the other
/// state and back toward zero otherwise; a single contrary reading costs one step,
/// never the whole count. Lap-mode activates when the counter reaches `window`
/// while inactive, and deactivates when released cycles run it back to zero.
#[derive(Debug)]
pub struct LapModeDebouncer {
    window: u32,
    counter: u32,
    active: bool,
}

impl LapModeDebouncer {
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            counter: 0,
            active: false,
        }
    }

    pub fn observe(&mut self, both_released: bool) -> Option<LapModeTransition> {
        match (self.active, both_released) {
            (false, true) => {
                self.counter = (self.counter + 1).min(self.window);
                if self.counter == self.window {
                    self.active = true;
                    return Some(LapModeTransition::Activated);
                }
            }
            (false, false) => self.counter = self.counter.saturating_sub(1),
            (true, true) => {
                self.counter = self.counter.saturating_sub(1);
                if self.counter == 0 {
                    self.active = false;
                    return Some(LapModeTransition::Deactivated);
                }
            }
            (true, false) => self.counter = (self.counter + 1).min(self.window),
        }
        None
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerAction {
    Arm,
    Disarm,
}

/// Arm/disarm decision from the handlebar triggers. Only meaningful while
/// lap-mode is active.
pub fn evaluate_triggers(headlight: i32, front_brake: i32, rear_brake: i32, armed: bool) -> Option<TriggerAction> {
    if headlight != TRIGGER_ON {
        return None;
    }
    if rear_brake == TRIGGER_ON && front_brake == TRIGGER_OFF && !armed {
        Some(TriggerAction::Arm)
    } else if rear_brake == TRIGGER_OFF && front_brake == TRIGGER_ON && armed {
        Some(TriggerAction::Disarm)
    } else {
        None
    }
}

/// Stopwatch measured against the monotonic clock.
#[derive(Debug, Default)]
pub struct LapTimer {
    started_at: Option<Instant>,
    elapsed_ms: u64,
}

impl LapTimer {
    pub fn arm(&mut self, now: Instant) {
        info!("Lap timer armed");
        self.started_at = Some(now);
        self.elapsed_ms = 0;
    }

    /// Stops the timer and returns the final elapsed time.
    pub fn disarm(&mut self, now: Instant) -> u64 {
        if let Some(elapsed) = self.sample(now) {
            info!("Lap timer disarmed at {}", format_lap_time(elapsed));
        }
        self.started_at = None;
        self.elapsed_ms
    }

    /// Recomputes the elapsed time while armed.
    pub fn sample(&mut self, now: Instant) -> Option<u64> {
        let started_at = self.started_at?;
        self.elapsed_ms = now.saturating_duration_since(started_at).as_millis() as u64;
        Some(self.elapsed_ms)
    }

    pub fn is_armed(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn reset(&mut self) {
        self.started_at = None;
        self.elapsed_ms = 0;
    }
}

/// Formats milliseconds as `HH:MM:SS:CC`. Hours are not wrapped.
pub fn format_lap_time(elapsed_ms: u64) -> String {
    let hours = elapsed_ms / MS_PER_HOUR;
    let remainder = elapsed_ms % MS_PER_HOUR;
    let minutes = remainder / MS_PER_MINUTE;
    let remainder = remainder % MS_PER_MINUTE;
    let seconds = remainder / MS_PER_SECOND;
    let centiseconds = (remainder % MS_PER_SECOND) / 10;
    format!("{hours:02}:{minutes:02}:{seconds:02}:{centiseconds:02}")
}
