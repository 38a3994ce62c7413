use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::sequencer::OperatingMode;

/// Scaled gauges driven by the dashboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gauge {
    LeftTyreTemp,
    CentreTyreTemp,
    FrontBrakeDiskTemp,
    CoolantTemp,
    FrontSuspension,
    RearSuspension,
    LeftLean,
    RightLean,
    MaxLeftLean,
    MaxRightLean,
}

/// On/off overlays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indicator {
    FrontBrake,
    RearBrake,
    GpsFix,
    Headlight,
    LapMode,
    LapTimerPanel,
    SensorFault,
    Clock,
}

/// Formatted text readouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Readout {
    Speed,
    Coolant,
    Gear,
    LeanAngle,
    MaxLeftLean,
    MaxRightLean,
    LapTime,
    Clock,
}

pub(crate) const NEUTRAL_GEAR: &str = "-";
pub(crate) const ZERO_LAP_TIME: &str = "00:00:00:00";
pub(crate) const DEFAULT_COOLANT_TEXT: &str = "000";

/// Authoritative dashboard state. Only the [`Dashboard`](super::Dashboard)
/// mutates it; presentation sees copies carried by updates.
#[derive(Clone, Debug, Default)]
pub struct DashboardState {
    pub(crate) gauges: HashMap<Gauge, f32>,
    pub(crate) indicators: HashMap<Indicator, bool>,
    pub(crate) readouts: HashMap<Readout, String>,
    pub(crate) speed_kmh: Option<i32>,
    pub(crate) coolant_temp_c: Option<f64>,
    pub(crate) lean_angle_deg: i32,
    pub(crate) max_left_lean_deg: i32,
    pub(crate) max_right_lean_deg: i32,
    pub(crate) lap_mode_enabled: bool,
    pub(crate) lap_timer_armed: bool,
    pub(crate) elapsed_lap_ms: u64,
    pub(crate) mode: OperatingMode,
}

impl DashboardState {
    pub fn gauge(&self, gauge: Gauge) -> Option<f32> {
        self.gauges.get(&gauge).copied()
    }

    pub fn is_visible(&self, indicator: Indicator) -> bool {
        self.indicators.get(&indicator).copied().unwrap_or(false)
    }

    pub fn readout(&self, readout: Readout) -> Option<&str> {
        self.readouts.get(&readout).map(String::as_str)
    }

    /// Last accepted wheel speed (km/h).
    pub fn speed_kmh(&self) -> Option<i32> {
        self.speed_kmh
    }

    /// Last accepted coolant temperature (°C).
    pub fn coolant_temp_c(&self) -> Option<f64> {
        self.coolant_temp_c
    }

    /// Signed lean angle, positive to the left.
    pub fn lean_angle_deg(&self) -> i32 {
        self.lean_angle_deg
    }

    pub fn max_left_lean_deg(&self) -> i32 {
        self.max_left_lean_deg
    }

    pub fn max_right_lean_deg(&self) -> i32 {
        self.max_right_lean_deg
    }

    pub fn lap_mode_enabled(&self) -> bool {
        self.lap_mode_enabled
    }

    pub fn lap_timer_armed(&self) -> bool {
        self.lap_timer_armed
    }

    pub fn elapsed_lap_ms(&self) -> u64 {
        self.elapsed_lap_ms
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }
}
