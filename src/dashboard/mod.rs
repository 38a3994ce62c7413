pub mod lap_timer;
pub mod lean;
pub mod mapper;
pub mod sequencer;
pub mod state;

use std::time::Instant;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::telemetry::{FaultCode, FaultRotation, FaultSet, TelemetrySnapshot, decoder};
use lap_timer::{
    LapModeDebouncer, LapModeTransition, LapTimer, TriggerAction, evaluate_triggers,
    format_lap_time,
};
use lean::{LeanAngleTracker, OrientationSample, format_left_lean, format_right_lean};
use mapper::map_value;
pub use sequencer::{BootSequencer, OperatingMode, Screen, SplashAnimation};
pub use state::{DashboardState, Gauge, Indicator, Readout};

const MIN_TYRE_TEMP: f64 = 0.;
const MAX_TYRE_TEMP: f64 = 100.;
const MIN_BRAKE_DISK_TEMP: f64 = 0.;
const MAX_BRAKE_DISK_TEMP: f64 = 100.;
const MIN_COOLANT_TEMP: f64 = 20.;
const MAX_COOLANT_TEMP: f64 = 120.;
const MIN_SUSPENSION_LEVEL: f64 = 0.;
const MAX_SUSPENSION_LEVEL: f64 = 1.;
const FRONT_SUSPENSION_RANGE_MM: (f64, f64) = (16., 80.);
const REAR_SUSPENSION_RANGE_MM: (f64, f64) = (32., 128.);
const TYRE_GAUGE_SCALE: f64 = 1.43;
const TEMP_GAUGE_SCALE: f64 = 1.1;
const MAX_SPEED_KMH: i32 = 300;

const BRAKE_APPLIED: i32 = 1;
const BRAKE_RELEASED: i32 = 0;
const BASELINE_LEFT_LEAN_SWEEP: f32 = -2.;
const BASELINE_RIGHT_LEAN_SWEEP: f32 = 2.;

/// Messages accepted by the dashboard. Every producer talks to the dashboard
/// through these; none of them touch the state directly.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// A raw payload from the data logger
    Frame { payload: String, received_at: Instant },
    /// Recompute the running lap time
    SampleLapTimer { now: Instant },
    /// Show the next active fault code
    RotateFault,
    /// A motion sensor sample
    Orientation(OrientationSample),
    /// The presentation finished playing the current splash animation
    SplashFinished,
    /// Formatted wall-clock time
    ClockTick { time: String },
    ResetLeanMaxima,
}

/// State changes published to the presentation layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DashboardUpdate {
    Gauge { gauge: Gauge, scale: f32 },
    Indicator { indicator: Indicator, visible: bool },
    Readout { readout: Readout, text: String },
    Stopwatch { armed: bool },
    ActiveFault(Option<FaultCode>),
    Mode(OperatingMode),
    Screen(Screen),
}

/// Tunables of the dashboard state machine.
#[derive(Clone, Debug)]
pub struct DashboardSettings {
    pub calibration_offset_deg: i32,
    pub lap_mode_window: u32,
    pub rear_brake_shutdown: bool,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            calibration_offset_deg: 5,
            lap_mode_window: 1000,
            rear_brake_shutdown: true,
        }
    }
}

/// The single consumer of [`Command`]s and sole owner of [`DashboardState`].
pub struct Dashboard {
    settings: DashboardSettings,
    state: DashboardState,
    sequencer: BootSequencer,
    faults: FaultSet,
    fault_rotation: FaultRotation,
    lap_mode: LapModeDebouncer,
    lap_timer: LapTimer,
    lean: LeanAngleTracker,
    front_brake: i32,
    rear_brake: i32,
    outbox: Vec<DashboardUpdate>,
}

impl Dashboard {
    pub fn new(settings: DashboardSettings) -> Self {
        Self {
            lap_mode: LapModeDebouncer::new(settings.lap_mode_window),
            lean: LeanAngleTracker::new(settings.calibration_offset_deg),
            settings,
            state: DashboardState::default(),
            sequencer: BootSequencer::default(),
            faults: FaultSet::new(),
            fault_rotation: FaultRotation::default(),
            lap_timer: LapTimer::default(),
            front_brake: BRAKE_RELEASED,
            rear_brake: BRAKE_RELEASED,
            outbox: Vec::new(),
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn faults(&self) -> &FaultSet {
        &self.faults
    }

    /// Starts the boot sequence.
    pub fn start(&mut self) -> Vec<DashboardUpdate> {
        let updates = self.sequencer.start();
        self.publish_sequencer(updates);
        std::mem::take(&mut self.outbox)
    }

    pub fn handle(&mut self, command: Command) -> Vec<DashboardUpdate> {
        match command {
            Command::Frame {
                payload,
                received_at,
            } => self.on_frame(&payload, received_at),
            Command::SampleLapTimer { now } => self.on_lap_timer_sample(now),
            Command::RotateFault => self.on_rotate_fault(),
            Command::Orientation(sample) => self.on_orientation(&sample),
            Command::SplashFinished => {
                let updates = self.sequencer.splash_finished();
                self.publish_sequencer(updates);
            }
            Command::ClockTick { time } => self.set_readout(Readout::Clock, time),
            Command::ResetLeanMaxima => self.reset_lean_maxima(),
        }
        std::mem::take(&mut self.outbox)
    }

    fn on_frame(&mut self, payload: &str, received_at: Instant) {
        let snapshot = match decoder::decode_payload(payload) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("Dropping telemetry frame: {}", e);
                return;
            }
        };

        if !self.sequencer.updates_enabled() {
            if let Some(updates) = self.sequencer.observe_rear_brake(snapshot.rear_brake) {
                self.publish_sequencer(updates);
                self.apply_baseline();
            }
            return;
        }

        self.faults.record(&snapshot);
        self.apply_snapshot(&snapshot, received_at);
    }

    fn apply_snapshot(&mut self, snapshot: &TelemetrySnapshot, now: Instant) {
        let tyre_scale = |temp: f64| {
            map_value(temp, MIN_TYRE_TEMP, MAX_TYRE_TEMP, 0., TYRE_GAUGE_SCALE) as f32
        };
        self.set_gauge(Gauge::LeftTyreTemp, snapshot.front_tyre_s1.map_or(0., tyre_scale));
        self.set_gauge(Gauge::CentreTyreTemp, snapshot.front_tyre_s2.map_or(0., tyre_scale));
        let brake_disk_scale = snapshot.front_brake_disk_temp.map_or(0., |temp| {
            map_value(temp, MIN_BRAKE_DISK_TEMP, MAX_BRAKE_DISK_TEMP, 0., TEMP_GAUGE_SCALE) as f32
        });
        self.set_gauge(Gauge::FrontBrakeDiskTemp, brake_disk_scale);

        self.apply_brake_triggers(snapshot.front_brake, snapshot.rear_brake);

        self.apply_suspension(
            Gauge::FrontSuspension,
            snapshot.front_suspension_mm,
            FRONT_SUSPENSION_RANGE_MM,
        );
        self.apply_suspension(
            Gauge::RearSuspension,
            snapshot.rear_suspension_mm,
            REAR_SUSPENSION_RANGE_MM,
        );

        if let Some(gps_fix) = snapshot.gps_fix {
            self.set_indicator(Indicator::GpsFix, gps_fix == 1);
        }

        if let Some(speed) = snapshot.wheel_speed_kmh {
            let speed_kmh = speed as i32;
            if (0..MAX_SPEED_KMH).contains(&speed_kmh) {
                self.state.speed_kmh = Some(speed_kmh);
                self.set_readout(Readout::Speed, format!("{speed_kmh:03}"));
            }
        }

        match snapshot.coolant_temp_c {
            Some(coolant) if coolant > MIN_COOLANT_TEMP => {
                self.state.coolant_temp_c = Some(coolant);
                let scale =
                    map_value(coolant, MIN_COOLANT_TEMP, MAX_COOLANT_TEMP, 0., TEMP_GAUGE_SCALE);
                self.set_gauge(Gauge::CoolantTemp, scale as f32);
                self.set_readout(Readout::Coolant, format!("{:03}", coolant as i32));
            }
            Some(_) => {}
            None => self.set_gauge(Gauge::CoolantTemp, 0.),
        }

        if let Some(headlight) = snapshot.headlight {
            self.apply_headlight(headlight, now);
        }
    }

    fn apply_brake_triggers(&mut self, front: Option<i32>, rear: Option<i32>) {
        let Some(front) = front else {
            return;
        };
        self.front_brake = front;
        self.set_indicator(Indicator::FrontBrake, front != BRAKE_APPLIED);

        let Some(rear) = rear else {
            return;
        };
        self.rear_brake = rear;
        self.set_indicator(Indicator::RearBrake, rear != BRAKE_APPLIED);

        let both_released = front == BRAKE_RELEASED && rear == BRAKE_RELEASED;
        match self.lap_mode.observe(both_released) {
            Some(LapModeTransition::Activated) => {
                info!("Lap mode enabled");
                self.state.lap_mode_enabled = true;
                self.set_indicator(Indicator::LapTimerPanel, true);
                self.set_indicator(Indicator::LapMode, true);
            }
            Some(LapModeTransition::Deactivated) => {
                info!("Lap mode disabled");
                self.lap_timer.reset();
                self.state.lap_timer_armed = false;
                self.publish_stopwatch(false);
                self.state.lap_mode_enabled = false;
                self.set_indicator(Indicator::LapTimerPanel, false);
                self.set_indicator(Indicator::LapMode, false);
            }
            None => {}
        }

        if rear == BRAKE_APPLIED && self.settings.rear_brake_shutdown {
            let updates = self.sequencer.begin_shutdown();
            self.publish_sequencer(updates);
        }
    }

    fn apply_suspension(&mut self, gauge: Gauge, distance_mm: Option<f64>, range_mm: (f64, f64)) {
        match distance_mm {
            Some(distance) => {
                let scale = 1.
                    - map_value(
                        distance,
                        range_mm.0,
                        range_mm.1,
                        MIN_SUSPENSION_LEVEL,
                        MAX_SUSPENSION_LEVEL,
                    ) as f32;
                if scale >= 0. {
                    self.set_gauge(gauge, scale);
                }
            }
            None => self.set_gauge(gauge, 0.),
        }
    }

    fn apply_headlight(&mut self, headlight: i32, now: Instant) {
        if self.lap_mode.is_active() {
            match evaluate_triggers(
                headlight,
                self.front_brake,
                self.rear_brake,
                self.lap_timer.is_armed(),
            ) {
                Some(TriggerAction::Arm) => {
                    self.lap_timer.arm(now);
                    self.state.lap_timer_armed = true;
                    self.state.elapsed_lap_ms = 0;
                    self.publish_stopwatch(true);
                }
                Some(TriggerAction::Disarm) => {
                    let elapsed = self.lap_timer.disarm(now);
                    self.state.lap_timer_armed = false;
                    self.state.elapsed_lap_ms = elapsed;
                    self.set_readout(Readout::LapTime, format_lap_time(elapsed));
                    self.publish_stopwatch(false);
                }
                None => {}
            }
        }
        self.set_indicator(Indicator::Headlight, headlight == 1);
    }

    fn on_lap_timer_sample(&mut self, now: Instant) {
        if !self.sequencer.updates_enabled() {
            return;
        }
        if let Some(elapsed) = self.lap_timer.sample(now) {
            self.state.elapsed_lap_ms = elapsed;
            self.set_readout(Readout::LapTime, format_lap_time(elapsed));
        }
    }

    fn on_rotate_fault(&mut self) {
        if !self.sequencer.updates_enabled() {
            return;
        }
        let fault = self.fault_rotation.next(&self.faults);
        self.set_indicator(Indicator::SensorFault, fault.is_some());
        self.outbox.push(DashboardUpdate::ActiveFault(fault));
    }

    fn on_orientation(&mut self, sample: &OrientationSample) {
        if !self.sequencer.updates_enabled() {
            return;
        }
        if !sample.pitch_rad.is_finite() {
            debug!("Dropping orientation sample with pitch {}", sample.pitch_rad);
            return;
        }
        let reading = self.lean.update(sample);
        let angle = reading.angle_deg;
        self.state.lean_angle_deg = angle;

        if reading.left {
            self.set_gauge(Gauge::LeftLean, -(angle as f32));
            self.set_readout(Readout::LeanAngle, format_left_lean(angle));
            if reading.new_left_max {
                self.state.max_left_lean_deg = self.lean.max_left_deg();
                self.set_readout(Readout::MaxLeftLean, format_left_lean(angle));
                self.set_gauge(Gauge::MaxLeftLean, -(angle as f32));
            }
        }
        if reading.right {
            self.set_gauge(Gauge::RightLean, -(angle as f32));
            self.set_readout(Readout::LeanAngle, format_right_lean(angle.saturating_neg()));
            if reading.new_right_max {
                self.state.max_right_lean_deg = self.lean.max_right_deg();
                self.set_readout(Readout::MaxRightLean, format_right_lean(angle.saturating_neg()));
                self.set_gauge(Gauge::MaxRightLean, -(angle as f32));
            }
        }
    }

    fn reset_lean_maxima(&mut self) {
        self.lean.reset_maxima();
        self.state.max_left_lean_deg = 0;
        self.state.max_right_lean_deg = 0;
        self.set_readout(Readout::MaxLeftLean, format_left_lean(0));
        self.set_readout(Readout::MaxRightLean, format_right_lean(0));
        self.set_gauge(Gauge::MaxLeftLean, 0.);
        self.set_gauge(Gauge::MaxRightLean, 0.);
    }

    /// Instruments as they look right after the logger comes online.
    fn apply_baseline(&mut self) {
        self.lap_timer.reset();
        self.state.lap_timer_armed = false;
        self.state.elapsed_lap_ms = 0;
        self.set_readout(Readout::LapTime, state::ZERO_LAP_TIME.to_string());
        self.publish_stopwatch(false);

        self.set_gauge(Gauge::LeftLean, BASELINE_LEFT_LEAN_SWEEP);
        self.set_gauge(Gauge::RightLean, BASELINE_RIGHT_LEAN_SWEEP);
        self.set_gauge(Gauge::MaxLeftLean, 0.);
        self.set_gauge(Gauge::MaxRightLean, 0.);
        self.state.lean_angle_deg = 0;
        self.set_readout(Readout::LeanAngle, format_left_lean(0));
        self.set_readout(Readout::MaxLeftLean, format_left_lean(0));
        self.set_readout(Readout::MaxRightLean, format_right_lean(0));

        self.set_readout(Readout::Gear, state::NEUTRAL_GEAR.to_string());
        for gauge in [
            Gauge::LeftTyreTemp,
            Gauge::CentreTyreTemp,
            Gauge::FrontBrakeDiskTemp,
            Gauge::CoolantTemp,
        ] {
            self.set_gauge(gauge, 0.);
        }
        self.set_readout(Readout::Coolant, state::DEFAULT_COOLANT_TEXT.to_string());

        for indicator in [
            Indicator::FrontBrake,
            Indicator::RearBrake,
            Indicator::Headlight,
            Indicator::LapMode,
            Indicator::SensorFault,
            Indicator::GpsFix,
            Indicator::LapTimerPanel,
        ] {
            self.set_indicator(indicator, false);
        }
        self.set_indicator(Indicator::Clock, true);
    }

    fn publish_stopwatch(&mut self, armed: bool) {
        self.set_indicator(Indicator::Clock, !armed);
        self.outbox.push(DashboardUpdate::Stopwatch { armed });
    }

    fn publish_sequencer(&mut self, updates: Vec<DashboardUpdate>) {
        self.state.mode = self.sequencer.mode();
        self.outbox.extend(updates);
    }

    fn set_gauge(&mut self, gauge: Gauge, scale: f32) {
        self.state.gauges.insert(gauge, scale);
        self.outbox.push(DashboardUpdate::Gauge { gauge, scale });
    }

    fn set_indicator(&mut self, indicator: Indicator, visible: bool) {
        self.state.indicators.insert(indicator, visible);
        self.outbox.push(DashboardUpdate::Indicator { indicator, visible });
    }

    fn set_readout(&mut self, readout: Readout, text: String) {
        self.state.readouts.insert(readout, text.clone());
        self.outbox.push(DashboardUpdate::Readout { readout, text });
    }
}
