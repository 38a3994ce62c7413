pub mod collector;
pub mod decoder;
pub mod faults;
pub mod producer;

use std::time::{SystemTime, UNIX_EPOCH};

pub use collector::{PollSettings, collect_telemetry};
pub use faults::{FaultCode, FaultRotation, FaultSet};
use serde::{Deserialize, Serialize};

/// Payload keys published by the data logger.
pub mod keys {
    pub const FRONT_TYRE_S1: &str = "front_tyre_S1";
    pub const FRONT_TYRE_S2: &str = "front_tyre_S2";
    pub const FRONT_BRAKE_DISK_TEMP: &str = "front_brakes_tps_S1";
    pub const FRONT_BRAKE_TRIGGER: &str = "brakes_imu_in_d5";
    pub const REAR_BRAKE_TRIGGER: &str = "brakes_imu_in_d6";
    pub const FRONT_SUSPENSION_MM: &str = "front_imu_sonar_mm";
    pub const REAR_SUSPENSION_MM: &str = "rear_brake_gps_rear_ss_mm";
    pub const GPS_FIX: &str = "rear_brake_gps_gps_fix";
    pub const WHEEL_SPEED_KMH: &str = "rear_brake_gps_wheel_kmh";
    pub const COOLANT_TEMP_C: &str = "port4_d6_int_tempC";
    pub const HEADLIGHT_TRIGGER: &str = "port4_d6_int_d6";
}

/// A monitored telemetry field. Each one owns exactly one fault code.
///
/// The two brake triggers are read together and share a single field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TelemetryField {
    LeftTyreTemp,
    CentreTyreTemp,
    FrontBrakeDiskTemp,
    BrakeTriggers,
    FrontSuspension,
    RearSuspension,
    GpsFix,
    WheelSpeed,
    CoolantTemp,
    HeadlightTrigger,
}

impl TelemetryField {
    pub const ALL: [TelemetryField; 10] = [
        TelemetryField::LeftTyreTemp,
        TelemetryField::CentreTyreTemp,
        TelemetryField::FrontBrakeDiskTemp,
        TelemetryField::BrakeTriggers,
        TelemetryField::FrontSuspension,
        TelemetryField::RearSuspension,
        TelemetryField::GpsFix,
        TelemetryField::WheelSpeed,
        TelemetryField::CoolantTemp,
        TelemetryField::HeadlightTrigger,
    ];

    /// Payload keys that must all decode for this field to count as decoded.
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            Self::LeftTyreTemp => &[keys::FRONT_TYRE_S1],
            Self::CentreTyreTemp => &[keys::FRONT_TYRE_S2],
            Self::FrontBrakeDiskTemp => &[keys::FRONT_BRAKE_DISK_TEMP],
            Self::BrakeTriggers => &[keys::FRONT_BRAKE_TRIGGER, keys::REAR_BRAKE_TRIGGER],
            Self::FrontSuspension => &[keys::FRONT_SUSPENSION_MM],
            Self::RearSuspension => &[keys::REAR_SUSPENSION_MM],
            Self::GpsFix => &[keys::GPS_FIX],
            Self::WheelSpeed => &[keys::WHEEL_SPEED_KMH],
            Self::CoolantTemp => &[keys::COOLANT_TEMP_C],
            Self::HeadlightTrigger => &[keys::HEADLIGHT_TRIGGER],
        }
    }

    pub fn fault_code(&self) -> FaultCode {
        let position = Self::ALL
            .iter()
            .position(|field| field == self)
            .unwrap_or_default();
        FaultCode::new(position as u8 + 1)
    }
}

/// The decoded content of one telemetry frame.
///
/// Every value is optional: `None` means the key was missing or malformed in this
/// frame. Snapshots are built per datagram and dropped once applied.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Left tyre section temperature (°C)
    pub front_tyre_s1: Option<f64>,
    /// Centre tyre section temperature (°C)
    pub front_tyre_s2: Option<f64>,
    /// Front brake disk temperature (°C)
    pub front_brake_disk_temp: Option<f64>,
    /// Front brake digital trigger, 0 = released, 1 = applied
    pub front_brake: Option<i32>,
    /// Rear brake digital trigger, 0 = released, 1 = applied
    pub rear_brake: Option<i32>,
    /// Front suspension sonar distance (mm)
    pub front_suspension_mm: Option<f64>,
    /// Rear suspension distance (mm)
    pub rear_suspension_mm: Option<f64>,
    /// GPS fix flag, 1 = locked
    pub gps_fix: Option<i32>,
    /// Rear wheel speed (km/h)
    pub wheel_speed_kmh: Option<f64>,
    /// Coolant temperature (°C)
    pub coolant_temp_c: Option<f64>,
    /// Headlight digital trigger, 1 = on
    pub headlight: Option<i32>,
}

impl TelemetrySnapshot {
    pub fn is_decoded(&self, field: TelemetryField) -> bool {
        match field {
            TelemetryField::LeftTyreTemp => self.front_tyre_s1.is_some(),
            TelemetryField::CentreTyreTemp => self.front_tyre_s2.is_some(),
            TelemetryField::FrontBrakeDiskTemp => self.front_brake_disk_temp.is_some(),
            TelemetryField::BrakeTriggers => {
                self.front_brake.is_some() && self.rear_brake.is_some()
            }
            TelemetryField::FrontSuspension => self.front_suspension_mm.is_some(),
            TelemetryField::RearSuspension => self.rear_suspension_mm.is_some(),
            TelemetryField::GpsFix => self.gps_fix.is_some(),
            TelemetryField::WheelSpeed => self.wheel_speed_kmh.is_some(),
            TelemetryField::CoolantTemp => self.coolant_temp_c.is_some(),
            TelemetryField::HeadlightTrigger => self.headlight.is_some(),
        }
    }

    pub fn failed_fields(&self) -> impl Iterator<Item = TelemetryField> + '_ {
        TelemetryField::ALL
            .into_iter()
            .filter(move |field| !self.is_decoded(*field))
    }
}

/// A raw frame as received from the logger, as written to a recording file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    /// Wall-clock receive time, milliseconds since the unix epoch
    pub received_at_ms: u64,
    pub payload: String,
}

impl RecordedFrame {
    pub fn new(payload: &str) -> Self {
        let received_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        Self {
            received_at_ms,
            payload: payload.to_string(),
        }
    }
}
