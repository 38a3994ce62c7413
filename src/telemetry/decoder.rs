use serde_json::{Map, Value};

use crate::errors::DashError;

use super::{TelemetrySnapshot, keys};

/// Decode one logger payload into a snapshot.
///
/// The payload must parse as a flat JSON object, otherwise the whole frame is
/// rejected. Past that point every field is extracted on its own: a missing or
/// malformed key only leaves that field empty. Unknown keys are ignored.
pub fn decode_payload(payload: &str) -> Result<TelemetrySnapshot, DashError> {
    let value: Value = serde_json::from_str(payload.trim())
        .map_err(|e| DashError::PayloadParseError { source: e })?;
    let object = value.as_object().ok_or(DashError::PayloadNotAnObject)?;

    Ok(TelemetrySnapshot {
        front_tyre_s1: read_f64(object, keys::FRONT_TYRE_S1),
        front_tyre_s2: read_f64(object, keys::FRONT_TYRE_S2),
        front_brake_disk_temp: read_f64(object, keys::FRONT_BRAKE_DISK_TEMP),
        front_brake: read_i32(object, keys::FRONT_BRAKE_TRIGGER),
        rear_brake: read_i32(object, keys::REAR_BRAKE_TRIGGER),
        front_suspension_mm: read_f64(object, keys::FRONT_SUSPENSION_MM),
        rear_suspension_mm: read_f64(object, keys::REAR_SUSPENSION_MM),
        gps_fix: read_i32(object, keys::GPS_FIX),
        wheel_speed_kmh: read_f64(object, keys::WHEEL_SPEED_KMH),
        coolant_temp_c: read_f64(object, keys::COOLANT_TEMP_C),
        headlight: read_i32(object, keys::HEADLIGHT_TRIGGER),
    })
}

/// Reads a numeric value. Numeric strings are accepted, non-finite values are not.
pub(crate) fn read_f64(object: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = match object.get(key)? {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Reads an integer value, truncating fractional numbers toward zero.
pub(crate) fn read_i32(object: &Map<String, Value>, key: &str) -> Option<i32> {
    if let Some(Value::Number(number)) = object.get(key)
        && let Some(integer) = number.as_i64()
    {
        return i32::try_from(integer).ok();
    }
    read_f64(object, key).map(|value| value as i32)
}
