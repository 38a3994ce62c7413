use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use super::{TelemetryField, TelemetrySnapshot};

/// Sensor fault identifier shown on the cluster (`E1`..`E10`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FaultCode(u8);

impl FaultCode {
    pub fn new(code: u8) -> Self {
        Self(code)
    }

    pub fn code(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Active fault codes, at most one per monitored field.
///
/// A field's code is present iff the latest decode of that field failed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaultSet {
    active: BTreeSet<FaultCode>,
}

impl FaultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, field: TelemetryField) {
        self.active.insert(field.fault_code());
    }

    pub fn clear(&mut self, field: TelemetryField) {
        self.active.remove(&field.fault_code());
    }

    /// Raise or clear every field's code from one decoded snapshot.
    pub fn record(&mut self, snapshot: &TelemetrySnapshot) {
        for field in TelemetryField::ALL {
            if snapshot.is_decoded(field) {
                self.clear(field);
            } else {
                self.raise(field);
            }
        }
    }

    pub fn contains(&self, field: TelemetryField) -> bool {
        self.active.contains(&field.fault_code())
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FaultCode> {
        self.active.iter()
    }
}

/// Cycles through the active fault codes, one per tick.
#[derive(Debug, Default)]
pub struct FaultRotation {
    last_shown: Option<FaultCode>,
}

impl FaultRotation {
    /// The next code after the last one shown, wrapping around. `None` when the
    /// set is empty.
    pub fn next(&mut self, faults: &FaultSet) -> Option<FaultCode> {
        let next = match self.last_shown {
            Some(last) => faults
                .iter()
                .find(|code| **code > last)
                .or_else(|| faults.iter().next()),
            None => faults.iter().next(),
        }
        .copied();
        self.last_shown = next;
        next
    }
}
