use serde::{Deserialize, Serialize};

/// Orientation angles as decomposed by the host sensor stack, in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    pub azimuth_rad: f32,
    pub pitch_rad: f32,
    pub roll_rad: f32,
}

impl OrientationSample {
    pub fn from_pitch(pitch_rad: f32) -> Self {
        Self {
            pitch_rad,
            ..Default::default()
        }
    }
}

/// Which side a reading was attributed to. A zero reading counts for both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LeanReading {
    pub angle_deg: i32,
    pub left: bool,
    pub right: bool,
    pub new_left_max: bool,
    pub new_right_max: bool,
}

/// Turns orientation samples into a calibrated lean angle and tracks the
/// largest lean seen on each side.
#[derive(Debug)]
pub struct LeanAngleTracker {
    calibration_offset_deg: i32,
    max_left_deg: i32,
    max_right_deg: i32,
}

impl LeanAngleTracker {
    pub fn new(calibration_offset_deg: i32) -> Self {
        Self {
            calibration_offset_deg,
            max_left_deg: 0,
            max_right_deg: 0,
        }
    }

    pub fn update(&mut self, sample: &OrientationSample) -> LeanReading {
        // whole degrees first, then the mounting offset
        let angle_deg =
            (sample.pitch_rad.to_degrees() as i32).saturating_sub(self.calibration_offset_deg);

        let mut reading = LeanReading {
            angle_deg,
            ..Default::default()
        };
        if angle_deg >= 0 {
            reading.left = true;
            if angle_deg > self.max_left_deg {
                self.max_left_deg = angle_deg;
                reading.new_left_max = true;
            }
        }
        if angle_deg <= 0 {
            reading.right = true;
            if angle_deg.saturating_neg() > self.max_right_deg {
                self.max_right_deg = angle_deg.saturating_neg();
                reading.new_right_max = true;
            }
        }
        reading
    }

    pub fn max_left_deg(&self) -> i32 {
        self.max_left_deg
    }

    pub fn max_right_deg(&self) -> i32 {
        self.max_right_deg
    }

    pub fn reset_maxima(&mut self) {
        self.max_left_deg = 0;
        self.max_right_deg = 0;
    }
}

pub(crate) fn format_left_lean(degrees: i32) -> String {
    format!("°{degrees:02}")
}

pub(crate) fn format_right_lean(degrees: i32) -> String {
    format!("{degrees:02}°")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_deg(pitch_deg: f32) -> OrientationSample {
        OrientationSample::from_pitch(pitch_deg.to_radians())
    }

    #[test]
    fn test_calibration_offset_is_subtracted() {
        let mut tracker = LeanAngleTracker::new(5);
        let reading = tracker.update(&sample_deg(10.2));
        assert_eq!(reading.angle_deg, 5);
        assert!(reading.left);
        assert!(!reading.right);
        assert!(reading.new_left_max);
        assert_eq!(tracker.max_left_deg(), 5);
    }

    #[test]
    fn test_right_lean_tracks_its_own_maximum() {
        let mut tracker = LeanAngleTracker::new(5);
        tracker.update(&sample_deg(30.5));
        let reading = tracker.update(&sample_deg(-20.5));
        assert_eq!(reading.angle_deg, -25);
        assert!(reading.right);
        assert!(reading.new_right_max);
        assert_eq!(tracker.max_right_deg(), 25);
        assert_eq!(tracker.max_left_deg(), 25);
    }

    #[test]
    fn test_maxima_are_monotonic_until_reset() {
        let mut tracker = LeanAngleTracker::new(0);
        tracker.update(&sample_deg(40.5));
        let reading = tracker.update(&sample_deg(12.5));
        assert!(!reading.new_left_max);
        assert_eq!(tracker.max_left_deg(), 40);
        assert_eq!(reading.angle_deg, 12);

        tracker.reset_maxima();
        assert_eq!(tracker.max_left_deg(), 0);
        assert_eq!(tracker.max_right_deg(), 0);
    }

    #[test]
    fn test_zero_lean_counts_for_both_sides() {
        let mut tracker = LeanAngleTracker::new(5);
        let reading = tracker.update(&sample_deg(5.5));
        assert_eq!(reading.angle_deg, 0);
        assert!(reading.left && reading.right);
        assert!(!reading.new_left_max && !reading.new_right_max);
    }

    #[test]
    fn test_extreme_pitch_saturates() {
        let mut tracker = LeanAngleTracker::new(5);
        let reading = tracker.update(&OrientationSample::from_pitch(f32::NEG_INFINITY));
        assert_eq!(reading.angle_deg, i32::MIN);
        assert!(reading.right);
        assert_eq!(tracker.max_right_deg(), i32::MAX);

        let mut tracker = LeanAngleTracker::new(i32::MIN);
        let reading = tracker.update(&OrientationSample::from_pitch(f32::MAX));
        assert_eq!(reading.angle_deg, i32::MAX);
        assert_eq!(tracker.max_left_deg(), i32::MAX);
    }

    #[test]
    fn test_lean_text_formats() {
        assert_eq!(format_left_lean(7), "°07");
        assert_eq!(format_right_lean(42), "42°");
    }
}
