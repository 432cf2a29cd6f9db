use crate::config::Thresholds;
use crate::model::{SensorReading, Severity};

/// Maps a reading to a severity level against a thresholds snapshot.
///
/// The acceleration magnitude is compared strictly-greater against the
/// critical, danger, and warning tiers in that order; a value exactly at a
/// threshold falls to the lower tier. NaN compares false against every
/// threshold and therefore classifies as normal.
pub fn classify(reading: &SensorReading, thresholds: &Thresholds) -> Severity {
    let magnitude = accel_magnitude(reading);

    if magnitude > thresholds.accel_critical {
        Severity::Critical
    } else if magnitude > thresholds.accel_danger {
        Severity::Danger
    } else if magnitude > thresholds.accel_warning {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

/// `sqrt(ax² + ay² + az²)`
fn accel_magnitude(reading: &SensorReading) -> f64 {
    (reading.accel_x.powi(2) + reading.accel_y.powi(2) + reading.accel_z.powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(ax: f64, ay: f64, az: f64) -> SensorReading {
        SensorReading {
            accel_x: ax,
            accel_y: ay,
            accel_z: az,
            gyro_x: 0.0,
            gyro_y: 0.0,
            gyro_z: 0.0,
            mag_x: 0.0,
            mag_y: 0.0,
            mag_z: 0.0,
        }
    }

    fn defaults() -> Thresholds {
        Thresholds::default()
    }

    #[test]
    fn test_normal_at_rest() {
        // Gravity only: magnitude 9.8, below the 10.5 warning tier.
        assert_eq!(classify(&reading(0.0, 0.0, 9.8), &defaults()), Severity::Normal);
    }

    #[test]
    fn test_each_tier() {
        let t = defaults();
        assert_eq!(classify(&reading(11.0, 0.0, 0.0), &t), Severity::Warning);
        assert_eq!(classify(&reading(13.0, 0.0, 0.0), &t), Severity::Danger);
        assert_eq!(classify(&reading(16.0, 0.0, 0.0), &t), Severity::Critical);
    }

    #[test]
    fn test_boundary_falls_to_lower_tier() {
        let t = defaults();
        // Exactly at a threshold is not strictly greater.
        assert_eq!(classify(&reading(t.accel_warning, 0.0, 0.0), &t), Severity::Normal);
        assert_eq!(classify(&reading(t.accel_danger, 0.0, 0.0), &t), Severity::Warning);
        assert_eq!(classify(&reading(t.accel_critical, 0.0, 0.0), &t), Severity::Danger);
    }

    #[test]
    fn test_magnitude_is_vector_norm() {
        // 3-4-12 triangle: magnitude 13 > danger (12.0), <= critical (15.0).
        assert_eq!(classify(&reading(3.0, 4.0, 12.0), &defaults()), Severity::Danger);
    }

    #[test]
    fn test_nan_classifies_as_normal() {
        assert_eq!(
            classify(&reading(f64::NAN, 0.0, 0.0), &defaults()),
            Severity::Normal
        );
    }

    #[test]
    fn test_custom_thresholds() {
        let t = Thresholds {
            accel_warning: 1.0,
            accel_danger: 2.0,
            accel_critical: 3.0,
            ..Thresholds::default()
        };
        assert_eq!(classify(&reading(0.0, 0.0, 2.5), &t), Severity::Danger);
        assert_eq!(classify(&reading(0.0, 0.0, 3.1), &t), Severity::Critical);
    }
}
