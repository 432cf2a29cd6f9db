use crate::errors::{Error, Result};
use crate::model::{Location, SensorReading, Severity, TelemetryRecord, WirePayload};
use chrono::{DateTime, Utc};

/// Decodes a compact wire payload into a canonical telemetry record.
///
/// Pure transform: `received_at` is used only when the payload carries no
/// `ts` field. The returned record is `Severity::Normal` until the
/// classifier stamps it.
pub fn decode(payload: &[u8], received_at: DateTime<Utc>) -> Result<TelemetryRecord> {
    let wire: WirePayload = serde_json::from_slice(payload)
        .map_err(|e| Error::Decode(format!("malformed payload: {}", e)))?;

    if wire.id.is_empty() {
        return Err(Error::Decode("device id must not be empty".to_string()));
    }

    let timestamp = match wire.ts {
        Some(ms) => DateTime::<Utc>::from_timestamp_millis(ms)
            .ok_or_else(|| Error::Decode(format!("timestamp {} out of range", ms)))?,
        None => received_at,
    };

    // A lone coordinate is rejected rather than silently dropped; a sensor
    // that sends half a fix is misbehaving.
    let location = match (wire.lat, wire.lon) {
        (Some(lat), Some(lon)) => Some(Location { lat, lon }),
        (None, None) => None,
        _ => {
            return Err(Error::Decode(
                "location requires both lat and lon".to_string(),
            ))
        }
    };

    Ok(TelemetryRecord {
        id: None,
        device_id: wire.id,
        timestamp,
        data: SensorReading {
            accel_x: wire.ax,
            accel_y: wire.ay,
            accel_z: wire.az,
            gyro_x: wire.gx,
            gyro_y: wire.gy,
            gyro_z: wire.gz,
            mag_x: wire.mx,
            mag_y: wire.my,
            mag_z: wire.mz,
        },
        severity: Severity::Normal,
        location,
    })
}
