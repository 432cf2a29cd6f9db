use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Nine-axis sensor sample (accelerometer, gyroscope, magnetometer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
    #[serde(default)]
    pub mag_x: f64,
    #[serde(default)]
    pub mag_y: f64,
    #[serde(default)]
    pub mag_z: f64,
}

/// GPS fix; either both coordinates are known or the record carries none.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

/// Ordinal severity derived from the acceleration magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Danger,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
            Severity::Critical => "critical",
        }
    }

    /// Human-readable text sent back in ingestion acknowledgements.
    pub fn description(&self) -> &'static str {
        match self {
            Severity::Normal => "Normal - no hazard detected",
            Severity::Warning => "Warning - monitoring required",
            Severity::Danger => "Danger - immediate action required",
            Severity::Critical => "Critical - evacuate immediately",
        }
    }
}

/// Canonical telemetry record as persisted in the `sensor_data` collection.
///
/// Severity is assigned by the classifier at ingestion time and never
/// re-scored afterwards; records are immutable except via bulk delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
    pub data: SensorReading,
    pub severity: Severity,
    pub location: Option<Location>,
}

/// Compact wire payload emitted by field nodes.
///
/// Unknown fields (e.g. a node-computed `tilt` angle) are accepted and
/// ignored; classification uses the raw acceleration vector.
#[derive(Debug, Clone, Deserialize)]
pub struct WirePayload {
    pub id: String,
    pub ts: Option<i64>,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub gx: f64,
    pub gy: f64,
    pub gz: f64,
    #[serde(default)]
    pub mx: f64,
    #[serde(default)]
    pub my: f64,
    #[serde(default)]
    pub mz: f64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Acknowledgement sent back to the datagram source.
#[derive(Debug, Serialize)]
pub struct IngestAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub message: String,
}

impl IngestAck {
    pub fn success(severity: Severity) -> Self {
        Self {
            status: "success",
            severity: Some(severity),
            message: severity.description().to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            severity: None,
            message: message.into(),
        }
    }
}
