use serde::{Deserialize, Serialize};

/// Compact wire payload as emitted by a field node.
#[derive(Debug, Clone, Serialize)]
pub struct WirePayload {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub gx: f64,
    pub gy: f64,
    pub gz: f64,
    pub mx: f64,
    pub my: f64,
    pub mz: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

/// Acknowledgement returned by the ingestion listener.
#[derive(Debug, Deserialize)]
pub struct IngestAck {
    pub status: String,
    pub severity: Option<String>,
    #[allow(dead_code)]
    pub message: String,
}
