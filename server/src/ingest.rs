use crate::codec::decode;
use crate::config::ConfigStore;
use crate::db::SensorStore;
use crate::errors::Error;
use crate::metrics::{
    DATAGRAMS_TOTAL, DECODE_FAILURES_TOTAL, INGEST_LATENCY_SECONDS, RECORDS_STORED_TOTAL,
    SEVERITY_TOTAL, STORE_FAILURES_TOTAL,
};
use crate::model::IngestAck;
use crate::severity::classify;
use chrono::Utc;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const MAX_DATAGRAM: usize = 64 * 1024;

/// Datagram ingestion listener.
///
/// Each datagram is decoded, classified against a threshold snapshot,
/// persisted, and acknowledged back to the source address. Datagrams are
/// processed in independent tasks; there is no per-device ordering, no
/// deduplication, and no admission control.
pub async fn run_udp(
    socket: UdpSocket,
    store: SensorStore,
    config: Arc<ConfigStore>,
) -> crate::errors::Result<()> {
    let socket = Arc::new(socket);
    let mut buf = vec![0u8; MAX_DATAGRAM];

    info!("Ingestion listener ready");

    loop {
        let (len, peer) = socket.recv_from(&mut buf).await?;
        DATAGRAMS_TOTAL.inc();
        debug!(%peer, size = len, "datagram received");

        let payload = buf[..len].to_vec();
        let socket = Arc::clone(&socket);
        let store = store.clone();
        let config = Arc::clone(&config);

        tokio::spawn(async move {
            let start = Instant::now();
            let ack = handle_datagram(&payload, &store, &config).await;
            INGEST_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());

            match serde_json::to_vec(&ack) {
                Ok(bytes) => {
                    if let Err(e) = socket.send_to(&bytes, peer).await {
                        warn!(%peer, "failed to send acknowledgement: {}", e);
                    }
                }
                Err(e) => error!("failed to serialize acknowledgement: {}", e),
            }
        });
    }
}

/// Decode -> classify -> persist for one datagram. Never fails outward;
/// every outcome becomes an acknowledgement.
async fn handle_datagram(payload: &[u8], store: &SensorStore, config: &ConfigStore) -> IngestAck {
    let mut record = match decode(payload, Utc::now()) {
        Ok(record) => record,
        Err(e) => {
            DECODE_FAILURES_TOTAL.inc();
            warn!("rejected datagram: {}", e);
            return IngestAck::error("Invalid payload");
        }
    };

    record.severity = classify(&record.data, &config.thresholds());
    SEVERITY_TOTAL
        .with_label_values(&[record.severity.as_str()])
        .inc();

    match store.insert(&record).await {
        Ok(id) => {
            RECORDS_STORED_TOTAL.inc();
            info!(
                device_id = %record.device_id,
                severity = record.severity.as_str(),
                %id,
                "record stored"
            );
            IngestAck::success(record.severity)
        }
        Err(e) => {
            STORE_FAILURES_TOTAL.inc();
            match e {
                Error::Persistence(cause) => {
                    error!(device_id = %record.device_id, "insert failed: {}", cause);
                }
                other => {
                    error!(device_id = %record.device_id, "insert failed: {}", other);
                }
            }
            IngestAck::error("Internal server error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;
    use serde_json::json;

    #[test]
    fn test_success_ack_shape() {
        let ack = IngestAck::success(Severity::Danger);
        let value = serde_json::to_value(&ack).unwrap();
        assert_eq!(
            value,
            json!({
                "status": "success",
                "severity": "danger",
                "message": "Danger - immediate action required"
            })
        );
    }

    #[test]
    fn test_error_ack_omits_severity() {
        let ack = IngestAck::error("Invalid payload");
        let value = serde_json::to_value(&ack).unwrap();
        assert_eq!(
            value,
            json!({ "status": "error", "message": "Invalid payload" })
        );
    }
}
