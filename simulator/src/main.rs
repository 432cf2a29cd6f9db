mod payload;

use chrono::Utc;
use payload::{IngestAck, WirePayload};
use rand::Rng;
use std::env;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{error, info, warn};

const ACK_TIMEOUT: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() {
    let target = env::var("TARGET").unwrap_or_else(|_| "127.0.0.1:5683".to_string());
    let rate: u64 = env::var("RATE")
        .unwrap_or_else(|_| "10".to_string())
        .parse()
        .unwrap_or(10);
    let num_devices: usize = env::var("DEVICES")
        .unwrap_or_else(|_| "5".to_string())
        .parse()
        .unwrap_or(5);

    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Starting sensor simulator");
    info!("Target: {}, Rate: {} msg/s, Devices: {}", target, rate, num_devices);

    let socket = match UdpSocket::bind("0.0.0.0:0").await {
        Ok(socket) => socket,
        Err(e) => {
            error!("Failed to bind UDP socket: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = socket.connect(&target).await {
        error!("Failed to set target {}: {}", target, e);
        std::process::exit(1);
    }

    let send_interval = Duration::from_millis(1000 / rate.max(1));
    let mut counter = 0u64;
    let mut acked = 0u64;
    let mut rejected = 0u64;
    let mut timeouts = 0u64;
    let mut buf = [0u8; 2048];

    loop {
        let device_id = format!("ESP{:03}", counter % num_devices as u64);
        let payload = generate_payload(&mut rand::thread_rng(), device_id);

        let bytes = match serde_json::to_vec(&payload) {
            Ok(b) => b,
            Err(e) => {
                error!("Failed to serialize payload: {}", e);
                continue;
            }
        };

        if let Err(e) = socket.send(&bytes).await {
            warn!("Failed to send datagram: {}", e);
            tokio::time::sleep(send_interval).await;
            continue;
        }
        counter += 1;

        match timeout(ACK_TIMEOUT, socket.recv(&mut buf)).await {
            Ok(Ok(len)) => match serde_json::from_slice::<IngestAck>(&buf[..len]) {
                Ok(ack) if ack.status == "success" => {
                    acked += 1;
                    if let Some(severity) = &ack.severity {
                        if severity != "normal" {
                            info!(device_id = %payload.id, severity = %severity, "alert acknowledged");
                        }
                    }
                }
                Ok(_) => {
                    rejected += 1;
                    warn!(device_id = %payload.id, "payload rejected");
                }
                Err(e) => warn!("Unreadable acknowledgement: {}", e),
            },
            Ok(Err(e)) => warn!("Receive error: {}", e),
            Err(_) => {
                timeouts += 1;
            }
        }

        if counter % 100 == 0 {
            info!(
                "Sent {} datagrams ({} acked, {} rejected, {} timeouts)",
                counter, acked, rejected, timeouts
            );
        }

        tokio::time::sleep(send_interval).await;
    }
}

/// Mostly at-rest readings around 1 g, with occasional acceleration spikes
/// that land in the warning/danger/critical bands of the default
/// thresholds (10.5 / 12.0 / 15.0 m/s²).
fn generate_payload(rng: &mut impl Rng, device_id: String) -> WirePayload {
    let spike = rng.gen_bool(0.1);
    let magnitude: f64 = if spike {
        rng.gen_range(10.6..20.0)
    } else {
        rng.gen_range(9.5..10.2)
    };

    // Mostly-vertical orientation with some lateral jitter.
    let ax = rng.gen_range(-1.5..1.5);
    let ay = rng.gen_range(-1.5..1.5);
    let az = (magnitude.powi(2) - ax * ax - ay * ay).max(0.0).sqrt();

    // A GPS fix always carries both coordinates.
    let (lat, lon) = if rng.gen_bool(0.3) {
        (
            Some(rng.gen_range(20.5..21.5)),
            Some(rng.gen_range(105.0..106.0)),
        )
    } else {
        (None, None)
    };

    WirePayload {
        id: device_id,
        // Half the fleet reports its own clock, the rest rely on receipt time.
        ts: rng.gen_bool(0.5).then(|| Utc::now().timestamp_millis()),
        ax,
        ay,
        az,
        gx: rng.gen_range(-0.5..0.5),
        gy: rng.gen_range(-0.5..0.5),
        gz: rng.gen_range(-0.5..0.5),
        mx: rng.gen_range(-60.0..60.0),
        my: rng.gen_range(-60.0..60.0),
        mz: rng.gen_range(-60.0..60.0),
        lat,
        lon,
    }
}
