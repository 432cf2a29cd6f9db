use axum::{routing::get, Router};
use server::auth::AuthGate;
use server::config::ConfigStore;
use server::{db, ingest, metrics, rest};
use std::env;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let mongodb_uri =
        env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let mongodb_db = env::var("MONGODB_DB").unwrap_or_else(|_| "landslide_monitor".to_string());
    let udp_addr = env::var("UDP_ADDR").unwrap_or_else(|_| "0.0.0.0:5683".to_string());
    let http_addr = env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Starting landslide telemetry backend");
    info!("UDP ingestion: {}", udp_addr);
    info!("HTTP API: {}", http_addr);
    info!("Database: {}", mongodb_db);

    // Initialize metrics
    metrics::init_metrics();

    // Connect to MongoDB and establish index access paths
    let store = match db::connect(&mongodb_uri, &mongodb_db).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to connect to MongoDB: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = store.ensure_indexes().await {
        error!("Failed to create indexes: {}", e);
        std::process::exit(1);
    }

    // Shared state, constructor-injected into both listeners
    let config = Arc::new(ConfigStore::new());
    let auth = Arc::new(AuthGate::new());

    // Ingestion listener (UDP)
    let udp_socket = match tokio::net::UdpSocket::bind(&udp_addr).await {
        Ok(socket) => socket,
        Err(e) => {
            error!("Failed to bind UDP socket on {}: {}", udp_addr, e);
            std::process::exit(1);
        }
    };
    let ingest_store = store.clone();
    let ingest_config = Arc::clone(&config);
    let ingest_handle = tokio::spawn(async move {
        if let Err(e) = ingest::run_udp(udp_socket, ingest_store, ingest_config).await {
            error!("Ingestion listener failed: {}", e);
        }
    });

    // HTTP API with metrics endpoint
    let state = rest::AppState {
        store,
        config,
        auth,
    };
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(state));

    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {}: {}", http_addr, e);
            std::process::exit(1);
        });

    info!("HTTP server listening on {}", http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    tokio::select! {
        _ = ingest_handle => {
            error!("Ingestion task terminated");
        }
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
