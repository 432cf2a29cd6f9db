use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref DATAGRAMS_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "telemetry_datagrams_total",
        "Total datagrams received on the ingestion socket"
    ))
    .unwrap();
    pub static ref DECODE_FAILURES_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "telemetry_decode_failures_total",
        "Total datagrams rejected by the payload codec"
    ))
    .unwrap();
    pub static ref RECORDS_STORED_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "telemetry_records_stored_total",
        "Total records durably persisted"
    ))
    .unwrap();
    pub static ref STORE_FAILURES_TOTAL: IntCounter = IntCounter::with_opts(Opts::new(
        "telemetry_store_failures_total",
        "Total persistence failures on ingest"
    ))
    .unwrap();
    pub static ref SEVERITY_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "telemetry_severity_total",
            "Classified records by severity level"
        ),
        &["level"]
    )
    .unwrap();
    pub static ref INGEST_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "telemetry_ingest_latency_seconds",
            "Time from datagram receipt to acknowledgement"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .unwrap();
}

pub fn init_metrics() {
    REGISTRY
        .register(Box::new(DATAGRAMS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(DECODE_FAILURES_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(RECORDS_STORED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(STORE_FAILURES_TOTAL.clone()))
        .unwrap();
    REGISTRY.register(Box::new(SEVERITY_TOTAL.clone())).unwrap();
    REGISTRY
        .register(Box::new(INGEST_LATENCY_SECONDS.clone()))
        .unwrap();
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
