use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Encoder, Histogram, IntCounter,
    IntGauge, TextEncoder,
};

// --- Ingestion ---

pub static TRANSACTIONS_INGESTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "txstats_transactions_ingested_total",
        "Total transactions accepted and persisted"
    )
    .expect("transactions_ingested counter")
});

pub static DUPLICATES_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "txstats_duplicate_transactions_total",
        "Total submissions rejected because the transaction id already exists"
    )
    .expect("duplicates_rejected counter")
});

pub static TRANSACTIONS_PURGED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "txstats_transactions_purged_total",
        "Total transactions removed by delete-all"
    )
    .expect("transactions_purged counter")
});

// --- Recompute ---

pub static RECOMPUTES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "txstats_recomputes_total",
        "Total completed summary recomputes"
    )
    .expect("recomputes counter")
});

pub static RECOMPUTE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "txstats_recompute_failures_total",
        "Total recompute attempts that failed"
    )
    .expect("recompute_failures counter")
});

pub static DEAD_LETTERED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "txstats_recompute_dead_lettered_total",
        "Total recompute jobs dropped after exhausting redelivery"
    )
    .expect("dead_lettered counter")
});

pub static RECOMPUTE_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "txstats_recompute_latency_seconds",
        "Time to read all transactions, compute and persist the summary",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("recompute_latency histogram")
});

pub static SUMMARY_TOTAL: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "txstats_summary_total_transactions",
        "total_transactions of the last committed summary"
    )
    .expect("summary_total gauge")
});

pub fn inc_ingested() {
    TRANSACTIONS_INGESTED.inc();
}

pub fn inc_duplicates() {
    DUPLICATES_REJECTED.inc();
}

pub fn inc_purged(count: u64) {
    TRANSACTIONS_PURGED.inc_by(count);
}

pub fn inc_recomputes() {
    RECOMPUTES.inc();
}

pub fn inc_recompute_failures() {
    RECOMPUTE_FAILURES.inc();
}

pub fn inc_dead_lettered() {
    DEAD_LETTERED.inc();
}

pub fn observe_recompute_latency(duration_sec: f64) {
    RECOMPUTE_LATENCY.observe(duration_sec);
}

pub fn set_summary_total(count: i64) {
    SUMMARY_TOTAL.set(count);
}

/// Renders the default registry in the Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
