// Prometheus metrics for the notification gate
//
// Exposed on the /metrics HTTP endpoint:
// - Admitted notifications per category (counter)
// - Rejected notifications per category and reason (counter)
// - Counter store round-trip latency (histogram)

use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Category label recorded for categories missing from the quota table
pub const UNKNOWN_CATEGORY_LABEL: &str = "unknown";

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref NOTIFICATIONS_ADMITTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("notifications_admitted_total", "Notifications admitted for delivery"),
        &["category"]
    ).expect("Failed to create admitted notifications metric");

    pub static ref NOTIFICATIONS_REJECTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("notifications_rejected_total", "Notifications rejected by the gate"),
        &["category", "reason"]
    ).expect("Failed to create rejected notifications metric");

    pub static ref COUNTER_STORE_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("counter_store_duration_seconds", "Duration of check-and-increment calls"),
    ).expect("Failed to create counter store duration metric");
}

/// Register all metrics - safe to call more than once
pub fn init() -> prometheus::Result<()> {
    register(Box::new(NOTIFICATIONS_ADMITTED_TOTAL.clone()))?;
    register(Box::new(NOTIFICATIONS_REJECTED_TOTAL.clone()))?;
    register(Box::new(COUNTER_STORE_DURATION_SECONDS.clone()))?;
    Ok(())
}

fn register(collector: Box<dyn prometheus::core::Collector>) -> prometheus::Result<()> {
    match REGISTRY.register(collector) {
        Err(prometheus::Error::AlreadyReg) => Ok(()),
        other => other,
    }
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

/// Record an admitted notification
pub fn record_admitted(category: &str) {
    NOTIFICATIONS_ADMITTED_TOTAL
        .with_label_values(&[category])
        .inc();
}

/// Record a rejected notification
///
/// `category` must be a configured category or [`UNKNOWN_CATEGORY_LABEL`].
pub fn record_rejected(category: &str, reason: &str) {
    NOTIFICATIONS_REJECTED_TOTAL
        .with_label_values(&[category, reason])
        .inc();
}
