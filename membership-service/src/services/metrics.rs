//! Prometheus metrics for membership-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Webhook callback counter by reference kind and outcome.
pub static WEBHOOK_CALLBACKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "membership_webhook_callbacks_total",
        "Total number of gateway webhook callbacks processed",
        &["kind", "outcome"]
    )
    .expect("Failed to register webhook_callbacks_total")
});

/// Token credit counter by secours plan.
pub static TOKENS_CREDITED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "membership_tokens_credited_total",
        "Total number of secours tokens credited",
        &["plan"]
    )
    .expect("Failed to register tokens_credited_total")
});

/// Subscription activation counter by tier.
pub static SUBSCRIPTIONS_ACTIVATED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "membership_subscriptions_activated_total",
        "Total number of subscriptions activated",
        &["plan"]
    )
    .expect("Failed to register subscriptions_activated_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "membership_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "membership_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&WEBHOOK_CALLBACKS_TOTAL);
    Lazy::force(&TOKENS_CREDITED_TOTAL);
    Lazy::force(&SUBSCRIPTIONS_ACTIVATED_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
