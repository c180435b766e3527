//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `registry_auth_reconciliations_total` - Total number of reconciliations
//! - `registry_auth_reconciliation_errors_total` - Hard errors handed back to the runtime
//! - `registry_auth_reconciliation_duration_seconds` - Duration of reconciliations
//! - `registry_auth_reconciliation_outcomes_total` - Outcomes by registry and result (refreshed, failed)
//! - `registry_auth_token_exchanges_total` - Token exchanges by registry and result
//! - `registry_auth_token_exchange_duration_seconds` - Duration of token exchanges by registry
//! - `registry_auth_federation_errors_total` - Federation failures by error kind
//! - `registry_auth_pull_secrets_written_total` - Pull secret writes by operation (update, create)
//! - `registry_auth_requeues_total` - Requeues by reason

use anyhow::Result;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "registry_auth_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "registry_auth_reconciliation_errors_total",
        "Total number of reconciliation errors returned to the controller runtime",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "registry_auth_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static RECONCILIATION_OUTCOMES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "registry_auth_reconciliation_outcomes_total",
            "Reconciliation outcomes by registry and result",
        ),
        &["registry", "result"],
    )
    .expect("Failed to create RECONCILIATION_OUTCOMES_TOTAL metric - this should never happen")
});

static TOKEN_EXCHANGES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "registry_auth_token_exchanges_total",
            "Registry token exchanges by registry and result",
        ),
        &["registry", "result"],
    )
    .expect("Failed to create TOKEN_EXCHANGES_TOTAL metric - this should never happen")
});

static TOKEN_EXCHANGE_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "registry_auth_token_exchange_duration_seconds",
            "Duration of registry token exchanges in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["registry"],
    )
    .expect("Failed to create TOKEN_EXCHANGE_DURATION metric - this should never happen")
});

static FEDERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "registry_auth_federation_errors_total",
            "Federation failures by error kind",
        ),
        &["kind"],
    )
    .expect("Failed to create FEDERATION_ERRORS_TOTAL metric - this should never happen")
});

static PULL_SECRETS_WRITTEN_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "registry_auth_pull_secrets_written_total",
            "Pull secrets written by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create PULL_SECRETS_WRITTEN_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("registry_auth_requeues_total", "Requeues by reason"),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_OUTCOMES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TOKEN_EXCHANGES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TOKEN_EXCHANGE_DURATION.clone()))?;
    REGISTRY.register(Box::new(FEDERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PULL_SECRETS_WRITTEN_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_reconciliation_outcome(registry: &str, result: &str) {
    RECONCILIATION_OUTCOMES_TOTAL
        .with_label_values(&[registry, result])
        .inc();
}

/// Record a token exchange and its duration
pub fn record_token_exchange(registry: &str, success: bool, duration: f64) {
    let result = if success { "success" } else { "failure" };
    TOKEN_EXCHANGES_TOTAL
        .with_label_values(&[registry, result])
        .inc();
    TOKEN_EXCHANGE_DURATION
        .with_label_values(&[registry])
        .observe(duration);
}

pub fn increment_federation_errors(kind: &str) {
    FEDERATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_pull_secrets_written(operation: &str) {
    PULL_SECRETS_WRITTEN_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
