//! # Error Policy
//!
//! Hard reconciliation errors (binding load, status write, secret lookup) are
//! retried with per-binding Fibonacci backoff.

use std::sync::Arc;

use kube::ResourceExt;
use kube_runtime::controller::Action;
use tracing::{error, info};

use crate::controller::backoff::backoff_key;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::RegistryAuth;
use crate::observability::metrics;

pub fn handle_reconciliation_error(
    binding: Arc<RegistryAuth>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = binding.name_any();
    let namespace = binding.namespace().unwrap_or_default();
    let _span = tracing::error_span!(
        "controller.reconciliation_error",
        resource.name = %name,
        resource.namespace = %namespace,
    )
    .entered();

    error!(error = %error, "Reconciliation error");
    metrics::increment_reconciliation_errors();

    let (delay, error_count) = ctx.backoff.record_failure(&backoff_key(&namespace, &name));
    info!(
        retry_in_secs = delay.as_secs(),
        error_count = error_count,
        "Retrying with Fibonacci backoff"
    );

    metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}
