//! # Reconcile
//!
//! Kubernetes glue around the credential engine:
//!
//! 1. Re-read the binding (a binding that no longer exists is a no-op)
//! 2. Skip when a completed reconciliation of this generation already scheduled
//!    the next refresh and the pull secret still holds a credential document
//! 3. Clear `tokenExpiration` and `error`
//! 4. Run the engine
//! 5. Write the final status and requeue at the requested delay

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, ResourceExt};
use kube_runtime::controller::Action;
use tracing::{debug, info, Instrument};

use crate::controller::backoff::backoff_key;
use crate::controller::pull_secret::is_materialized;
use crate::controller::reconciler::engine::ReconcileOutcome;
use crate::controller::reconciler::status::{clear_status, update_status};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::RegistryAuth;
use crate::observability::metrics;

pub async fn reconcile(
    binding: Arc<RegistryAuth>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = binding.name_any();
    let namespace = binding.namespace().unwrap_or_default();
    let span = tracing::info_span!(
        "controller.reconcile",
        resource.name = %name,
        resource.namespace = %namespace,
        registry = %binding.spec.container_registry,
    );

    async move {
        metrics::increment_reconciliations();
        let started = Instant::now();
        let result = reconcile_binding(&name, &namespace, &ctx).await;
        metrics::observe_reconciliation_duration(started.elapsed().as_secs_f64());
        if result.is_ok() {
            ctx.backoff.reset(&backoff_key(&namespace, &name));
        }
        result
    }
    .instrument(span)
    .await
}

async fn reconcile_binding(
    name: &str,
    namespace: &str,
    ctx: &Reconciler,
) -> Result<Action, ReconcilerError> {
    let key = backoff_key(namespace, name);
    let api: Api<RegistryAuth> = Api::namespaced(ctx.client.clone(), namespace);

    // The watch cache can lag behind a deletion
    let Some(binding) = api
        .get_opt(name)
        .await
        .map_err(|source| ReconcilerError::Load {
            key: key.clone(),
            source,
        })?
    else {
        debug!("RegistryAuth no longer exists");
        return Ok(Action::await_change());
    };

    if let Some(remaining) = scheduled_refresh(&binding, ctx, namespace).await? {
        debug!(
            requeue_after_secs = remaining.as_secs(),
            "Refresh already scheduled"
        );
        metrics::increment_requeues_total("scheduled");
        return Ok(Action::requeue(remaining));
    }

    clear_status(&api, name).await?;

    let outcome = ctx.engine.reconcile(&binding).await;
    let status = outcome.to_status(binding.metadata.generation, Utc::now());
    update_status(&api, name, &status).await?;

    let registry = binding.spec.container_registry.as_str();
    let requeue_after = outcome.requeue_after();
    match &outcome {
        ReconcileOutcome::Refreshed { .. } => {
            metrics::increment_reconciliation_outcome(registry, "refreshed");
            metrics::increment_requeues_total("token-expiry");
        }
        ReconcileOutcome::Failed { .. } => {
            metrics::increment_reconciliation_outcome(registry, "failed");
            metrics::increment_requeues_total("fallback");
        }
    }
    info!(
        refreshed = outcome.is_refreshed(),
        next_reconcile = status.next_reconcile_time.as_deref().unwrap_or_default(),
        "Reconciliation complete"
    );

    Ok(Action::requeue(requeue_after))
}

/// Remaining time until an already scheduled refresh, if this event is only
/// the echo of our own status write
async fn scheduled_refresh(
    binding: &RegistryAuth,
    ctx: &Reconciler,
    namespace: &str,
) -> Result<Option<std::time::Duration>, ReconcilerError> {
    let Some(status) = binding.status.as_ref() else {
        return Ok(None);
    };
    let Some(remaining) = status.pending_refresh(binding.metadata.generation, Utc::now()) else {
        return Ok(None);
    };
    if !status.error.is_empty() {
        return Ok(Some(remaining));
    }

    // A deleted or emptied pull secret is re-materialized right away
    let secrets: Api<Secret> = Api::namespaced(ctx.client.clone(), namespace);
    let materialized = secrets
        .get_opt(&binding.spec.secret_name)
        .await
        .map_err(|source| ReconcilerError::SecretLookup {
            key: backoff_key(namespace, &binding.spec.secret_name),
            source,
        })?
        .is_some_and(|secret| is_materialized(&secret));

    Ok(materialized.then_some(remaining))
}
