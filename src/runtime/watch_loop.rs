//! # Watch Loop
//!
//! Runs the `RegistryAuth` controller. Pull secrets are watched as owned
//! objects: a deleted or emptied secret is re-materialized right away, other
//! edits are overwritten at the next scheduled refresh.

use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::Api;
use kube_runtime::controller::{self, Controller};
use kube_runtime::watcher;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::controller::backoff::backoff_key;
use crate::controller::pull_secret::DOCKER_CONFIG_JSON_TYPE;
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::RegistryAuth;
use crate::runtime::error_policy::handle_reconciliation_error;

/// Run until a shutdown signal is received
///
/// # Errors
/// Never fails today; kept fallible for the caller's `?`
pub async fn run_watch_loop(
    bindings: Api<RegistryAuth>,
    secrets: Api<Secret>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    config: &ControllerConfig,
) -> Result<()> {
    info!(
        max_concurrent_reconciliations = config.max_concurrent_reconciliations,
        "Starting controller watch loop..."
    );

    let secret_watch =
        watcher::Config::default().fields(&format!("type={DOCKER_CONFIG_JSON_TYPE}"));

    Controller::new(bindings, watcher::Config::default().any_semantic())
        .owns(secrets, secret_watch)
        .with_config(
            controller::Config::default().concurrency(config.max_concurrent_reconciliations),
        )
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
        .for_each(|result| {
            match result {
                Ok((object, action)) => debug!(object = %object, ?action, "Reconciled"),
                Err(controller::Error::ReconcilerFailed(_, object)) => {
                    // Already logged by the error policy
                    debug!(object = %object, "Reconciler failed");
                }
                Err(controller::Error::ObjectNotFound(object)) => {
                    debug!(object = %object, "Object no longer exists");
                    reconciler.backoff.reset(&backoff_key(
                        object.namespace.as_deref().unwrap_or_default(),
                        &object.name,
                    ));
                }
                Err(e) => warn!(error = %e, "Controller stream error"),
            }
            futures::future::ready(())
        })
        .await;

    server_state.set_ready(false);
    info!("Controller stopped gracefully");
    Ok(())
}
