//! # Status Updates
//!
//! Merge patches against the `RegistryAuth` status subresource.

use kube::api::{Patch, PatchParams};
use kube::Api;
use tracing::debug;

use crate::constants::FIELD_MANAGER;
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::{RegistryAuth, RegistryAuthStatus};

/// Patch `status` onto the binding. Empty strings are sent so stale values clear.
pub async fn update_status(
    api: &Api<RegistryAuth>,
    name: &str,
    status: &RegistryAuthStatus,
) -> Result<(), ReconcilerError> {
    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
        .await
        .map_err(|source| ReconcilerError::StatusWrite {
            key: name.to_string(),
            source,
        })?;
    debug!(resource.name = name, "Status updated");
    Ok(())
}

/// Reset `tokenExpiration` and `error` before any external call
pub async fn clear_status(api: &Api<RegistryAuth>, name: &str) -> Result<(), ReconcilerError> {
    update_status(api, name, &RegistryAuthStatus::cleared()).await
}
