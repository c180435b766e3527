//! # Registry Auth Controller
//!
//! Kubernetes controller that keeps `kubernetes.io/dockerconfigjson` pull
//! secrets populated with short-lived registry credentials obtained through
//! workload identity federation:
//!
//! - **Quay**: a service account token is exchanged for a robot token at
//!   `/oauth2/federation/robot/token`
//! - **Google Artifact Registry**: a service account token is exchanged at
//!   Google STS and used to impersonate a Google service account
//!
//! Each `RegistryAuth` is renewed one minute before its credential expires.

use anyhow::Result;
use k8s_openapi::api::core::v1::Secret;
use kube::Api;
use registry_auth_controller::runtime::{initialization::initialize, watch_loop::run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    let secrets: Api<Secret> = Api::all(init.client.clone());

    run_watch_loop(
        init.bindings,
        secrets,
        init.reconciler,
        init.server_state,
        &init.config,
    )
    .await
}
