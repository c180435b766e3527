//! # Initialization
//!
//! Controller startup: rustls provider, tracing, metrics, health server,
//! Kubernetes client and the credential engine wiring.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{ControllerConfig, LogFormat};
use crate::controller::backoff::BackoffTracker;
use crate::controller::reconciler::{CredentialEngine, EngineSettings, Reconciler};
use crate::controller::server::{start_server, ServerState};
use crate::crd::RegistryAuth;
use crate::observability;
use crate::provider::gcp::{StsClient, TokenStaging, WorkloadIdentityFederation};
use crate::provider::kubernetes::{KubeConfigMapStore, KubeSecretStore, KubeTokenIssuer};
use crate::provider::quay::QuayFederation;
use crate::provider::{http_client, ClusterTokenIssuer};

const DEFAULT_LOG_FILTER: &str = "registry_auth_controller=info";

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub bindings: Api<RegistryAuth>,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    pub config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// # Errors
/// Fails when the health server cannot start, the cluster is unreachable or the
/// `RegistryAuth` CRD is not installed
pub async fn initialize() -> Result<InitializationResult> {
    // Required before any TLS connection is made
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_provider| anyhow!("Failed to install rustls crypto provider"))?;

    let config = ControllerConfig::from_env();
    init_tracing(config.log_format);

    info!("Starting Registry Auth Controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(?config, "Controller configuration loaded");

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let server_handle = {
        let state = Arc::clone(&server_state);
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state).await {
                error!("HTTP server error: {:#}", e);
            }
        })
    };
    wait_for_server_ready(&server_state, &server_handle, &config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let bindings: Api<RegistryAuth> = Api::all(client.clone());
    bindings
        .list(&ListParams::default().limit(1))
        .await
        .context("RegistryAuth CRD is not queryable; is it installed?")?;

    let reconciler = Arc::new(build_reconciler(client.clone(), &config)?);

    info!("Controller initialized, starting watch loop...");
    Ok(InitializationResult {
        client,
        bindings,
        reconciler,
        server_state,
        config,
    })
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Wire the adapters into a reconciler
///
/// # Errors
/// Fails when the federation HTTP client cannot be built
pub fn build_reconciler(client: Client, config: &ControllerConfig) -> Result<Reconciler> {
    let http = http_client(config.http_timeout_duration())?;
    let issuer: Arc<dyn ClusterTokenIssuer> = Arc::new(KubeTokenIssuer::new(client.clone()));

    let wif = WorkloadIdentityFederation::new(
        Arc::clone(&issuer),
        Arc::new(KubeConfigMapStore::new(client.clone())),
        Arc::new(StsClient::new(http.clone())),
        TokenStaging {
            directory: config.token_directory.clone(),
            remove_after_exchange: config.remove_token_file,
            cluster_token_lifetime_secs: config.cluster_token_lifetime_secs,
        },
    );

    let engine = CredentialEngine::new(
        issuer,
        Arc::new(QuayFederation::new(http)),
        wif,
        Arc::new(KubeSecretStore::new(client.clone())),
        EngineSettings::from(config),
    );

    Ok(Reconciler::new(
        client,
        engine,
        BackoffTracker::new(config.backoff_min_minutes, config.backoff_max_minutes),
    ))
}

async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.server_startup_timeout_secs);
    let poll_interval = Duration::from_millis(config.server_poll_interval_ms);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow!("HTTP server failed to start"));
        }
        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start_time.elapsed() > startup_timeout {
            return Err(anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}
