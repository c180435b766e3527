//! # Credential Engine
//!
//! Turns one `RegistryAuth` into a refreshed pull secret, or into a failure
//! message for status. Every federation or persistence failure is caught here
//! and becomes `ReconcileOutcome::Failed`; nothing in this module talks to the
//! `RegistryAuth` API itself.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use kube::{Resource, ResourceExt};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::constants::GOOGLE_ACCESS_TOKEN_USERNAME;
use crate::controller::pull_secret::{pull_secret_object, DockerConfigJson};
use crate::crd::{ContainerRegistry, RegistryAuth, RegistryAuthStatus, WifSourceType};
use crate::observability::metrics;
use crate::provider::gcp::WorkloadIdentityFederation;
use crate::provider::{
    ClusterTokenIssuer, FederationError, PullSecretStore, RobotTokenExchange, TokenClaims,
};

/// Where a reconciliation failed; the prefix of `status.error`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    KubernetesToken,
    QuayToken,
    QuayTokenExpiration,
    GcpWifToken,
    ImagePullSecret,
    InvalidConfiguration,
}

impl Stage {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::KubernetesToken => "Unable to Generate Kubernetes Token",
            Self::QuayToken => "Unable to Generate Quay Token",
            Self::QuayTokenExpiration => "Unable to Generate Quay Token Expiration",
            Self::GcpWifToken => "Unable to Generate GCP WIF Token",
            Self::ImagePullSecret => "Unable to Create Image Pull Secret",
            Self::InvalidConfiguration => "Invalid Registry Configuration",
        }
    }
}

#[derive(Debug)]
struct StageError {
    stage: Stage,
    detail: String,
}

impl StageError {
    fn at(stage: Stage) -> impl FnOnce(FederationError) -> Self {
        move |error| {
            metrics::increment_federation_errors(error.kind().as_str());
            Self {
                stage,
                detail: error.to_string(),
            }
        }
    }

    fn invalid(detail: impl Into<String>) -> Self {
        Self {
            stage: Stage::InvalidConfiguration,
            detail: detail.into(),
        }
    }

    fn message(&self) -> String {
        format!("{}: {}", self.stage.prefix(), self.detail)
    }
}

/// Result of one engine run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Pull secret written with a fresh credential
    Refreshed {
        token_expiration: String,
        expires_at: DateTime<Utc>,
        requeue_after: Duration,
    },
    /// Credential left untouched; `message` goes to `status.error`
    Failed {
        message: String,
        requeue_after: Duration,
    },
}

impl ReconcileOutcome {
    pub fn requeue_after(&self) -> Duration {
        match self {
            Self::Refreshed { requeue_after, .. } | Self::Failed { requeue_after, .. } => {
                *requeue_after
            }
        }
    }

    pub fn is_refreshed(&self) -> bool {
        matches!(self, Self::Refreshed { .. })
    }

    /// Final status for a binding at `generation`, reconciled at `now`
    pub fn to_status(&self, generation: Option<i64>, now: DateTime<Utc>) -> RegistryAuthStatus {
        let (token_expiration, error) = match self {
            Self::Refreshed {
                token_expiration, ..
            } => (token_expiration.clone(), String::new()),
            Self::Failed { message, .. } => (String::new(), message.clone()),
        };
        let next = chrono::Duration::from_std(self.requeue_after())
            .ok()
            .and_then(|delay| now.checked_add_signed(delay));

        RegistryAuthStatus {
            token_expiration,
            error,
            last_reconcile_time: Some(now.to_rfc3339()),
            next_reconcile_time: next.map(|at| at.to_rfc3339()),
            observed_generation: generation,
        }
    }
}

/// Delay until `margin` before `expires_at`, never negative
pub fn requeue_delay(expires_at: DateTime<Utc>, now: DateTime<Utc>, margin: Duration) -> Duration {
    (expires_at - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .saturating_sub(margin)
}

/// Engine timing settings
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub cluster_token_lifetime_secs: i64,
    pub fallback_requeue: Duration,
    pub expiry_margin: Duration,
}

impl From<&crate::config::ControllerConfig> for EngineSettings {
    fn from(config: &crate::config::ControllerConfig) -> Self {
        Self {
            cluster_token_lifetime_secs: config.cluster_token_lifetime_secs,
            fallback_requeue: config.fallback_requeue_duration(),
            expiry_margin: config.expiry_margin_duration(),
        }
    }
}

struct Credential {
    document: DockerConfigJson,
    token_expiration: String,
    expires_at: DateTime<Utc>,
}

/// Credential federation reconciliation engine
#[derive(Clone)]
pub struct CredentialEngine {
    issuer: Arc<dyn ClusterTokenIssuer>,
    quay: Arc<dyn RobotTokenExchange>,
    wif: WorkloadIdentityFederation,
    secrets: Arc<dyn PullSecretStore>,
    settings: EngineSettings,
}

impl std::fmt::Debug for CredentialEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CredentialEngine {
    pub fn new(
        issuer: Arc<dyn ClusterTokenIssuer>,
        quay: Arc<dyn RobotTokenExchange>,
        wif: WorkloadIdentityFederation,
        secrets: Arc<dyn PullSecretStore>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            issuer,
            quay,
            wif,
            secrets,
            settings,
        }
    }

    /// Reconcile one binding. Never fails: failures are part of the outcome.
    pub async fn reconcile(&self, binding: &RegistryAuth) -> ReconcileOutcome {
        let registry = binding.spec.container_registry;
        match self.refresh(binding).await {
            Ok(expiry) => {
                let requeue_after =
                    requeue_delay(expiry.1, Utc::now(), self.settings.expiry_margin);
                info!(
                    registry = %registry,
                    token_expiration = %expiry.0,
                    requeue_after_secs = requeue_after.as_secs(),
                    "Pull secret refreshed"
                );
                ReconcileOutcome::Refreshed {
                    token_expiration: expiry.0,
                    expires_at: expiry.1,
                    requeue_after,
                }
            }
            Err(error) => {
                let message = error.message();
                warn!(registry = %registry, error = %message, "Credential refresh failed");
                ReconcileOutcome::Failed {
                    message,
                    requeue_after: self.settings.fallback_requeue,
                }
            }
        }
    }

    async fn refresh(&self, binding: &RegistryAuth) -> Result<(String, DateTime<Utc>), StageError> {
        let namespace = binding
            .namespace()
            .ok_or_else(|| StageError::invalid("RegistryAuth has no namespace"))?;

        let credential = match binding.spec.container_registry {
            ContainerRegistry::Quay => self.quay_credential(binding, &namespace).await?,
            ContainerRegistry::GoogleArtifactRegistry => {
                self.google_credential(binding, &namespace).await?
            }
        };

        let owner_references = binding.controller_owner_ref(&()).into_iter().collect();
        let secret = pull_secret_object(
            &binding.spec.secret_name,
            &namespace,
            &credential.document,
            owner_references,
        )
        .map_err(|e| StageError {
            stage: Stage::ImagePullSecret,
            detail: e.to_string(),
        })?;

        let write = self
            .secrets
            .upsert(&secret)
            .await
            .map_err(StageError::at(Stage::ImagePullSecret))?;
        metrics::increment_pull_secrets_written(write.as_str());
        debug!(
            secret = %binding.spec.secret_name,
            operation = write.as_str(),
            "Pull secret written"
        );

        Ok((credential.token_expiration, credential.expires_at))
    }

    async fn quay_credential(
        &self,
        binding: &RegistryAuth,
        namespace: &str,
    ) -> Result<Credential, StageError> {
        let quay = binding.spec.quay.as_ref().ok_or_else(|| {
            StageError::invalid("containerRegistry is quay but spec.quay is not set")
        })?;
        if quay.robot_account.is_empty() {
            return Err(StageError::invalid("spec.quay.robotAccount is empty"));
        }

        let identity = self
            .issuer
            .issue_token(
                &binding.spec.service_account,
                namespace,
                self.settings.cluster_token_lifetime_secs,
                &binding.spec.audiences,
            )
            .await
            .map_err(StageError::at(Stage::KubernetesToken))?;

        let started = Instant::now();
        let exchanged = self
            .quay
            .robot_token(&identity.token, &quay.robot_account, &quay.url)
            .await;
        metrics::record_token_exchange(
            ContainerRegistry::Quay.as_str(),
            exchanged.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        let robot_token: Zeroizing<String> =
            exchanged.map_err(StageError::at(Stage::QuayToken))?;

        let expires_at = TokenClaims::decode(&robot_token)
            .and_then(|claims| claims.expires_at())
            .map_err(|e| StageError::at(Stage::QuayTokenExpiration)(e.into()))?;

        Ok(Credential {
            document: DockerConfigJson::new(&quay.robot_account, &robot_token, &quay.url),
            token_expiration: expires_at.to_string(),
            expires_at,
        })
    }

    async fn google_credential(
        &self,
        binding: &RegistryAuth,
        namespace: &str,
    ) -> Result<Credential, StageError> {
        let gar = binding.spec.google_artifact_registry.as_ref().ok_or_else(|| {
            StageError::invalid(
                "containerRegistry is googleArtifactRegistry but spec.googleArtifactRegistry is not set",
            )
        })?;
        if gar.registry_location.is_empty() {
            return Err(StageError::invalid(
                "spec.googleArtifactRegistry.registryLocation is empty",
            ));
        }
        if gar.source_type == WifSourceType::ConfigMap
            && (gar.object_name.is_empty() || gar.file_name.is_empty())
        {
            return Err(StageError::invalid(
                "objectName and fileName are required when type is configMap",
            ));
        }

        let started = Instant::now();
        let exchanged = self
            .wif
            .access_token(
                namespace,
                &binding.spec.service_account,
                &binding.spec.audiences,
                gar,
            )
            .await;
        metrics::record_token_exchange(
            ContainerRegistry::GoogleArtifactRegistry.as_str(),
            exchanged.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        let token = exchanged.map_err(StageError::at(Stage::GcpWifToken))?;

        Ok(Credential {
            document: DockerConfigJson::new(
                GOOGLE_ACCESS_TOKEN_USERNAME,
                &token.access_token,
                &gar.registry_host(),
            ),
            token_expiration: token.expires_at.with_timezone(&Local).to_string(),
            expires_at: token.expires_at,
        })
    }
}
