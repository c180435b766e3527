//! # Provider Modules
//!
//! Adapters for the trust domains a credential passes through.
//!
//! Each cluster-facing or network-facing dependency sits behind a trait so the
//! reconciliation engine can be driven by in-memory fakes:
//! - `ClusterTokenIssuer` for service account tokens (TokenRequest API)
//! - `ConfigDocumentStore` for caller-supplied external-account documents
//! - `PullSecretStore` for writing the pull secret
//! - `RobotTokenExchange` for Quay robot federation
//! - `ExternalAccountExchange` for the Google STS and impersonation chain

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use zeroize::Zeroizing;

pub mod claims;
pub mod error;
pub mod gcp;
pub mod kubernetes;
pub mod quay;

pub use claims::{ClaimError, TokenClaims};
pub use error::{ErrorKind, FederationError};

/// Cluster-issued identity token
pub struct IssuedToken {
    pub token: Zeroizing<String>,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken").finish_non_exhaustive()
    }
}

/// How the pull secret was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretWrite {
    Updated,
    Created,
}

impl SecretWrite {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Updated => "update",
            Self::Created => "create",
        }
    }
}

/// Issues audience-scoped tokens for service accounts
#[async_trait]
pub trait ClusterTokenIssuer: Send + Sync {
    /// Look up the service account, then request a token for it.
    /// A missing account is reported as `FederationError::ServiceAccountNotFound`.
    async fn issue_token(
        &self,
        service_account: &str,
        namespace: &str,
        lifetime_seconds: i64,
        audiences: &[String],
    ) -> Result<IssuedToken, FederationError>;
}

/// Keyed document lookup (ConfigMap data)
#[async_trait]
pub trait ConfigDocumentStore: Send + Sync {
    async fn get_document(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<String, FederationError>;
}

/// Writes pull secrets
#[async_trait]
pub trait PullSecretStore: Send + Sync {
    /// Update the secret in place, creating it when the update fails.
    /// When both fail the create failure is returned.
    async fn upsert(&self, secret: &Secret) -> Result<SecretWrite, FederationError>;
}

/// Exchanges a cluster identity token for a registry robot token
#[async_trait]
pub trait RobotTokenExchange: Send + Sync {
    async fn robot_token(
        &self,
        identity_token: &str,
        robot_account: &str,
        federation_host: &str,
    ) -> Result<Zeroizing<String>, FederationError>;
}

/// Runs an external-account exchange and returns a Google access token
#[async_trait]
pub trait ExternalAccountExchange: Send + Sync {
    async fn exchange(
        &self,
        document: &gcp::ExternalAccountDocument,
    ) -> Result<gcp::GoogleAccessToken, FederationError>;
}

/// HTTP client shared by the federation adapters
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialised
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("registry-auth-controller/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}
