//! # Google Workload Identity Federation
//!
//! Produces an Artifact Registry access token for a Kubernetes service account:
//!
//! 1. Build the external-account document (merging a ConfigMap document when
//!    the source type is `configMap`)
//! 2. Issue a cluster identity token and stage it in the token directory
//! 3. Point `credential_source.file` at the staged token and run the exchange
//! 4. Remove the staged token

mod external_account;
mod sts;
mod token_file;

pub use external_account::{
    CredentialFormat, CredentialSource, ExternalAccountDocument, ImpersonationOptions,
};
pub use sts::StsClient;
pub use token_file::TokenFile;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use zeroize::Zeroizing;

use crate::crd::{GoogleArtifactRegistryConfig, WifSourceType};
use crate::provider::{
    ClusterTokenIssuer, ConfigDocumentStore, ExternalAccountExchange, FederationError,
};

/// Access token returned by the Google exchange
pub struct GoogleAccessToken {
    pub access_token: Zeroizing<String>,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for GoogleAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleAccessToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Token staging settings
#[derive(Debug, Clone)]
pub struct TokenStaging {
    pub directory: PathBuf,
    pub remove_after_exchange: bool,
    pub cluster_token_lifetime_secs: i64,
}

/// Workload identity federation adapter
#[derive(Clone)]
pub struct WorkloadIdentityFederation {
    issuer: Arc<dyn ClusterTokenIssuer>,
    documents: Arc<dyn ConfigDocumentStore>,
    exchange: Arc<dyn ExternalAccountExchange>,
    staging: TokenStaging,
}

impl std::fmt::Debug for WorkloadIdentityFederation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkloadIdentityFederation")
            .field("staging", &self.staging)
            .finish_non_exhaustive()
    }
}

impl WorkloadIdentityFederation {
    pub fn new(
        issuer: Arc<dyn ClusterTokenIssuer>,
        documents: Arc<dyn ConfigDocumentStore>,
        exchange: Arc<dyn ExternalAccountExchange>,
        staging: TokenStaging,
    ) -> Self {
        Self {
            issuer,
            documents,
            exchange,
            staging,
        }
    }

    /// Run the federation chain for one binding
    pub async fn access_token(
        &self,
        namespace: &str,
        service_account: &str,
        audiences: &[String],
        config: &GoogleArtifactRegistryConfig,
    ) -> Result<GoogleAccessToken, FederationError> {
        let mut document = ExternalAccountDocument::for_registry(config);
        if config.source_type == WifSourceType::ConfigMap {
            let raw = self
                .documents
                .get_document(namespace, &config.object_name, &config.file_name)
                .await?;
            document = document.merged_with(&raw)?;
            debug!(
                config_map = %config.object_name,
                key = %config.file_name,
                "Merged external account document"
            );
        }

        let issued = self
            .issuer
            .issue_token(
                service_account,
                namespace,
                self.staging.cluster_token_lifetime_secs,
                audiences,
            )
            .await?;

        let token_file = TokenFile::write(
            &self.staging.directory,
            namespace,
            service_account,
            &issued.token,
            self.staging.remove_after_exchange,
        )
        .await?;
        let document = document.with_credential_file(token_file.path());

        let result = self.exchange.exchange(&document).await;
        drop(token_file);
        result
    }
}
