//! # Kubernetes Adapters
//!
//! Cluster-facing implementations of the provider traits.

use async_trait::async_trait;
use k8s_openapi::api::authentication::v1::{TokenRequest, TokenRequestSpec};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, ServiceAccount};
use kube::api::PostParams;
use kube::{Api, Client};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::provider::{
    ClusterTokenIssuer, ConfigDocumentStore, FederationError, IssuedToken, PullSecretStore,
    SecretWrite,
};

/// Issues tokens through the `serviceaccounts/token` subresource
#[derive(Clone)]
pub struct KubeTokenIssuer {
    client: Client,
}

impl std::fmt::Debug for KubeTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeTokenIssuer").finish_non_exhaustive()
    }
}

impl KubeTokenIssuer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterTokenIssuer for KubeTokenIssuer {
    async fn issue_token(
        &self,
        service_account: &str,
        namespace: &str,
        lifetime_seconds: i64,
        audiences: &[String],
    ) -> Result<IssuedToken, FederationError> {
        let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);

        // TokenRequest alone does not report a missing account cleanly
        match api.get_opt(service_account).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(FederationError::ServiceAccountNotFound(
                    service_account.to_string(),
                ))
            }
            Err(e) => return Err(FederationError::TokenIssuance(e.to_string())),
        }

        let request = TokenRequest {
            spec: TokenRequestSpec {
                audiences: audiences.to_vec(),
                expiration_seconds: Some(lifetime_seconds),
                ..Default::default()
            },
            ..Default::default()
        };

        let response = api
            .create_token_request(service_account, &PostParams::default(), &request)
            .await
            .map_err(|e| FederationError::TokenIssuance(e.to_string()))?;

        let token = response
            .status
            .map(|status| status.token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                FederationError::TokenIssuance("token request returned no token".to_string())
            })?;

        debug!(
            service_account = service_account,
            namespace = namespace,
            "Issued cluster identity token"
        );
        Ok(IssuedToken {
            token: Zeroizing::new(token),
        })
    }
}

/// Reads external-account documents from ConfigMaps
#[derive(Clone)]
pub struct KubeConfigMapStore {
    client: Client,
}

impl std::fmt::Debug for KubeConfigMapStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeConfigMapStore").finish_non_exhaustive()
    }
}

impl KubeConfigMapStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConfigDocumentStore for KubeConfigMapStore {
    async fn get_document(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<String, FederationError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_map = api
            .get_opt(name)
            .await
            .map_err(|e| FederationError::ConfigMapLookup {
                name: name.to_string(),
                message: e.to_string(),
            })?
            .ok_or_else(|| FederationError::ConfigMapNotFound(name.to_string()))?;

        config_map
            .data
            .and_then(|mut data| data.remove(key))
            .ok_or_else(|| FederationError::ConfigMapKeyNotFound(key.to_string()))
    }
}

/// Writes pull secrets with update-else-create
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PullSecretStore for KubeSecretStore {
    async fn upsert(&self, secret: &Secret) -> Result<SecretWrite, FederationError> {
        let namespace = secret.metadata.namespace.as_deref().unwrap_or_default();
        let name = secret.metadata.name.as_deref().unwrap_or_default();
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);

        match api.replace(name, &PostParams::default(), secret).await {
            Ok(_) => Ok(SecretWrite::Updated),
            Err(update_error) => {
                debug!(
                    secret = name,
                    namespace = namespace,
                    error = %update_error,
                    "Pull secret update failed, creating"
                );
                api.create(&PostParams::default(), secret)
                    .await
                    .map(|_| SecretWrite::Created)
                    .map_err(|e| {
                        warn!(secret = name, namespace = namespace, error = %e, "Pull secret create failed");
                        FederationError::Persistence(e.to_string())
                    })
            }
        }
    }
}
