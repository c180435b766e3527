//! # RegistryAuth Spec
//!
//! Main CRD specification type.

use serde::{Deserialize, Serialize};

use crate::crd::{ContainerRegistry, GoogleArtifactRegistryConfig, QuayConfig};

/// RegistryAuth Custom Resource Definition
///
/// Binds a Kubernetes service account to a container registry through workload
/// identity federation. The controller keeps the named pull secret populated with
/// a short-lived registry credential and renews it before it expires.
///
/// # Example
///
/// ```yaml
/// apiVersion: containerregistry.octopilot.io/v1beta1
/// kind: RegistryAuth
/// metadata:
///   name: quay-pull
///   namespace: apps
/// spec:
///   secretName: quay-pull-secret
///   serviceAccount: builder
///   audiences: ["openshift"]
///   containerRegistry: quay
///   quay:
///     robotAccount: myorg+federated
///     url: quay.io
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "RegistryAuth",
    group = "containerregistry.octopilot.io",
    version = "v1beta1",
    namespaced,
    status = "crate::crd::RegistryAuthStatus",
    shortname = "ra",
    printcolumn = r#"{"name":"Registry", "type":"string", "jsonPath":".spec.containerRegistry"}, {"name":"Secret", "type":"string", "jsonPath":".spec.secretName"}, {"name":"Expires", "type":"string", "jsonPath":".status.tokenExpiration"}, {"name":"Error", "type":"string", "jsonPath":".status.error", "priority": 1}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RegistryAuthSpec {
    /// Name of the `kubernetes.io/dockerconfigjson` Secret to keep populated
    pub secret_name: String,
    /// Service account whose identity is federated to the registry
    pub service_account: String,
    /// Audiences requested on the cluster identity token.
    /// Empty means the API server's default audience.
    #[serde(default)]
    pub audiences: Vec<String>,
    /// Registry type selecting which configuration block is used
    #[serde(default)]
    pub container_registry: ContainerRegistry,
    /// Quay configuration, required when `containerRegistry` is `quay`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quay: Option<QuayConfig>,
    /// Google Artifact Registry configuration, required when `containerRegistry`
    /// is `googleArtifactRegistry`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_artifact_registry: Option<GoogleArtifactRegistryConfig>,
}
