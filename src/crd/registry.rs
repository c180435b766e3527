//! # Registry Configuration
//!
//! Per-registry configuration blocks referenced from the `RegistryAuth` spec.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Container registry type
///
/// Both configuration blocks may be present on a binding; this field selects one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ContainerRegistry {
    /// Quay robot account federation
    #[default]
    Quay,
    /// Google Artifact Registry via workload identity federation
    GoogleArtifactRegistry,
}

impl ContainerRegistry {
    /// Label used in logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quay => "quay",
            Self::GoogleArtifactRegistry => "googleArtifactRegistry",
        }
    }
}

impl fmt::Display for ContainerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quay configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuayConfig {
    /// Robot account configured for federation (e.g. `myorg+robot`)
    pub robot_account: String,
    /// Quay host, also used as the registry key in the pull secret
    #[serde(default = "default_quay_url")]
    pub url: String,
}

/// Default value for the Quay host
pub fn default_quay_url() -> String {
    "quay.io".to_string()
}

/// Where the workload identity federation document comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum WifSourceType {
    /// Read a caller-supplied external-account document from a ConfigMap
    ConfigMap,
    /// Build the document from the fields on this resource
    #[default]
    Inline,
}

/// Google Artifact Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoogleArtifactRegistryConfig {
    /// Source of the external-account document
    #[serde(rename = "type", default)]
    pub source_type: WifSourceType,
    /// Registry location (e.g. `us-central1`), the pull secret host becomes
    /// `<registryLocation>-docker.pkg.dev`
    pub registry_location: String,
    /// ConfigMap name, required when `type` is `configMap`
    #[serde(default)]
    pub object_name: String,
    /// ConfigMap key holding the document, required when `type` is `configMap`
    #[serde(default)]
    pub file_name: String,
    /// Google service account to impersonate
    #[serde(default)]
    pub google_service_account: String,
    /// Project number hosting the workload identity pool
    #[serde(default)]
    pub google_pool_project: String,
    /// Workload identity pool name
    #[serde(default)]
    pub google_pool_name: String,
    /// Workload identity pool provider name
    #[serde(default)]
    pub google_provider_name: String,
}

impl GoogleArtifactRegistryConfig {
    /// Docker registry host for this location
    pub fn registry_host(&self) -> String {
        format!(
            "{}{}",
            self.registry_location,
            crate::constants::GOOGLE_DOCKER_REGISTRY_SUFFIX
        )
    }
}
