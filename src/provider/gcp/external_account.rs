//! # External Account Document
//!
//! The `external_account` credential configuration understood by Google's
//! workload identity federation. A default document is derived from the
//! binding; a caller-supplied document is merged over it key by key.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{GOOGLE_IAM_CREDENTIALS_URL, GOOGLE_STS_TOKEN_URL};
use crate::crd::GoogleArtifactRegistryConfig;
use crate::provider::FederationError;

pub const EXTERNAL_ACCOUNT_TYPE: &str = "external_account";
pub const JWT_SUBJECT_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:jwt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAccountDocument {
    #[serde(rename = "type")]
    pub account_type: String,
    pub audience: String,
    pub subject_token_type: String,
    pub token_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_impersonation_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_impersonation: Option<ImpersonationOptions>,
    pub credential_source: CredentialSource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpersonationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_lifetime_seconds: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSource {
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub format: CredentialFormat,
}

/// How the subject token is stored in the credential source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialFormat {
    /// `text` or `json`
    #[serde(rename = "type", default = "default_format_type")]
    pub format_type: String,
    /// Field holding the token when `type` is `json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_token_field_name: Option<String>,
}

impl Default for CredentialFormat {
    fn default() -> Self {
        Self {
            format_type: default_format_type(),
            subject_token_field_name: None,
        }
    }
}

fn default_format_type() -> String {
    "text".to_string()
}

impl ExternalAccountDocument {
    /// Document built from the binding's pool and service account fields
    pub fn for_registry(config: &GoogleArtifactRegistryConfig) -> Self {
        Self {
            account_type: EXTERNAL_ACCOUNT_TYPE.to_string(),
            audience: format!(
                "//iam.googleapis.com/projects/{}/locations/global/workloadIdentityPools/{}/providers/{}",
                config.google_pool_project, config.google_pool_name, config.google_provider_name
            ),
            subject_token_type: JWT_SUBJECT_TOKEN_TYPE.to_string(),
            token_url: GOOGLE_STS_TOKEN_URL.to_string(),
            service_account_impersonation_url: format!(
                "{GOOGLE_IAM_CREDENTIALS_URL}/{}:generateAccessToken",
                config.google_service_account
            ),
            service_account_impersonation: None,
            credential_source: CredentialSource::default(),
        }
    }

    /// Overlay a caller-supplied JSON document on top of this one.
    /// Keys present in `raw` replace defaults; nested objects merge recursively.
    pub fn merged_with(self, raw: &str) -> Result<Self, FederationError> {
        let overlay: Value = serde_json::from_str(raw)
            .map_err(|e| FederationError::InvalidDocument(e.to_string()))?;
        if !overlay.is_object() {
            return Err(FederationError::InvalidDocument(
                "expected a JSON object".to_string(),
            ));
        }

        let mut base = serde_json::to_value(&self)
            .map_err(|e| FederationError::InvalidDocument(e.to_string()))?;
        merge_json(&mut base, overlay);
        serde_json::from_value(base).map_err(|e| FederationError::InvalidDocument(e.to_string()))
    }

    /// Point the credential source at the staged token file
    pub fn with_credential_file(mut self, path: &std::path::Path) -> Self {
        self.credential_source.file = path.display().to_string();
        self
    }
}

fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_json(existing, value);
                    }
                    _ => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
