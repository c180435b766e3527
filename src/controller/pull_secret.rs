//! # Pull Secret
//!
//! Renders a registry credential into the `dockerconfigjson` document and the
//! desired-state Secret. Every renewal replaces the whole document.
//!
//! ```json
//! {"auths": {"<host>": {"auth": "base64(<username>:<token>)"}}}
//! ```

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use serde::{Deserialize, Serialize};

pub const DOCKER_CONFIG_JSON_TYPE: &str = "kubernetes.io/dockerconfigjson";
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerConfigJson {
    pub auths: BTreeMap<String, DockerAuth>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerAuth {
    pub auth: String,
}

impl DockerConfigJson {
    /// Single-registry document for `username:token` at `host`
    pub fn new(username: &str, token: &str, host: &str) -> Self {
        let auth = STANDARD.encode(format!("{username}:{token}"));
        Self {
            auths: BTreeMap::from([(host.to_string(), DockerAuth { auth })]),
        }
    }

    /// Decoded `username:token` for `host`
    pub fn credentials(&self, host: &str) -> Option<String> {
        let auth = self.auths.get(host)?;
        let bytes = STANDARD.decode(&auth.auth).ok()?;
        String::from_utf8(bytes).ok()
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Desired-state pull secret, owned by the binding
pub fn pull_secret_object(
    name: &str,
    namespace: &str,
    document: &DockerConfigJson,
    owner_references: Vec<OwnerReference>,
) -> Result<Secret, serde_json::Error> {
    let data = BTreeMap::from([(
        DOCKER_CONFIG_JSON_KEY.to_string(),
        ByteString(document.to_vec()?),
    )]);

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            owner_references: (!owner_references.is_empty()).then_some(owner_references),
            ..ObjectMeta::default()
        },
        type_: Some(DOCKER_CONFIG_JSON_TYPE.to_string()),
        data: Some(data),
        ..Secret::default()
    })
}

/// Whether `secret` still carries a usable `dockerconfigjson` credential
pub fn is_materialized(secret: &Secret) -> bool {
    if secret.type_.as_deref() != Some(DOCKER_CONFIG_JSON_TYPE) {
        return false;
    }
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(DOCKER_CONFIG_JSON_KEY))
        .and_then(|bytes| serde_json::from_slice::<DockerConfigJson>(&bytes.0).ok())
        .is_some_and(|document| !document.auths.is_empty())
}
