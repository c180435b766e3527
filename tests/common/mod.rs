//! Common test utilities
//!
//! rustls setup for tests that open HTTP connections, plus in-memory fakes of
//! the cluster-facing traits so the credential engine runs without a cluster.

#![allow(dead_code, reason = "each test binary uses a different subset")]

pub mod api_server;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use zeroize::Zeroizing;

use registry_auth_controller::controller::pull_secret::{DockerConfigJson, DOCKER_CONFIG_JSON_KEY};
use registry_auth_controller::controller::reconciler::{CredentialEngine, EngineSettings};
use registry_auth_controller::crd::{
    ContainerRegistry, GoogleArtifactRegistryConfig, QuayConfig, RegistryAuth, RegistryAuthSpec,
    WifSourceType,
};
use registry_auth_controller::provider::gcp::{
    ExternalAccountDocument, GoogleAccessToken, TokenStaging, WorkloadIdentityFederation,
};
use registry_auth_controller::provider::{
    ClusterTokenIssuer, ConfigDocumentStore, ExternalAccountExchange, FederationError,
    IssuedToken, PullSecretStore, RobotTokenExchange, SecretWrite,
};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

pub const NAMESPACE: &str = "apps";
pub const SERVICE_ACCOUNT: &str = "builder";
pub const CLUSTER_TOKEN: &str = "cluster.identity.token";

/// Compact token whose payload carries `exp`
pub fn token_with_exp(exp: i64) -> String {
    let payload = serde_json::json!({"exp": exp, "iss": "quay", "sub": "org+robot"});
    format!(
        "eyJhbGciOiJSUzI1NiJ9.{}.c2lnbmF0dXJl",
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

fn binding(name: &str, spec: RegistryAuthSpec) -> RegistryAuth {
    let mut binding = RegistryAuth::new(name, spec);
    binding.metadata = ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        uid: Some(format!("uid-{name}")),
        generation: Some(1),
        ..ObjectMeta::default()
    };
    binding
}

pub fn quay_binding(service_account: &str, url: &str) -> RegistryAuth {
    binding(
        "quay-pull",
        RegistryAuthSpec {
            secret_name: "quay-pull-secret".to_string(),
            service_account: service_account.to_string(),
            audiences: vec!["openshift".to_string()],
            container_registry: ContainerRegistry::Quay,
            quay: Some(QuayConfig {
                robot_account: "org+robot".to_string(),
                url: url.to_string(),
            }),
            google_artifact_registry: None,
        },
    )
}

pub fn gar_config(source_type: WifSourceType) -> GoogleArtifactRegistryConfig {
    GoogleArtifactRegistryConfig {
        source_type,
        registry_location: "us-central1".to_string(),
        object_name: "wif-config".to_string(),
        file_name: "credentials_config.json".to_string(),
        google_service_account: "puller@project.iam.gserviceaccount.com".to_string(),
        google_pool_project: "123456".to_string(),
        google_pool_name: "cluster-pool".to_string(),
        google_provider_name: "cluster".to_string(),
    }
}

pub fn gar_binding(config: GoogleArtifactRegistryConfig) -> RegistryAuth {
    binding(
        "gar-pull",
        RegistryAuthSpec {
            secret_name: "gar-pull-secret".to_string(),
            service_account: SERVICE_ACCOUNT.to_string(),
            audiences: vec!["openshift".to_string()],
            container_registry: ContainerRegistry::GoogleArtifactRegistry,
            quay: None,
            google_artifact_registry: Some(config),
        },
    )
}

/// Issuer that knows a fixed set of service accounts
#[derive(Debug, Default)]
pub struct FakeTokenIssuer {
    accounts: HashSet<String>,
    pub calls: Mutex<Vec<(String, String, i64, Vec<String>)>>,
}

impl FakeTokenIssuer {
    pub fn with_accounts(accounts: &[&str]) -> Self {
        Self {
            accounts: accounts.iter().map(ToString::to_string).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ClusterTokenIssuer for FakeTokenIssuer {
    async fn issue_token(
        &self,
        service_account: &str,
        namespace: &str,
        lifetime_seconds: i64,
        audiences: &[String],
    ) -> Result<IssuedToken, FederationError> {
        self.calls.lock().unwrap().push((
            service_account.to_string(),
            namespace.to_string(),
            lifetime_seconds,
            audiences.to_vec(),
        ));
        if !self.accounts.contains(service_account) {
            return Err(FederationError::ServiceAccountNotFound(
                service_account.to_string(),
            ));
        }
        Ok(IssuedToken {
            token: Zeroizing::new(CLUSTER_TOKEN.to_string()),
        })
    }
}

/// ConfigMaps keyed by `(namespace, name)`
#[derive(Debug, Default)]
pub struct FakeDocumentStore {
    config_maps: HashMap<(String, String), BTreeMap<String, String>>,
}

impl FakeDocumentStore {
    pub fn with_document(name: &str, key: &str, document: &str) -> Self {
        let mut config_maps = HashMap::new();
        config_maps.insert(
            (NAMESPACE.to_string(), name.to_string()),
            BTreeMap::from([(key.to_string(), document.to_string())]),
        );
        Self { config_maps }
    }
}

#[async_trait]
impl ConfigDocumentStore for FakeDocumentStore {
    async fn get_document(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<String, FederationError> {
        let data = self
            .config_maps
            .get(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| FederationError::ConfigMapNotFound(name.to_string()))?;
        data.get(key)
            .cloned()
            .ok_or_else(|| FederationError::ConfigMapKeyNotFound(key.to_string()))
    }
}

/// Secret store with update-else-create semantics
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    pub secrets: Mutex<BTreeMap<(String, String), Secret>>,
    pub fail_writes: bool,
}

impl InMemorySecretStore {
    pub fn failing() -> Self {
        Self {
            secrets: Mutex::new(BTreeMap::new()),
            fail_writes: true,
        }
    }

    pub fn get(&self, name: &str) -> Option<Secret> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(NAMESPACE.to_string(), name.to_string()))
            .cloned()
    }

    /// Raw `.dockerconfigjson` bytes of a stored secret
    pub fn document_bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.get(name)?
            .data?
            .get(DOCKER_CONFIG_JSON_KEY)
            .map(|bytes| bytes.0.clone())
    }

    pub fn document(&self, name: &str) -> Option<DockerConfigJson> {
        serde_json::from_slice(&self.document_bytes(name)?).ok()
    }
}

#[async_trait]
impl PullSecretStore for InMemorySecretStore {
    async fn upsert(&self, secret: &Secret) -> Result<SecretWrite, FederationError> {
        let key = (
            secret.metadata.namespace.clone().unwrap_or_default(),
            secret.metadata.name.clone().unwrap_or_default(),
        );
        if self.fail_writes {
            return Err(FederationError::Persistence(format!(
                "secrets \"{}\" is forbidden: create denied",
                key.1
            )));
        }
        let mut secrets = self.secrets.lock().unwrap();
        match secrets.insert(key, secret.clone()) {
            Some(_) => Ok(SecretWrite::Updated),
            None => Ok(SecretWrite::Created),
        }
    }
}

/// Quay exchange answering with a fixed token or status line
#[derive(Debug)]
pub struct FakeRobotExchange {
    response: Result<String, String>,
    pub calls: AtomicUsize,
}

impl FakeRobotExchange {
    pub fn returning(token: &str) -> Self {
        Self {
            response: Ok(token.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(status_line: &str) -> Self {
        Self {
            response: Err(status_line.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RobotTokenExchange for FakeRobotExchange {
    async fn robot_token(
        &self,
        identity_token: &str,
        _robot_account: &str,
        _federation_host: &str,
    ) -> Result<Zeroizing<String>, FederationError> {
        assert_eq!(identity_token, CLUSTER_TOKEN);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .map(Zeroizing::new)
            .map_err(FederationError::UpstreamStatus)
    }
}

/// Google exchange that records what it was handed
#[derive(Debug)]
pub struct FakeExternalExchange {
    response: Result<(String, DateTime<Utc>), String>,
    pub seen_documents: Mutex<Vec<ExternalAccountDocument>>,
    pub seen_subject_tokens: Mutex<Vec<String>>,
}

impl FakeExternalExchange {
    pub fn returning(access_token: &str, expires_at: DateTime<Utc>) -> Self {
        Self {
            response: Ok((access_token.to_string(), expires_at)),
            seen_documents: Mutex::new(Vec::new()),
            seen_subject_tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(status_line: &str) -> Self {
        Self {
            response: Err(status_line.to_string()),
            seen_documents: Mutex::new(Vec::new()),
            seen_subject_tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn last_document(&self) -> Option<ExternalAccountDocument> {
        self.seen_documents.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ExternalAccountExchange for FakeExternalExchange {
    async fn exchange(
        &self,
        document: &ExternalAccountDocument,
    ) -> Result<GoogleAccessToken, FederationError> {
        let subject = std::fs::read_to_string(&document.credential_source.file)
            .expect("staged token file should exist during the exchange");
        self.seen_subject_tokens.lock().unwrap().push(subject);
        self.seen_documents.lock().unwrap().push(document.clone());

        match &self.response {
            Ok((token, expires_at)) => Ok(GoogleAccessToken {
                access_token: Zeroizing::new(token.clone()),
                expires_at: *expires_at,
            }),
            Err(status) => Err(FederationError::ExchangeRejected {
                endpoint: "sts token exchange",
                status: status.clone(),
                body: String::new(),
            }),
        }
    }
}

pub fn settings() -> EngineSettings {
    EngineSettings {
        cluster_token_lifetime_secs: 3600,
        fallback_requeue: Duration::from_secs(36_000 - 60),
        expiry_margin: Duration::from_secs(60),
    }
}

/// Fakes wired into an engine
pub struct Harness {
    pub issuer: Arc<FakeTokenIssuer>,
    pub quay: Arc<dyn RobotTokenExchange>,
    pub exchange: Arc<dyn ExternalAccountExchange>,
    pub documents: Arc<FakeDocumentStore>,
    pub secrets: Arc<InMemorySecretStore>,
    pub token_directory: PathBuf,
}

impl Harness {
    pub fn new(token_directory: &Path) -> Self {
        Self {
            issuer: Arc::new(FakeTokenIssuer::with_accounts(&[SERVICE_ACCOUNT])),
            quay: Arc::new(FakeRobotExchange::returning(&token_with_exp(
                Utc::now().timestamp() + 3600,
            ))),
            exchange: Arc::new(FakeExternalExchange::rejecting("500 Internal Server Error")),
            documents: Arc::new(FakeDocumentStore::default()),
            secrets: Arc::new(InMemorySecretStore::default()),
            token_directory: token_directory.to_path_buf(),
        }
    }

    pub fn engine(&self) -> CredentialEngine {
        self.engine_with_secrets(Arc::clone(&self.secrets) as Arc<dyn PullSecretStore>)
    }

    /// Engine writing pull secrets through `secrets` instead of the in-memory store
    pub fn engine_with_secrets(&self, secrets: Arc<dyn PullSecretStore>) -> CredentialEngine {
        let wif = WorkloadIdentityFederation::new(
            Arc::clone(&self.issuer) as Arc<dyn ClusterTokenIssuer>,
            Arc::clone(&self.documents) as Arc<dyn ConfigDocumentStore>,
            Arc::clone(&self.exchange),
            TokenStaging {
                directory: self.token_directory.clone(),
                remove_after_exchange: true,
                cluster_token_lifetime_secs: 3600,
            },
        );
        CredentialEngine::new(
            Arc::clone(&self.issuer) as Arc<dyn ClusterTokenIssuer>,
            Arc::clone(&self.quay),
            wif,
            secrets,
            settings(),
        )
    }

    /// Files left behind in the token directory
    pub fn staged_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.token_directory)
            .map(|entries| entries.filter_map(Result::ok).map(|e| e.path()).collect())
            .unwrap_or_default()
    }
}
