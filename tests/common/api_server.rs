//! In-process stand-in for the Kubernetes API server
//!
//! Serves the endpoints the controller calls (RegistryAuth get and status
//! patch, Secret get/replace/create) from an in-memory object map, and records
//! every request so tests can assert on call order.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use k8s_openapi::api::core::v1::Secret;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use registry_auth_controller::crd::RegistryAuth;

const REGISTRY_AUTH: &str =
    "/apis/containerregistry.octopilot.io/v1beta1/namespaces/{namespace}/registryauths/{name}";
const REGISTRY_AUTH_STATUS: &str =
    "/apis/containerregistry.octopilot.io/v1beta1/namespaces/{namespace}/registryauths/{name}/status";
const SECRETS: &str = "/api/v1/namespaces/{namespace}/secrets";
const SECRET: &str = "/api/v1/namespaces/{namespace}/secrets/{name}";

const REGISTRY_AUTHS: &str = "registryauths";
const SECRET_KIND: &str = "secrets";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct ApiState {
    objects: BTreeMap<(&'static str, String, String), Value>,
    requests: Vec<RecordedRequest>,
    secret_update_failure: Option<(StatusCode, String)>,
    secret_create_failure: Option<(StatusCode, String)>,
}

#[derive(Debug, Clone)]
pub struct FakeApiServer {
    addr: SocketAddr,
    state: Arc<Mutex<ApiState>>,
}

impl FakeApiServer {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(ApiState::default()));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake API server");
        let addr = listener.local_addr().expect("Failed to read local address");

        let app = Router::new()
            .route(REGISTRY_AUTH, get(get_registry_auth))
            .route(REGISTRY_AUTH_STATUS, patch(patch_registry_auth_status))
            .route(SECRETS, post(create_secret))
            .route(SECRET, get(get_secret).put(replace_secret))
            .with_state(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Fake API server stopped");
        });

        Self { addr, state }
    }

    pub fn client(&self) -> kube::Client {
        super::init_rustls();
        let uri: Uri = format!("http://{}", self.addr)
            .parse()
            .expect("Invalid fake API server URL");
        kube::Client::try_from(kube::Config::new(uri)).expect("Failed to build kube client")
    }

    pub fn insert_binding(&self, binding: &RegistryAuth) {
        let value = serde_json::to_value(binding).expect("RegistryAuth should serialize");
        self.insert(REGISTRY_AUTHS, &value);
    }

    pub fn insert_secret(&self, secret: &Secret) {
        let mut value = serde_json::to_value(secret).expect("Secret should serialize");
        value["apiVersion"] = json!("v1");
        value["kind"] = json!("Secret");
        self.insert(SECRET_KIND, &value);
    }

    fn insert(&self, resource: &'static str, value: &Value) {
        let namespace = value["metadata"]["namespace"].as_str().unwrap_or_default();
        let name = value["metadata"]["name"].as_str().unwrap_or_default();
        self.state.lock().unwrap().objects.insert(
            (resource, namespace.to_string(), name.to_string()),
            value.clone(),
        );
    }

    pub fn binding_status(&self, namespace: &str, name: &str) -> Option<Value> {
        self.object(REGISTRY_AUTHS, namespace, name)
            .map(|binding| binding["status"].clone())
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.object(SECRET_KIND, namespace, name)
            .map(|value| serde_json::from_value(value).expect("stored Secret should parse"))
    }

    fn object(&self, resource: &'static str, namespace: &str, name: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&(resource, namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// `METHOD path` of every request, in arrival order
    pub fn request_lines(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| format!("{} {}", request.method, request.path))
            .collect()
    }

    pub fn fail_secret_updates(&self, code: StatusCode, message: &str) {
        self.state.lock().unwrap().secret_update_failure = Some((code, message.to_string()));
    }

    pub fn fail_secret_creates(&self, code: StatusCode, message: &str) {
        self.state.lock().unwrap().secret_create_failure = Some((code, message.to_string()));
    }
}

type Shared = State<Arc<Mutex<ApiState>>>;

fn status_response(code: StatusCode, reason: &str, message: &str) -> Response {
    (
        code,
        Json(json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": code.as_u16()
        })),
    )
        .into_response()
}

fn not_found(resource: &str, name: &str) -> Response {
    status_response(
        StatusCode::NOT_FOUND,
        "NotFound",
        &format!("{resource} \"{name}\" not found"),
    )
}

fn record(state: &mut ApiState, method: Method, uri: &Uri, body: Option<Value>) {
    state.requests.push(RecordedRequest {
        method,
        path: uri.path().to_string(),
        body,
    });
}

/// RFC 7386 JSON merge patch
fn merge_patch(target: &mut Value, patch: Value) {
    let Value::Object(patch) = patch else {
        *target = patch;
        return;
    };
    if !target.is_object() {
        *target = json!({});
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(&key);
            } else {
                merge_patch(target.entry(key).or_insert(Value::Null), value);
            }
        }
    }
}

async fn get_registry_auth(
    State(state): Shared,
    Path((namespace, name)): Path<(String, String)>,
    method: Method,
    uri: Uri,
) -> Response {
    let mut state = state.lock().unwrap();
    record(&mut state, method, &uri, None);
    match state.objects.get(&(REGISTRY_AUTHS, namespace, name.clone())) {
        Some(binding) => Json(binding.clone()).into_response(),
        None => not_found("registryauths.containerregistry.octopilot.io", &name),
    }
}

async fn patch_registry_auth_status(
    State(state): Shared,
    Path((namespace, name)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let patch: Value = serde_json::from_slice(&body).expect("status patch should be JSON");
    let mut state = state.lock().unwrap();
    record(&mut state, method, &uri, Some(patch.clone()));
    match state.objects.get_mut(&(REGISTRY_AUTHS, namespace, name.clone())) {
        Some(binding) => {
            merge_patch(binding, patch);
            Json(binding.clone()).into_response()
        }
        None => not_found("registryauths.containerregistry.octopilot.io", &name),
    }
}

async fn get_secret(
    State(state): Shared,
    Path((namespace, name)): Path<(String, String)>,
    method: Method,
    uri: Uri,
) -> Response {
    let mut state = state.lock().unwrap();
    record(&mut state, method, &uri, None);
    match state.objects.get(&(SECRET_KIND, namespace, name.clone())) {
        Some(secret) => Json(secret.clone()).into_response(),
        None => not_found("secrets", &name),
    }
}

async fn replace_secret(
    State(state): Shared,
    Path((namespace, name)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let secret: Value = serde_json::from_slice(&body).expect("secret body should be JSON");
    let mut state = state.lock().unwrap();
    record(&mut state, method, &uri, Some(secret.clone()));
    if let Some((code, message)) = state.secret_update_failure.clone() {
        return status_response(code, "InternalError", &message);
    }
    let key = (SECRET_KIND, namespace, name.clone());
    if !state.objects.contains_key(&key) {
        return not_found("secrets", &name);
    }
    state.objects.insert(key, secret.clone());
    Json(secret).into_response()
}

async fn create_secret(
    State(state): Shared,
    Path(namespace): Path<String>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let secret: Value = serde_json::from_slice(&body).expect("secret body should be JSON");
    let mut state = state.lock().unwrap();
    record(&mut state, method, &uri, Some(secret.clone()));
    if let Some((code, message)) = state.secret_create_failure.clone() {
        return status_response(code, "Forbidden", &message);
    }
    let name = secret["metadata"]["name"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let key = (SECRET_KIND, namespace, name.clone());
    if state.objects.contains_key(&key) {
        return status_response(
            StatusCode::CONFLICT,
            "AlreadyExists",
            &format!("secrets \"{name}\" already exists"),
        );
    }
    state.objects.insert(key, secret.clone());
    (StatusCode::CREATED, Json(secret)).into_response()
}
