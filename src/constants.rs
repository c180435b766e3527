//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable (see [`crate::config::ControllerConfig`]).

/// Default HTTP server port for metrics and health checks
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Lifetime requested for cluster-issued identity tokens (seconds)
pub const DEFAULT_CLUSTER_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Requeue interval used when a reconciliation could not produce a credential (seconds).
/// The safety margin is subtracted from it before scheduling.
pub const DEFAULT_FALLBACK_REQUEUE_SECS: u64 = 36_000;

/// Safety margin subtracted from every requeue so renewal lands before expiry (seconds)
pub const DEFAULT_EXPIRY_MARGIN_SECS: u64 = 60;

/// Timeout applied to every outbound federation HTTP call (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Directory holding ephemeral cluster tokens for the Google exchange
pub const DEFAULT_TOKEN_DIRECTORY: &str = "/tmp/tokens";

/// Default maximum concurrent reconciliations across bindings
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Fibonacci backoff bounds for hard reconciliation errors (minutes)
pub const DEFAULT_BACKOFF_MIN_MINUTES: u64 = 1;
pub const DEFAULT_BACKOFF_MAX_MINUTES: u64 = 10;

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "registry-auth-controller";

/// Quay robot federation endpoint path
pub const QUAY_FEDERATION_PATH: &str = "/oauth2/federation/robot/token";

/// Google STS token exchange endpoint
pub const GOOGLE_STS_TOKEN_URL: &str = "https://sts.googleapis.com/v1/token";

/// Google IAM credentials endpoint prefix for service account impersonation
pub const GOOGLE_IAM_CREDENTIALS_URL: &str =
    "https://iamcredentials.googleapis.com/v1/projects/-/serviceAccounts";

/// OAuth scope requested for Artifact Registry access
pub const GOOGLE_CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Username Artifact Registry expects alongside an OAuth2 access token
pub const GOOGLE_ACCESS_TOKEN_USERNAME: &str = "oauth2accesstoken";

/// Hostname suffix of Artifact Registry docker endpoints
pub const GOOGLE_DOCKER_REGISTRY_SUFFIX: &str = "-docker.pkg.dev";
