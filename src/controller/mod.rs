//! # Controller
//!
//! - `backoff`: Fibonacci backoff for hard reconciliation errors
//! - `pull_secret`: `kubernetes.io/dockerconfigjson` rendering
//! - `reconciler`: Credential engine and the Kubernetes glue around it
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod pull_secret;
pub mod reconciler;
pub mod server;
