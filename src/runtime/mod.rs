//! # Runtime
//!
//! - `initialization`: rustls, tracing, metrics, HTTP server and client setup
//! - `watch_loop`: the `RegistryAuth` controller
//! - `error_policy`: backoff for hard reconciliation errors

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
