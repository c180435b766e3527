//! Registry Auth Controller Library
//!
//! Federates Kubernetes workload identity into short-lived container registry
//! pull secrets. A `RegistryAuth` resource names a service account, a target
//! Secret and a registry (Quay robot federation or Google Artifact Registry via
//! workload identity federation); the controller keeps the Secret populated and
//! renews the credential shortly before it expires.
//!
//! ## Quick Start
//!
//! ```rust
//! use registry_auth_controller::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
