//! # Configuration
//!
//! Controller-level settings. Everything is read once from the environment at
//! startup; the deployment populates the environment from a ConfigMap via `envFrom`.

mod controller;

pub use controller::{ControllerConfig, LogFormat};
