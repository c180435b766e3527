//! # Custom Resource Definitions
//!
//! CRD types for the Registry Auth Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `RegistryAuth` specification and default values
//! - `registry.rs` - Per-registry configuration blocks (Quay, Google Artifact Registry)
//! - `status.rs` - Status reported after every reconciliation

mod registry;
mod spec;
mod status;

pub use registry::{ContainerRegistry, GoogleArtifactRegistryConfig, QuayConfig, WifSourceType};
pub use spec::{RegistryAuth, RegistryAuthSpec};
pub use status::RegistryAuthStatus;
