//! # Prelude
//!
//! Commonly used types and traits, importable with
//! `use registry_auth_controller::prelude::*;`.

pub use crate::crd::*;

pub use crate::provider::{
    ClusterTokenIssuer, ConfigDocumentStore, ExternalAccountExchange, FederationError,
    PullSecretStore, RobotTokenExchange, SecretWrite,
};

pub use crate::controller::pull_secret::DockerConfigJson;
pub use crate::controller::reconciler::{
    reconcile, CredentialEngine, EngineSettings, ReconcileOutcome, Reconciler, ReconcilerError,
};

pub use crate::config::ControllerConfig;
