//! # Types
//!
//! Shared reconciler context and the errors handed back to the controller runtime.

use kube::Client;
use thiserror::Error;

use crate::controller::backoff::BackoffTracker;
use crate::controller::reconciler::engine::CredentialEngine;

/// Hard errors: retried by the runtime with per-binding Fibonacci backoff.
/// Federation failures are never reported this way.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to load RegistryAuth {key}: {source}")]
    Load {
        key: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to write status of RegistryAuth {key}: {source}")]
    StatusWrite {
        key: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to look up pull secret {key}: {source}")]
    SecretLookup {
        key: String,
        #[source]
        source: kube::Error,
    },
}

/// Context shared by every reconciliation
pub struct Reconciler {
    pub client: Client,
    pub engine: CredentialEngine,
    pub backoff: BackoffTracker,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(client: Client, engine: CredentialEngine, backoff: BackoffTracker) -> Self {
        Self {
            client,
            engine,
            backoff,
        }
    }
}
