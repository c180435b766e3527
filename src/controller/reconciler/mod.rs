//! # Reconciler
//!
//! Reconciliation of `RegistryAuth` resources.
//!
//! - `engine`: framework-agnostic credential engine returning a tagged outcome
//! - `reconcile`: controller entry point (load, clear status, run engine, write status)
//! - `status`: status subresource patches
//! - `types`: shared context and hard errors

pub mod engine;
pub mod reconcile;
pub mod status;
pub mod types;

pub use engine::{requeue_delay, CredentialEngine, EngineSettings, ReconcileOutcome, Stage};
pub use reconcile::reconcile;
pub use types::{Reconciler, ReconcilerError};
