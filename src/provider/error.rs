//! # Federation Errors
//!
//! Errors raised by the identity and registry adapters. The engine renders every
//! one of them into `status.error`; none of them terminates the controller.

use thiserror::Error;

use crate::provider::claims::ClaimError;

/// Coarse classification used for logging and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Service account, ConfigMap or ConfigMap key absent
    NotFound,
    /// Non-2xx response or a response without a usable token
    UpstreamRejection,
    /// Token returned by an exchange could not be decoded
    MalformedCredential,
    /// Token directory or token file I/O
    LocalResource,
    /// Pull secret could be neither updated nor created
    Persistence,
    /// Network or API transport failure
    Transport,
}

impl ErrorKind {
    /// Label used in metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::UpstreamRejection => "upstream_rejection",
            Self::MalformedCredential => "malformed_credential",
            Self::LocalResource => "local_resource",
            Self::Persistence => "persistence",
            Self::Transport => "transport",
        }
    }
}

#[derive(Debug, Error)]
pub enum FederationError {
    #[error("service account '{0}' not found")]
    ServiceAccountNotFound(String),

    #[error("unable to create kubernetes token: {0}")]
    TokenIssuance(String),

    #[error("configMap '{0}' not found")]
    ConfigMapNotFound(String),

    #[error("configMap key '{0}' not found")]
    ConfigMapKeyNotFound(String),

    #[error("unable to read configMap '{name}': {message}")]
    ConfigMapLookup { name: String, message: String },

    /// Registry federation endpoint answered with anything but 200.
    /// The status line is the whole message.
    #[error("{0}")]
    UpstreamStatus(String),

    #[error("{endpoint} returned {status}: {body}")]
    ExchangeRejected {
        endpoint: &'static str,
        status: String,
        body: String,
    },

    #[error("response does not contain a string '{0}' field")]
    MissingField(&'static str),

    #[error("invalid response body: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error("invalid external account document: {0}")]
    InvalidDocument(String),

    #[error("token file {path}: {source}")]
    TokenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Persistence(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FederationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ServiceAccountNotFound(_)
            | Self::ConfigMapNotFound(_)
            | Self::ConfigMapKeyNotFound(_) => ErrorKind::NotFound,
            Self::UpstreamStatus(_)
            | Self::ExchangeRejected { .. }
            | Self::MissingField(_)
            | Self::InvalidResponse(_) => ErrorKind::UpstreamRejection,
            Self::Claim(_) | Self::InvalidDocument(_) => ErrorKind::MalformedCredential,
            Self::TokenFile { .. } => ErrorKind::LocalResource,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::TokenIssuance(_) | Self::ConfigMapLookup { .. } | Self::Transport(_) => {
                ErrorKind::Transport
            }
        }
    }
}
