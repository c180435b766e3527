//! # Quay Robot Federation
//!
//! Exchanges a cluster identity token for a Quay robot token.
//!
//! Quay validates the identity token against the robot account's federation
//! configuration (issuer and subject) and returns a short-lived robot token:
//!
//! ```text
//! GET http://<host>/oauth2/federation/robot/token
//! Authorization: Basic base64(<robot account>:<identity token>)
//!
//! 200 {"token": "<robot token>", ...}
//! ```

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;
use zeroize::Zeroizing;

use crate::constants::QUAY_FEDERATION_PATH;
use crate::provider::{FederationError, RobotTokenExchange};

/// Quay federation client
#[derive(Clone)]
pub struct QuayFederation {
    http: reqwest::Client,
}

impl std::fmt::Debug for QuayFederation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuayFederation").finish_non_exhaustive()
    }
}

impl QuayFederation {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn federation_url(host: &str) -> String {
        format!("http://{host}{QUAY_FEDERATION_PATH}")
    }
}

#[async_trait]
impl RobotTokenExchange for QuayFederation {
    async fn robot_token(
        &self,
        identity_token: &str,
        robot_account: &str,
        federation_host: &str,
    ) -> Result<Zeroizing<String>, FederationError> {
        let url = Self::federation_url(federation_host);
        debug!(robot_account = robot_account, url = %url, "Requesting Quay robot token");

        let response = self
            .http
            .get(&url)
            .basic_auth(robot_account, Some(identity_token))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(FederationError::UpstreamStatus(
                response.status().to_string(),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FederationError::InvalidResponse(e.to_string()))?;

        body.get("token")
            .and_then(Value::as_str)
            .map(|token| Zeroizing::new(token.to_string()))
            .ok_or(FederationError::MissingField("token"))
    }
}
