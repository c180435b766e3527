//! # Google STS Client
//!
//! Drives an external-account document to an access token:
//!
//! 1. Read the subject token from `credential_source.file`
//! 2. RFC 8693 token exchange at `token_url`
//! 3. `generateAccessToken` at `service_account_impersonation_url` (when set),
//!    authenticated with the STS token
//!
//! References:
//! - [STS token exchange](https://cloud.google.com/iam/docs/reference/sts/rest/v1/TopLevel/token)
//! - [generateAccessToken](https://cloud.google.com/iam/docs/reference/credentials/rest/v1/projects.serviceAccounts/generateAccessToken)

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use zeroize::Zeroizing;

use crate::constants::GOOGLE_CLOUD_PLATFORM_SCOPE;
use crate::provider::gcp::{ExternalAccountDocument, GoogleAccessToken};
use crate::provider::{ExternalAccountExchange, FederationError};

const TOKEN_EXCHANGE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const ACCESS_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";
const DEFAULT_IMPERSONATION_LIFETIME_SECS: u32 = 3600;

#[derive(Deserialize)]
struct StsTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessTokenResponse {
    access_token: String,
    expire_time: DateTime<Utc>,
}

/// STS and IAM credentials client
#[derive(Clone)]
pub struct StsClient {
    http: reqwest::Client,
}

impl std::fmt::Debug for StsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StsClient").finish_non_exhaustive()
    }
}

impl StsClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn subject_token(
        document: &ExternalAccountDocument,
    ) -> Result<Zeroizing<String>, FederationError> {
        let source = &document.credential_source;
        let contents = Zeroizing::new(tokio::fs::read_to_string(&source.file).await.map_err(
            |source_error| FederationError::TokenFile {
                path: source.file.clone(),
                source: source_error,
            },
        )?);

        match source.format.format_type.as_str() {
            "json" => {
                let field = source.format.subject_token_field_name.as_deref().ok_or_else(|| {
                    FederationError::InvalidDocument(
                        "credential_source.format.subject_token_field_name is required for json"
                            .to_string(),
                    )
                })?;
                let parsed: Value = serde_json::from_str(&contents)
                    .map_err(|e| FederationError::InvalidDocument(e.to_string()))?;
                parsed
                    .get(field)
                    .and_then(Value::as_str)
                    .map(|token| Zeroizing::new(token.to_string()))
                    .ok_or_else(|| {
                        FederationError::InvalidDocument(format!(
                            "subject token field '{field}' missing from credential source"
                        ))
                    })
            }
            "text" | "" => Ok(Zeroizing::new(contents.trim().to_string())),
            other => Err(FederationError::InvalidDocument(format!(
                "unsupported credential_source format '{other}'"
            ))),
        }
    }

    async fn exchange_subject_token(
        &self,
        document: &ExternalAccountDocument,
        subject_token: &str,
    ) -> Result<StsTokenResponse, FederationError> {
        let form = [
            ("grant_type", TOKEN_EXCHANGE_GRANT_TYPE),
            ("audience", document.audience.as_str()),
            ("scope", GOOGLE_CLOUD_PLATFORM_SCOPE),
            ("requested_token_type", ACCESS_TOKEN_TYPE),
            ("subject_token", subject_token),
            ("subject_token_type", document.subject_token_type.as_str()),
        ];

        let response = self.http.post(&document.token_url).form(&form).send().await?;
        if !response.status().is_success() {
            let status = response.status().to_string();
            let body = response.text().await.unwrap_or_default();
            return Err(FederationError::ExchangeRejected {
                endpoint: "sts token exchange",
                status,
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| FederationError::InvalidResponse(e.to_string()))
    }

    async fn impersonate(
        &self,
        document: &ExternalAccountDocument,
        federated_token: &str,
    ) -> Result<GenerateAccessTokenResponse, FederationError> {
        let lifetime = document
            .service_account_impersonation
            .as_ref()
            .and_then(|options| options.token_lifetime_seconds)
            .unwrap_or(DEFAULT_IMPERSONATION_LIFETIME_SECS);
        let body = serde_json::json!({
            "scope": [GOOGLE_CLOUD_PLATFORM_SCOPE],
            "lifetime": format!("{lifetime}s"),
        });

        let response = self
            .http
            .post(&document.service_account_impersonation_url)
            .bearer_auth(federated_token)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().to_string();
            let body = response.text().await.unwrap_or_default();
            return Err(FederationError::ExchangeRejected {
                endpoint: "service account impersonation",
                status,
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| FederationError::InvalidResponse(e.to_string()))
    }
}

/// Absolute expiry of a federated token; out-of-range `expires_in` is a bad response
fn federated_expiry(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, FederationError> {
    TimeDelta::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            FederationError::InvalidResponse(format!("expires_in {expires_in} is out of range"))
        })
}

#[async_trait]
impl ExternalAccountExchange for StsClient {
    async fn exchange(
        &self,
        document: &ExternalAccountDocument,
    ) -> Result<GoogleAccessToken, FederationError> {
        let subject_token = Self::subject_token(document).await?;
        let sts = self.exchange_subject_token(document, &subject_token).await?;
        let federated_token = Zeroizing::new(sts.access_token);
        debug!(audience = %document.audience, "STS token exchange succeeded");

        if document.service_account_impersonation_url.is_empty() {
            return Ok(GoogleAccessToken {
                access_token: federated_token,
                expires_at: federated_expiry(Utc::now(), sts.expires_in)?,
            });
        }

        let impersonated = self.impersonate(document, &federated_token).await?;
        debug!(expires_at = %impersonated.expire_time, "Service account impersonation succeeded");
        Ok(GoogleAccessToken {
            access_token: Zeroizing::new(impersonated.access_token),
            expires_at: impersonated.expire_time,
        })
    }
}
