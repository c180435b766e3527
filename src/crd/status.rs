//! # RegistryAuth Status
//!
//! Status reported after every reconciliation.

use serde::{Deserialize, Serialize};

/// Status of the RegistryAuth resource
///
/// After a completed reconciliation exactly one of `error` and `tokenExpiration`
/// is non-empty. Empty strings are serialized so a merge patch clears stale values.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistryAuthStatus {
    /// Expiry of the credential currently held in the pull secret
    #[serde(default)]
    pub token_expiration: String,
    /// Last failure message, `<stage>: <detail>`
    #[serde(default)]
    pub error: String,
    /// Last reconciliation time (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconcile_time: Option<String>,
    /// Next scheduled reconciliation time (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_reconcile_time: Option<String>,
    /// Generation of the spec the last reconciliation acted on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl RegistryAuthStatus {
    /// Status written before any external call is made
    pub fn cleared() -> Self {
        Self::default()
    }

    /// Time left until the scheduled refresh, when a completed reconciliation
    /// of `generation` produced this status and the refresh is still in the future
    pub fn pending_refresh(
        &self,
        generation: Option<i64>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Option<std::time::Duration> {
        // A cleared status means the last reconciliation never finished
        if self.error.is_empty() == self.token_expiration.is_empty() {
            return None;
        }
        if self.observed_generation.is_none() || self.observed_generation != generation {
            return None;
        }
        let next = chrono::DateTime::parse_from_rfc3339(self.next_reconcile_time.as_deref()?).ok()?;
        (next.with_timezone(&chrono::Utc) - now)
            .to_std()
            .ok()
            .filter(|remaining| !remaining.is_zero())
    }
}
