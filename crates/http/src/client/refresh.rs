//! Access token refresh, serialized across every clone of a client

use super::{CampusClient, ClientError, envelope};
use campus_core::{Role, StoredCredential};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Single lock all pending refreshes queue behind
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    lock: Mutex<()>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(alias = "accessToken")]
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

impl CampusClient {
    /// Obtain a fresh credential after `stale` was rejected as expired.
    ///
    /// Holds the refresh lock for the whole exchange. A request that waited
    /// behind another refresh reuses its result instead of refreshing again.
    /// Any failure ends the session: storage is cleared and the navigator is
    /// sent to the login route.
    pub(crate) async fn refresh_after_expiry(
        &self,
        stale: &StoredCredential,
    ) -> Result<StoredCredential, ClientError> {
        let _guard = self.refresh.lock.lock().await;

        let Some(current) = self.sessions.locate(stale.role)? else {
            // Cleared by a failed refresh or a forced logout while we waited
            return Err(ClientError::SessionExpired(
                "Session ended. Please sign in again.".to_string(),
            ));
        };
        if current.credential.token != stale.credential.token {
            info!(role = %stale.role, "Reusing token refreshed by a concurrent request");
            return Ok(current);
        }

        match self.exchange_refresh_token(&current).await {
            Ok(refreshed) => Ok(refreshed),
            Err(err) => {
                warn!(role = %stale.role, error = %err, "Token refresh failed, ending session");
                self.end_session(Some(stale.role))?;
                Err(ClientError::SessionExpired(
                    "Your session has expired. Please sign in again.".to_string(),
                ))
            }
        }
    }

    async fn exchange_refresh_token(
        &self,
        current: &StoredCredential,
    ) -> Result<StoredCredential, ClientError> {
        let refresh_token = match &current.credential.refresh_token {
            Some(token) => token.clone(),
            None => self.sessions.legacy_refresh_token()?.ok_or_else(|| {
                ClientError::SessionExpired("No refresh token available".to_string())
            })?,
        };

        let response = self
            .http
            .post(self.url(&self.config.refresh_path))
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let failure = envelope::ErrorBody::parse(&body);
            return Err(ClientError::from_status(
                status,
                failure.message_or(status),
                failure.data,
            ));
        }

        let refreshed: RefreshResponse =
            serde_json::from_value(envelope::unwrap_data(status, &body)?)?;
        let credential = self.sessions.update_tokens(
            current,
            &refreshed.token,
            refreshed.refresh_token.as_deref(),
        )?;
        info!(role = %current.role, "Refreshed access token");

        Ok(StoredCredential {
            credential,
            ..current.clone()
        })
    }

    /// Clear every stored credential and send the user to the login route
    pub(crate) fn end_session(&self, role: Option<Role>) -> Result<(), ClientError> {
        self.sessions.clear_all()?;
        self.navigator
            .redirect(self.config.login_routes.for_role(role));
        Ok(())
    }
}
