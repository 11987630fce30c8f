//! Login and logout

use super::{CampusClient, ClientError, envelope};
use campus_core::{Role, SessionCredential};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Credentials posted to a role's login endpoint
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    #[serde(alias = "accessToken")]
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<Value>,
}

impl CampusClient {
    /// Sign in as `role` and persist the issued credential.
    ///
    /// Goes out without a bearer token and never triggers a refresh. A
    /// pending block notice is cleared once the login succeeds.
    pub async fn login(
        &self,
        role: Role,
        request: &LoginRequest,
    ) -> Result<SessionCredential, ClientError> {
        let path = self.config.login_paths.for_role(role);
        let response = self.http.post(self.url(path)).json(request).send().await?;
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

        let login: LoginResponse = serde_json::from_value(envelope::unwrap_data(status, &body)?)?;
        let credential = SessionCredential {
            token: login.token,
            refresh_token: login.refresh_token,
            user: login.user,
        };

        self.sessions.save(role, &credential)?;
        self.sessions.take_block_notice()?;
        info!(%role, "Logged in");

        Ok(credential)
    }

    /// Forget the credential stored for `role`
    pub fn logout(&self, role: Role) -> Result<(), ClientError> {
        self.sessions.clear(role)?;
        Ok(())
    }

    /// Forget every stored credential
    pub fn logout_all(&self) -> Result<(), ClientError> {
        self.sessions.clear_all()?;
        Ok(())
    }
}
