//! Persisted credential records and their storage layout

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Storage keys shared with the browser front end
pub mod keys {
    pub const ADMIN_AUTH: &str = "admin-auth";
    pub const STUDENT_AUTH: &str = "student-auth";
    /// Legacy student record, also the legacy home of the global refresh token
    pub const LEGACY_AUTH: &str = "auth-storage";
    pub const FACULTY_TOKEN: &str = "faculty_token";
    pub const FACULTY_REFRESH_TOKEN: &str = "faculty_refresh_token";
    pub const FACULTY_USER: &str = "faculty_user";
    pub const ACCOUNT_BLOCKED: &str = "accountBlocked";
    pub const BLOCK_MESSAGE: &str = "blockMessage";

    /// Every key that holds credential material
    pub const CREDENTIAL_KEYS: [&str; 6] = [
        ADMIN_AUTH,
        STUDENT_AUTH,
        LEGACY_AUTH,
        FACULTY_TOKEN,
        FACULTY_REFRESH_TOKEN,
        FACULTY_USER,
    ];
}

/// A role's persisted login: access token, refresh token and user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredential {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
}

/// Wrapper written by the front end's persisted stores
#[derive(Serialize)]
struct PersistedBlob<'a> {
    state: &'a SessionCredential,
    version: u32,
}

impl SessionCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            refresh_token: None,
            user: None,
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: Value) -> Self {
        self.user = Some(user);
        self
    }

    /// Decode a stored JSON blob.
    ///
    /// Accepts both a flat record and the `{"state": {...}}` layout. Returns
    /// `None` for malformed blobs or blobs without a non-empty token.
    pub fn from_blob(blob: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(blob).ok()?;
        Self::from_value(&value)
    }

    /// Extract a credential from an arbitrary JSON object
    pub fn from_value(value: &Value) -> Option<Self> {
        let record = match value.get("state") {
            Some(state) if state.is_object() => state,
            _ => value,
        };

        let token = non_empty_str(record, "token").or_else(|| non_empty_str(record, "accessToken"))?;
        let refresh_token = non_empty_str(record, "refreshToken");
        let user = record.get("user").filter(|u| !u.is_null()).cloned();

        Some(Self {
            token,
            refresh_token,
            user,
        })
    }

    /// Encode in the persisted-store layout
    pub fn to_blob(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&PersistedBlob {
            state: self,
            version: 0,
        })
    }
}

fn non_empty_str(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Notice left for the next login screen after an account was deactivated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockNotice {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_blob_nested_state() {
        let blob = json!({
            "state": {"token": "abc", "refreshToken": "r1", "user": {"id": 7}},
            "version": 0
        })
        .to_string();

        let cred = SessionCredential::from_blob(&blob).unwrap();
        assert_eq!(cred.token, "abc");
        assert_eq!(cred.refresh_token.as_deref(), Some("r1"));
        assert_eq!(cred.user, Some(json!({"id": 7})));
    }

    #[test]
    fn test_from_blob_flat_record() {
        let blob = json!({"accessToken": "flat"}).to_string();
        let cred = SessionCredential::from_blob(&blob).unwrap();
        assert_eq!(cred.token, "flat");
        assert!(cred.refresh_token.is_none());
        assert!(cred.user.is_none());
    }

    #[test]
    fn test_from_blob_rejects_missing_or_empty_token() {
        assert!(SessionCredential::from_blob("not json").is_none());
        assert!(SessionCredential::from_blob(r#"{"state":{"token":""}}"#).is_none());
        assert!(SessionCredential::from_blob(r#"{"state":{"token":null,"user":{}}}"#).is_none());
    }

    #[test]
    fn test_blob_layout_is_readable() {
        let cred = SessionCredential::new("t").with_refresh_token("r");
        let blob = cred.to_blob().unwrap();
        let value: Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(value["state"]["refreshToken"], "r");
        assert_eq!(value["version"], 0);
        assert_eq!(SessionCredential::from_blob(&blob), Some(cred));
    }
}
