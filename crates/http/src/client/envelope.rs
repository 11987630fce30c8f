//! Backend response envelope `{ success, data, message }`

use super::ClientError;
use reqwest::StatusCode;
use serde_json::Value;

/// Error code sent with a 401 when the access token has expired
pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";
/// Error code sent with a 401 when the account was deactivated
pub const ACCOUNT_DEACTIVATED: &str = "ACCOUNT_DEACTIVATED";

/// What a 401 response asks the client to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unauthorized {
    Deactivated,
    Expired,
    Other,
}

fn parse_body(body: &[u8]) -> Option<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(body).ok()
}

fn is_envelope(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key("success") || obj.contains_key("data"))
}

/// Extract the payload of a successful response.
///
/// Envelopes yield their `data` field; any other JSON body is returned whole,
/// a text body becomes a JSON string and an empty body becomes `null`.
pub fn unwrap_data(status: StatusCode, body: &[u8]) -> Result<Value, ClientError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        let text = String::from_utf8_lossy(body).trim().to_string();
        return Ok(Value::String(text));
    };
    if !is_envelope(&value) {
        return Ok(value);
    }

    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let failure = ErrorBody::from_value(Some(value));
        return Err(ClientError::from_status(
            status,
            failure.message_or(status),
            failure.data,
        ));
    }

    Ok(match value {
        Value::Object(mut obj) => obj.remove("data").unwrap_or(Value::Null),
        other => other,
    })
}

/// Parsed body of a failed response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub code: Option<String>,
    pub data: Option<Value>,
}

impl ErrorBody {
    pub fn parse(body: &[u8]) -> Self {
        match parse_body(body) {
            Some(value) => Self::from_value(Some(value)),
            None => {
                let text = String::from_utf8_lossy(body).trim().to_string();
                Self {
                    message: (!text.is_empty()).then_some(text),
                    ..Self::default()
                }
            }
        }
    }

    fn from_value(value: Option<Value>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };

        let text = |field: &str| {
            value
                .get(field)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        };
        let message = text("message").or_else(|| text("error"));
        let code = text("code");

        Self {
            message,
            code,
            data: (!value.is_null()).then_some(value),
        }
    }

    /// Server message, or the status' canonical reason
    pub fn message_or(&self, status: StatusCode) -> String {
        self.message.clone().unwrap_or_else(|| {
            status.canonical_reason().map_or_else(
                || format!("Request failed with status {}", status.as_u16()),
                ToString::to_string,
            )
        })
    }

    /// Classify a 401 body.
    ///
    /// The dedicated code wins; a message mentioning deactivation is accepted
    /// for backends that do not send one.
    pub fn unauthorized_kind(&self) -> Unauthorized {
        match self.code.as_deref() {
            Some(ACCOUNT_DEACTIVATED) => Unauthorized::Deactivated,
            Some(TOKEN_EXPIRED) => Unauthorized::Expired,
            _ if self
                .message
                .as_deref()
                .is_some_and(|m| m.to_ascii_lowercase().contains("deactivated")) =>
            {
                Unauthorized::Deactivated
            }
            _ => Unauthorized::Other,
        }
    }
}
