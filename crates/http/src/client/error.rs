//! Client error types

use campus_core::StoreError;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error, including timeouts
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    Http {
        status: u16,
        message: String,
        data: Option<Value>,
    },

    /// The account was deactivated; every stored session has been cleared
    #[error("Account blocked: {message}")]
    AccountBlocked { status: u16, message: String },

    /// The access token expired and could not be refreshed
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Session storage failed
    #[error("Session storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Flattened error shape handed to callers that render messages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub blocked: bool,
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String, data: Option<Value>) -> Self {
        Self::Http {
            status: status.as_u16(),
            message,
            data,
        }
    }

    /// HTTP status associated with the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } | Self::AccountBlocked { status, .. } => Some(*status),
            Self::SessionExpired(_) => Some(401),
            Self::Request(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::AccountBlocked { .. })
    }

    /// Whether the caller has to sign in again
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::SessionExpired(_) | Self::AccountBlocked { .. } => true,
            Self::Http { status, .. } => *status == 401,
            _ => false,
        }
    }

    pub fn normalized(&self) -> NormalizedError {
        let message = match self {
            Self::Request(err) if err.is_timeout() => "Request timed out".to_string(),
            Self::Request(_) => "Network error. Please check your connection.".to_string(),
            Self::Http { message, .. }
            | Self::AccountBlocked { message, .. }
            | Self::SessionExpired(message) => message.clone(),
            other => other.to_string(),
        };
        let data = match self {
            Self::Http { data, .. } => data.clone(),
            _ => None,
        };

        NormalizedError {
            message,
            status: self.status(),
            data,
            blocked: self.is_blocked(),
        }
    }
}
