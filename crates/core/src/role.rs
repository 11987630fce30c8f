//! User roles and per-request session context

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three kinds of account that hold a credential record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    /// Counselors and non-teaching staff
    Faculty,
    Student,
}

impl Role {
    pub const ALL: [Self; 3] = [Self::Admin, Self::Faculty, Self::Student];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Faculty => "faculty",
            Self::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" => Ok(Self::Admin),
            "faculty" | "counselor" | "staff" => Ok(Self::Faculty),
            "student" => Ok(Self::Student),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Context a caller supplies with each request.
///
/// An explicit `role` pins the credential record. Without one the client
/// falls back to inferring the role from `page_path` and the request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub role: Option<Role>,
    pub page_path: Option<String>,
}

impl RequestContext {
    /// Context that lets the client infer the role
    pub fn inferred() -> Self {
        Self::default()
    }

    /// Context pinned to a specific role
    pub fn for_role(role: Role) -> Self {
        Self {
            role: Some(role),
            page_path: None,
        }
    }

    /// Set the path of the page issuing the request
    #[must_use]
    pub fn with_page(mut self, page_path: impl Into<String>) -> Self {
        self.page_path = Some(page_path.into());
        self
    }

    pub fn page_path(&self) -> &str {
        self.page_path.as_deref().unwrap_or_default()
    }
}
