//! Client configuration

use campus_core::Role;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Settings for [`CampusClient`](super::CampusClient)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL every request path is appended to
    pub api_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Endpoint that exchanges a refresh token for a new access token
    pub refresh_path: String,

    /// Login endpoint per role
    pub login_paths: LoginPaths,

    /// Front-end routes shown after a forced logout
    pub login_routes: LoginRoutes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginPaths {
    pub student: String,
    pub faculty: String,
    pub admin: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRoutes {
    pub faculty: String,
    pub student: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            refresh_path: "/auth/refresh-token".to_string(),
            login_paths: LoginPaths::default(),
            login_routes: LoginRoutes::default(),
        }
    }
}

impl Default for LoginPaths {
    fn default() -> Self {
        Self {
            student: "/auth/student/login".to_string(),
            faculty: "/auth/faculty/login".to_string(),
            admin: "/auth/admin/login".to_string(),
        }
    }
}

impl Default for LoginRoutes {
    fn default() -> Self {
        Self {
            faculty: "/faculty-login".to_string(),
            student: "/student-signin".to_string(),
        }
    }
}

impl ClientConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl LoginPaths {
    pub fn for_role(&self, role: Role) -> &str {
        match role {
            Role::Student => &self.student,
            Role::Faculty => &self.faculty,
            Role::Admin => &self.admin,
        }
    }
}

impl LoginRoutes {
    /// Faculty sessions return to the faculty login; everyone else to the student sign-in
    pub fn for_role(&self, role: Option<Role>) -> &str {
        match role {
            Some(Role::Faculty) => &self.faculty,
            _ => &self.student,
        }
    }
}
