//! Campus HTTP client
//!
//! Attaches the right role's bearer token to every call, unwraps the backend's
//! response envelope and recovers from expired tokens with a single refresh.

pub mod client;

pub use client::config::ClientConfig;
pub use client::error::{ClientError, NormalizedError};
pub use client::{ApiRequest, CampusClient, CampusClientBuilder};

pub use campus_core::{RequestContext, Role, SessionCredential, Sessions};
pub use reqwest::Method;
