//! Campus API client

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod refresh;
pub mod selector;

use campus_core::{
    MemoryStore, Navigator, RecordingNavigator, RequestContext, Role, SessionStore, Sessions,
    StoredCredential,
};
use config::ClientConfig;
use envelope::Unauthorized;
use error::ClientError;
use refresh::RefreshCoordinator;
use reqwest::{Client, ClientBuilder, Method, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BLOCK_MESSAGE: &str =
    "Your account has been deactivated. Please contact the administrator.";

/// A request independent of any credential, so it can be sent more than once
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Attach a JSON body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Campus API client
///
/// Cheap to clone; clones share the session store and the refresh lock.
#[derive(Clone)]
pub struct CampusClient {
    http: Client,
    base_url: String,
    config: Arc<ClientConfig>,
    sessions: Sessions,
    navigator: Arc<dyn Navigator>,
    refresh: Arc<RefreshCoordinator>,
}

impl CampusClient {
    /// Create a client for `base_url` with in-memory sessions
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> CampusClientBuilder {
        CampusClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Stored credentials used by this client
    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Build the wire request, with a bearer token when one was selected
    fn build(&self, request: &ApiRequest, token: Option<&str>) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path));

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        builder
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
    ) -> Result<T, ClientError> {
        self.send(ctx, ApiRequest::new(Method::GET, path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        ctx: &RequestContext,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send(ctx, ApiRequest::new(Method::POST, path).json(body)?)
            .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        ctx: &RequestContext,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send(ctx, ApiRequest::new(Method::PUT, path).json(body)?)
            .await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        ctx: &RequestContext,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send(ctx, ApiRequest::new(Method::PATCH, path).json(body)?)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
    ) -> Result<T, ClientError> {
        self.send(ctx, ApiRequest::new(Method::DELETE, path)).await
    }

    /// Send a request and return the envelope's `data` as `T`
    pub async fn send<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        request: ApiRequest,
    ) -> Result<T, ClientError> {
        let data = self.dispatch(ctx, &request).await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn dispatch(
        &self,
        ctx: &RequestContext,
        request: &ApiRequest,
    ) -> Result<Value, ClientError> {
        let mut selection = selector::select(&self.sessions, ctx, &request.path)?;
        let mut retried = false;

        loop {
            let token = selection.as_ref().map(|s| s.credential.token.as_str());
            debug!(
                method = %request.method,
                path = %request.path,
                authenticated = token.is_some(),
                retried,
                "Sending request"
            );

            let response = self.build(request, token).send().await?;
            let status = response.status();
            let body = response.bytes().await?;

            if status.is_success() {
                return envelope::unwrap_data(status, &body);
            }

            let failure = envelope::ErrorBody::parse(&body);
            if status == StatusCode::UNAUTHORIZED {
                match failure.unauthorized_kind() {
                    Unauthorized::Deactivated => {
                        let message = failure
                            .message
                            .unwrap_or_else(|| DEFAULT_BLOCK_MESSAGE.to_string());
                        return Err(self.block_account(ctx, selection.as_ref(), message)?);
                    }
                    Unauthorized::Expired if !retried => {
                        if let Some(stale) = &selection {
                            selection = Some(self.refresh_after_expiry(stale).await?);
                            retried = true;
                            continue;
                        }
                    }
                    _ => {}
                }
            }

            return Err(ClientError::from_status(
                status,
                failure.message_or(status),
                failure.data,
            ));
        }
    }

    /// Force a logout after the server reported the account as deactivated
    fn block_account(
        &self,
        ctx: &RequestContext,
        selection: Option<&StoredCredential>,
        message: String,
    ) -> Result<ClientError, ClientError> {
        let role = selection.map(|s| s.role).or_else(|| {
            selector::is_faculty_page(ctx.page_path()).then_some(Role::Faculty)
        });
        warn!(role = ?role, "Account deactivated, clearing all sessions");

        self.sessions.mark_blocked(&message)?;
        self.end_session(role)?;

        Ok(ClientError::AccountBlocked {
            status: StatusCode::UNAUTHORIZED.as_u16(),
            message,
        })
    }
}

/// Builder for CampusClient
#[derive(Default)]
pub struct CampusClientBuilder {
    config: Option<ClientConfig>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    store: Option<Arc<dyn SessionStore>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl CampusClientBuilder {
    /// Start from a full configuration; `base_url` and `timeout` still override it
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Storage holding the credential records
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Receiver of login redirects after a forced logout
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<CampusClient, ClientError> {
        let mut config = self.config.unwrap_or_default();
        if let Some(base_url) = self.base_url {
            config.api_url = base_url;
        }

        url::Url::parse(&config.api_url).map_err(|e| {
            ClientError::Configuration(format!("invalid api_url {:?}: {e}", config.api_url))
        })?;

        // Ensure base_url ends without a trailing slash
        let base_url = config.api_url.trim_end_matches('/').to_string();

        let timeout = self.timeout.unwrap_or_else(|| config.timeout());
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("campus-client/{}", env!("CARGO_PKG_VERSION")));

        let http = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn SessionStore>);
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(RecordingNavigator::new()) as Arc<dyn Navigator>);

        Ok(CampusClient {
            http,
            base_url,
            config: Arc::new(config),
            sessions: Sessions::new(store),
            navigator,
            refresh: Arc::new(RefreshCoordinator::default()),
        })
    }
}
