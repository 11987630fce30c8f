//! CLI commands

use anyhow::{Context, Result};
use campus_core::{FileStore, Navigator, RequestContext, Role};
use campus_http::client::auth::LoginRequest;
use campus_http::{ApiRequest, CampusClient, ClientConfig, ClientError, Method};
use clap::{Args, Subcommand};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the issued credential
    Login {
        #[arg(long)]
        role: Role,

        #[arg(long)]
        email: String,

        #[arg(long, env = "CAMPUS_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget stored credentials (all roles when --role is omitted)
    Logout {
        #[arg(long)]
        role: Option<Role>,
    },

    /// Send a GET request
    Get {
        path: String,
        #[command(flatten)]
        target: Target,
    },

    /// Send a POST request
    Post {
        path: String,
        #[command(flatten)]
        body: Body,
        #[command(flatten)]
        target: Target,
    },

    /// Send a PUT request
    Put {
        path: String,
        #[command(flatten)]
        body: Body,
        #[command(flatten)]
        target: Target,
    },

    /// Send a PATCH request
    Patch {
        path: String,
        #[command(flatten)]
        body: Body,
        #[command(flatten)]
        target: Target,
    },

    /// Send a DELETE request
    Delete {
        path: String,
        #[command(flatten)]
        target: Target,
    },

    /// Show stored sessions and any pending account notice
    Status,
}

/// Which credential a request should carry
#[derive(Args, Debug, Clone, Default)]
pub struct Target {
    /// Use this role's credential instead of inferring it
    #[arg(long)]
    role: Option<Role>,

    /// Page path the request is issued from, e.g. /faculty/requests
    #[arg(long)]
    page: Option<String>,
}

impl Target {
    fn context(&self) -> RequestContext {
        RequestContext {
            role: self.role,
            page_path: self.page.clone(),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct Body {
    /// JSON request body
    #[arg(long)]
    data: Option<String>,
}

impl Body {
    fn value(&self) -> Result<Option<Value>> {
        self.data
            .as_deref()
            .map(|raw| serde_json::from_str(raw).context("--data is not valid JSON"))
            .transpose()
    }
}

/// Tells the user where to sign in again after a forced logout
struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn redirect(&self, path: &str) {
        warn!(route = path, "Session ended");
        eprintln!("Session ended. Sign in again via {path}");
    }
}

impl Commands {
    pub async fn execute(self, client_config: ClientConfig, data_dir: &Path) -> Result<()> {
        let store = FileStore::open(config::session_file(data_dir))
            .context("failed to open session store")?;
        let client = CampusClient::builder()
            .config(client_config)
            .store(Arc::new(store))
            .navigator(Arc::new(ConsoleNavigator))
            .build()?;

        match self {
            Commands::Login {
                role,
                email,
                password,
            } => {
                let credential = client
                    .login(role, &LoginRequest { email, password })
                    .await
                    .map_err(report)?;
                info!(%role, "Signed in");
                print_json(&credential.user.unwrap_or(Value::Null))
            }
            Commands::Logout { role } => {
                match role {
                    Some(role) => client.logout(role)?,
                    None => client.logout_all()?,
                }
                println!("Signed out");
                Ok(())
            }
            Commands::Get { path, target } => {
                send(&client, &target, ApiRequest::new(Method::GET, path)).await
            }
            Commands::Post { path, body, target } => {
                send_with_body(&client, &target, Method::POST, path, &body).await
            }
            Commands::Put { path, body, target } => {
                send_with_body(&client, &target, Method::PUT, path, &body).await
            }
            Commands::Patch { path, body, target } => {
                send_with_body(&client, &target, Method::PATCH, path, &body).await
            }
            Commands::Delete { path, target } => {
                send(&client, &target, ApiRequest::new(Method::DELETE, path)).await
            }
            Commands::Status => status(&client),
        }
    }
}

async fn send_with_body(
    client: &CampusClient,
    target: &Target,
    method: Method,
    path: String,
    body: &Body,
) -> Result<()> {
    let mut request = ApiRequest::new(method, path);
    request.body = body.value()?;
    send(client, target, request).await
}

async fn send(client: &CampusClient, target: &Target, request: ApiRequest) -> Result<()> {
    let data: Value = client
        .send(&target.context(), request)
        .await
        .map_err(report)?;
    print_json(&data)
}

fn status(client: &CampusClient) -> Result<()> {
    let sessions = client.sessions();
    let roles = sessions.active_roles()?;
    if roles.is_empty() {
        println!("No stored sessions");
    }
    for role in roles {
        println!("{role}: signed in");
    }

    if let Some(notice) = sessions.take_block_notice()? {
        println!("Account blocked: {}", notice.message);
    }
    Ok(())
}

/// Print the flattened error for the user before handing it to anyhow
fn report(err: ClientError) -> anyhow::Error {
    if let Ok(rendered) = serde_json::to_string_pretty(&err.normalized()) {
        eprintln!("{rendered}");
    }
    err.into()
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
