//! CLI configuration loading

use anyhow::Result;
use campus_http::ClientConfig;
use std::path::{Path, PathBuf};

/// Load client configuration: defaults, then an optional file, then `CAMPUS_*`
/// environment variables (`CAMPUS_API_URL`, `CAMPUS_TIMEOUT_SECS`, ...)
pub fn load_client_config(path: Option<&Path>) -> Result<ClientConfig> {
    let defaults = ClientConfig::default();

    let mut builder = config::Config::builder()
        .set_default("api_url", defaults.api_url)?
        .set_default("timeout_secs", defaults.timeout_secs)?
        .set_default("refresh_path", defaults.refresh_path)?;

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(config::Environment::with_prefix("CAMPUS").try_parsing(true))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Resolve the data directory: flag, then `CAMPUS_STATE_DIR`, then the platform data dir
pub fn resolve_data_dir(data_dir: Option<PathBuf>) -> PathBuf {
    data_dir.unwrap_or_else(|| {
        if let Ok(state_dir) = std::env::var("CAMPUS_STATE_DIR") {
            PathBuf::from(state_dir)
        } else {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("campus")
        }
    })
}

/// Location of the persisted session store inside the data directory
pub fn session_file(data_dir: &Path) -> PathBuf {
    data_dir.join("session.json")
}
