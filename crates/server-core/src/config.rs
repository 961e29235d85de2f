//! Configuration file loading.

use std::{path::Path, time::Duration};

use ks_types::config::Config;

use crate::error::{ServerError, ServerResult};

/// Read and parse a TOML configuration file.
pub fn load_config(path: &Path) -> ServerResult<Config> {
    let raw = std::fs::read_to_string(path).map_err(|source| ServerError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ServerError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse `request_timeout`; zero is rejected.
pub fn parse_request_timeout(value: &str) -> ServerResult<Duration> {
    let timeout = humantime::parse_duration(value.trim())
        .map_err(|e| ServerError::invalid_config(format!("request_timeout `{value}`: {e}")))?;
    if timeout.is_zero() {
        return Err(ServerError::invalid_config("request_timeout must be positive"));
    }
    Ok(timeout)
}
