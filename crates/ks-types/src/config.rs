//! Configuration structs for the certificate authority service.
use std::{collections::HashMap, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level service configuration, loaded once at startup from TOML.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Socket address the HTTPS listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Server certificate and client-CA material for the listener.
    pub tls: TlsConfig,
    /// Path to the CA private key used to sign certificates.
    pub signing_key: PathBuf,
    /// Validity of host certificates, as a duration string (`"168h"`).
    pub host_cert_duration: String,
    /// Validity of user certificates, as a duration string (`"24h"`).
    pub user_cert_duration: String,
    /// Domain suffix stripped from hostnames to form an extra principal.
    #[serde(default)]
    pub strip_suffix: Option<String>,
    /// Extra principals per hostname, appended in the listed order.
    #[serde(default)]
    pub aliases: HashMap<String, Vec<String>>,
    /// Issuance ledger backend.
    pub db: DatabaseConfig,
    /// Trusted SSO proxy that asserts usernames; user enrollment is disabled when absent.
    #[serde(default)]
    pub authenticating_proxy: Option<AuthenticatingProxy>,
    #[serde(default)]
    pub ssh: SshConfig,
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Upper bound on processing time for one request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
}

/// TLS material for the HTTPS listener.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PEM bundle of CAs trusted to issue client certificates.
    pub ca: PathBuf,
    /// PEM certificate chain presented by the server.
    pub cert: PathBuf,
    /// PEM private key matching `cert`.
    pub key: PathBuf,
}

/// Ledger backend selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite {
        path: PathBuf,
        #[serde(default)]
        max_connections: Option<u32>,
    },
    Mysql {
        url: String,
        #[serde(default)]
        max_connections: Option<u32>,
    },
}

/// Trust descriptor for the authenticating proxy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatingProxy {
    /// Hostname the proxy's TLS client certificate must be valid for.
    pub hostname: String,
    /// Header carrying the already-authenticated username.
    pub username_header: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshConfig {
    /// Extensions granted (with empty values) on every user certificate,
    /// e.g. `permit-pty`.
    #[serde(default)]
    pub user_cert_extensions: Vec<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout() -> String {
    "30s".to_string()
}
