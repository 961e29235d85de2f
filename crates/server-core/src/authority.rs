//! Process-wide authority state, built once at startup and shared read-only.

use axum::http::HeaderName;
use ks_types::config::{AuthenticatingProxy, Config};
use secrecy::SecretString;
use ssh_core::keys::{fingerprint, load_signing_key};
use tracing::info;

use crate::{
    error::{ServerError, ServerResult},
    policy::PrincipalPolicy,
    signer::{CaSigner, ValidityPeriods},
};

/// Environment variable holding the passphrase of an encrypted CA key.
pub const PASSPHRASE_ENV: &str = "KS_SIGNING_KEY_PASSPHRASE";

/// Everything an issuance needs besides the ledger: the signer, the principal
/// policy and the trusted proxy descriptor.
#[derive(Clone, Debug)]
pub struct Authority {
    signer: CaSigner,
    policy: PrincipalPolicy,
    proxy: Option<AuthenticatingProxy>,
}

impl Authority {
    pub fn new(signer: CaSigner, policy: PrincipalPolicy, proxy: Option<AuthenticatingProxy>) -> Self {
        Self { signer, policy, proxy }
    }

    /// Validate the configuration and load the CA key.
    pub fn from_config(config: &Config) -> ServerResult<Self> {
        let validity = ValidityPeriods::parse(&config.host_cert_duration, &config.user_cert_duration)?;
        let proxy = config.authenticating_proxy.clone().map(validate_proxy).transpose()?;

        let passphrase = std::env::var(PASSPHRASE_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .map(SecretString::from);
        let key = load_signing_key(&config.signing_key, passphrase.as_ref())?;

        let policy = PrincipalPolicy::new(
            config.strip_suffix.clone(),
            config.aliases.clone(),
            config.ssh.user_cert_extensions.clone(),
        );

        info!(
            algorithm = %key.algorithm(),
            fingerprint = %fingerprint(key.public_key()),
            host_validity = %humantime::format_duration(validity.host),
            user_validity = %humantime::format_duration(validity.user),
            user_enrollment = proxy.is_some(),
            "certificate authority ready"
        );

        Ok(Self::new(CaSigner::new(key, validity), policy, proxy))
    }

    pub fn signer(&self) -> &CaSigner {
        &self.signer
    }

    pub fn policy(&self) -> &PrincipalPolicy {
        &self.policy
    }

    /// Trusted proxy descriptor; `None` disables user enrollment.
    pub fn proxy(&self) -> Option<&AuthenticatingProxy> {
        self.proxy.as_ref()
    }
}

fn validate_proxy(proxy: AuthenticatingProxy) -> ServerResult<AuthenticatingProxy> {
    let hostname = proxy.hostname.trim();
    if hostname.is_empty() {
        return Err(ServerError::invalid_config("authenticating_proxy.hostname must not be empty"));
    }
    let header = proxy.username_header.trim();
    if header.is_empty() {
        return Err(ServerError::invalid_config(
            "authenticating_proxy.username_header must not be empty",
        ));
    }
    HeaderName::from_bytes(header.as_bytes()).map_err(|e| {
        ServerError::invalid_config(format!("authenticating_proxy.username_header `{header}`: {e}"))
    })?;

    Ok(AuthenticatingProxy {
        hostname: hostname.to_string(),
        username_header: header.to_string(),
    })
}
