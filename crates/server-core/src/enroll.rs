//! Issuance orchestration: the host and user enrollment pipelines.
//!
//! Each pipeline is fail-fast: authorize, parse the key, allocate a serial,
//! derive principals, sign. A ledger record written before a signing failure
//! is kept; it is the audit trace of the attempt.

use std::sync::Arc;

use axum::http::HeaderMap;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use ks_types::{CertClass, IdentityClaim};
use ssh_core::keys::{fingerprint, parse_authorized_key};
use ssh_key::Certificate;
use state_store::IssuanceLedger;
use tracing::info;

use crate::{authority::Authority, error::EnrollError, identity, tls::PeerCertificates};

/// A signed certificate together with the facts logged about it.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub serial: u64,
    pub class: CertClass,
    pub identity: String,
    /// SHA-256 fingerprint of the subject public key.
    pub fingerprint: String,
    pub certificate: Certificate,
}

impl IssuedCertificate {
    /// `<key-type>-cert-v01@openssh.com <base64>\n`, ready to write next to the subject key.
    pub fn authorized_line(&self) -> Result<String, EnrollError> {
        let bytes = self.certificate.to_bytes()?;
        Ok(format!(
            "{} {}\n",
            self.certificate.algorithm().to_certificate_type(),
            STANDARD.encode(bytes)
        ))
    }
}

/// Entry point for both enrollment flows. Cheap to clone.
#[derive(Clone)]
pub struct Enroller {
    authority: Arc<Authority>,
    ledger: Arc<dyn IssuanceLedger>,
}

impl Enroller {
    pub fn new(authority: Arc<Authority>, ledger: Arc<dyn IssuanceLedger>) -> Self {
        Self { authority, ledger }
    }

    /// Issue a host certificate for `hostname` to a client holding a matching TLS certificate.
    pub async fn enroll_host(
        &self,
        evidence: &PeerCertificates,
        hostname: &str,
        body: &[u8],
    ) -> Result<IssuedCertificate, EnrollError> {
        let claim = identity::authorize_host(evidence, hostname)?;
        self.issue(claim, body).await
    }

    /// Issue a user certificate for the username asserted by the authenticating proxy.
    pub async fn enroll_user(
        &self,
        evidence: &PeerCertificates,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<IssuedCertificate, EnrollError> {
        let claim = identity::authorize_proxy_user(self.authority.proxy(), evidence, headers)?;
        self.issue(claim, body).await
    }

    async fn issue(&self, claim: IdentityClaim, body: &[u8]) -> Result<IssuedCertificate, EnrollError> {
        let public_key = parse_authorized_key(body).map_err(EnrollError::BadRequest)?;
        let key_bytes = public_key.to_bytes()?;
        let key_fingerprint = fingerprint(&public_key);

        let IdentityClaim { identity, class } = claim;
        let serial = self.ledger.record_issuance(class, &identity, &key_bytes).await?;

        let policy = self.authority.policy();
        let principals = policy.derive_principals(class, &identity);
        let extensions = policy.derive_extensions(class);

        let signer = self.authority.signer().clone();
        let (identity, certificate) = tokio::task::spawn_blocking(move || {
            let certificate = signer.sign(&identity, principals, serial, class, &public_key, extensions);
            (identity, certificate)
        })
        .await
        .map_err(|e| EnrollError::Signing(format!("signing task failed: {e}")))?;
        let certificate = certificate?;

        let issued = IssuedCertificate {
            serial,
            class,
            fingerprint: key_fingerprint,
            identity,
            certificate,
        };
        match class {
            CertClass::Host => info!(
                hostname = %issued.identity,
                serial,
                fingerprint = %issued.fingerprint,
                "issued host certificate"
            ),
            CertClass::User => info!(
                user = %issued.identity,
                key_type = %issued.certificate.algorithm(),
                serial,
                fingerprint = %issued.fingerprint,
                "issued user certificate"
            ),
        }
        Ok(issued)
    }
}

impl std::fmt::Debug for Enroller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enroller")
            .field("authority", &self.authority)
            .finish_non_exhaustive()
    }
}
