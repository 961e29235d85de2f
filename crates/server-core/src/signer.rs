//! Certificate construction and signing.
//!
//! [`CaSigner`] is the only holder of the CA private key. It is `Send + Sync`
//! and clones share the key: signing reads the key and never mutates it, so
//! concurrent requests sign in parallel without a lock.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use ks_types::CertClass;
use ssh_key::{
    Certificate, PrivateKey, PublicKey,
    certificate::{Builder, CertType},
    rand_core::{OsRng, RngCore},
};

use crate::error::{EnrollError, ServerError, ServerResult};

/// Nonce length embedded in every certificate.
pub const NONCE_LEN: usize = 32;

/// Certificate lifetimes per class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidityPeriods {
    pub host: Duration,
    pub user: Duration,
}

impl ValidityPeriods {
    /// Parse duration strings such as `"168h"` or `"1h 30m"`.
    ///
    /// Each period must be at least one second, since certificate timestamps
    /// have one-second resolution and the window must not be empty.
    pub fn parse(host: &str, user: &str) -> ServerResult<Self> {
        Ok(Self {
            host: parse_period("host_cert_duration", host)?,
            user: parse_period("user_cert_duration", user)?,
        })
    }

    pub fn for_class(&self, class: CertClass) -> Duration {
        match class {
            CertClass::Host => self.host,
            CertClass::User => self.user,
        }
    }
}

fn parse_period(field: &str, value: &str) -> ServerResult<Duration> {
    let period = humantime::parse_duration(value.trim())
        .map_err(|e| ServerError::invalid_config(format!("{field} `{value}`: {e}")))?;
    if period.as_secs() == 0 {
        return Err(ServerError::invalid_config(format!(
            "{field} `{value}` must be at least one second"
        )));
    }
    Ok(period)
}

/// Everything that goes into one certificate, assembled before signing.
#[derive(Clone, Debug)]
pub struct CertificateTemplate {
    pub nonce: [u8; NONCE_LEN],
    pub public_key: PublicKey,
    pub serial: u64,
    pub class: CertClass,
    pub key_id: String,
    pub principals: Vec<String>,
    pub valid_after: u64,
    pub valid_before: u64,
    /// Always empty for host certificates.
    pub extensions: BTreeMap<String, String>,
}

impl CertificateTemplate {
    /// Sign the template with the CA key.
    pub fn sign(&self, ca_key: &PrivateKey) -> Result<Certificate, EnrollError> {
        if self.valid_after >= self.valid_before {
            return Err(EnrollError::Signing(format!(
                "empty validity window {}..{}",
                self.valid_after, self.valid_before
            )));
        }

        let mut builder = Builder::new(
            self.nonce.to_vec(),
            self.public_key.key_data().clone(),
            self.valid_after,
            self.valid_before,
        )?;
        builder
            .serial(self.serial)?
            .cert_type(cert_type(self.class))?
            .key_id(self.key_id.clone())?;
        for principal in &self.principals {
            builder.valid_principal(principal.clone())?;
        }
        if self.class == CertClass::User {
            for (name, value) in &self.extensions {
                builder.extension(name.clone(), value.clone())?;
            }
        }

        Ok(builder.sign(ca_key)?)
    }
}

/// Signing capability wrapping the CA key and the configured lifetimes.
#[derive(Clone)]
pub struct CaSigner {
    key: Arc<PrivateKey>,
    validity: ValidityPeriods,
}

impl CaSigner {
    pub fn new(key: PrivateKey, validity: ValidityPeriods) -> Self {
        Self {
            key: Arc::new(key),
            validity,
        }
    }

    /// Public half of the CA key, as clients configure it in `known_hosts` / `TrustedUserCAKeys`.
    pub fn public_key(&self) -> &PublicKey {
        self.key.public_key()
    }

    pub fn validity(&self) -> ValidityPeriods {
        self.validity
    }

    /// Build the template for one certificate: fresh nonce, window starting now.
    pub fn template(
        &self,
        key_id: &str,
        principals: Vec<String>,
        serial: u64,
        class: CertClass,
        public_key: &PublicKey,
        extensions: BTreeMap<String, String>,
    ) -> Result<CertificateTemplate, EnrollError> {
        let nonce = fill_nonce(&mut OsRng)?;
        let valid_after = chrono::Utc::now().timestamp().max(0) as u64;
        let valid_before = valid_after.saturating_add(self.validity.for_class(class).as_secs());

        Ok(CertificateTemplate {
            nonce,
            public_key: public_key.clone(),
            serial,
            class,
            key_id: key_id.to_string(),
            principals,
            valid_after,
            valid_before,
            extensions: match class {
                CertClass::User => extensions,
                CertClass::Host => BTreeMap::new(),
            },
        })
    }

    /// Build and sign a certificate in one step.
    pub fn sign(
        &self,
        key_id: &str,
        principals: Vec<String>,
        serial: u64,
        class: CertClass,
        public_key: &PublicKey,
        extensions: BTreeMap<String, String>,
    ) -> Result<Certificate, EnrollError> {
        self.template(key_id, principals, serial, class, public_key, extensions)?
            .sign(&self.key)
    }
}

impl std::fmt::Debug for CaSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaSigner")
            .field("algorithm", &self.key.algorithm())
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

/// Read a nonce from `rng`. A failing source aborts the request; there is no fallback.
pub(crate) fn fill_nonce(rng: &mut impl RngCore) -> Result<[u8; NONCE_LEN], EnrollError> {
    let mut nonce = [0u8; NONCE_LEN];
    rng.try_fill_bytes(&mut nonce)
        .map_err(|e| EnrollError::Crypto(e.to_string()))?;
    Ok(nonce)
}

fn cert_type(class: CertClass) -> CertType {
    match class {
        CertClass::Host => CertType::Host,
        CertClass::User => CertType::User,
    }
}
