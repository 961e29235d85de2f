//! Certificate classes and issuance records.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The two kinds of certificate the authority issues.
///
/// Numeric values follow the OpenSSH certificate wire format
/// (`SSH_CERT_TYPE_USER = 1`, `SSH_CERT_TYPE_HOST = 2`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertClass {
    Host,
    User,
}

/// A numeric certificate type outside the OpenSSH user/host range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown certificate type {0}")]
pub struct UnknownCertClass(pub u32);

impl CertClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertClass::Host => "host",
            CertClass::User => "user",
        }
    }

    /// Wire value used in the certificate body and in the ledger.
    pub fn wire_value(&self) -> u32 {
        match self {
            CertClass::User => 1,
            CertClass::Host => 2,
        }
    }
}

impl TryFrom<u32> for CertClass {
    type Error = UnknownCertClass;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CertClass::User),
            2 => Ok(CertClass::Host),
            other => Err(UnknownCertClass(other)),
        }
    }
}

impl fmt::Display for CertClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity a request is entitled to act as, produced once per request by the
/// identity resolver and never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityClaim {
    /// Hostname (host flow) or username (proxy flow).
    pub identity: String,
    pub class: CertClass,
}

impl IdentityClaim {
    pub fn host(hostname: impl Into<String>) -> Self {
        Self {
            identity: hostname.into(),
            class: CertClass::Host,
        }
    }

    pub fn user(username: impl Into<String>) -> Self {
        Self {
            identity: username.into(),
            class: CertClass::User,
        }
    }
}

/// One row of the issuance ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceRecord {
    /// Unique serial, allocated by the ledger.
    pub serial: u64,
    pub class: CertClass,
    /// Hostname or username the certificate was issued to.
    pub identity: String,
    /// Requested public key in SSH wire encoding.
    pub public_key: Vec<u8>,
    /// Unix timestamp (seconds) of the issuance.
    pub issued_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_match_openssh() {
        assert_eq!(CertClass::User.wire_value(), 1);
        assert_eq!(CertClass::Host.wire_value(), 2);
        assert_eq!(CertClass::try_from(2), Ok(CertClass::Host));
        assert_eq!(CertClass::try_from(1), Ok(CertClass::User));
    }

    #[test]
    fn unknown_wire_value_is_rejected() {
        assert_eq!(CertClass::try_from(0), Err(UnknownCertClass(0)));
        assert_eq!(CertClass::try_from(3).unwrap_err().to_string(), "unknown certificate type 3");
    }
}
