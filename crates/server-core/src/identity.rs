//! Identity resolution from transport evidence.
//!
//! The TLS layer has already verified the peer chain against the client CA
//! bundle. This module only decides which identity that chain entitles the
//! request to claim.

use std::net::IpAddr;

use axum::http::HeaderMap;
use ks_types::{IdentityClaim, config::AuthenticatingProxy};
use x509_parser::{extensions::GeneralName, parse_x509_certificate};

use crate::{error::EnrollError, tls::PeerCertificates};

const NO_CLIENT_CERT: &str = "no client certificate provided";
const HOSTNAME_MISMATCH: &str = "hostname does not match certificate";
const NOT_FROM_PROXY: &str = "request didn't come from proxy";
const NO_USERNAME: &str = "no username supplied";

/// Authorize a host to enroll as `hostname`.
pub fn authorize_host(evidence: &PeerCertificates, hostname: &str) -> Result<IdentityClaim, EnrollError> {
    let Some(leaf) = evidence.leaf() else {
        return Err(EnrollError::Unauthenticated(NO_CLIENT_CERT));
    };
    if !leaf_matches_hostname(leaf, hostname) {
        return Err(EnrollError::Forbidden(HOSTNAME_MISMATCH));
    }
    Ok(IdentityClaim::host(hostname))
}

/// Authorize a user asserted by the authenticating proxy.
///
/// The username header is only read after the connection has been shown to
/// come from the configured proxy.
pub fn authorize_proxy_user(
    proxy: Option<&AuthenticatingProxy>,
    evidence: &PeerCertificates,
    headers: &HeaderMap,
) -> Result<IdentityClaim, EnrollError> {
    let proxy = proxy.ok_or(EnrollError::NotConfigured)?;

    let from_proxy = evidence
        .leaf()
        .is_some_and(|leaf| leaf_matches_hostname(leaf, &proxy.hostname));
    if !from_proxy {
        return Err(EnrollError::Unauthenticated(NOT_FROM_PROXY));
    }

    let username = headers
        .get(proxy.username_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();
    if username.is_empty() {
        return Err(EnrollError::Unauthenticated(NO_USERNAME));
    }

    Ok(IdentityClaim::user(username))
}

/// Check a DER leaf certificate's subject alternative names against `hostname`.
///
/// Common Name is never consulted. A leaf that fails to parse does not match.
pub fn leaf_matches_hostname(leaf_der: &[u8], hostname: &str) -> bool {
    let Ok((_, cert)) = parse_x509_certificate(leaf_der) else {
        return false;
    };
    let Ok(Some(san)) = cert.subject_alternative_name() else {
        return false;
    };

    let names = &san.value.general_names;
    match hostname.parse::<IpAddr>() {
        Ok(ip) => names.iter().any(|name| match name {
            GeneralName::IPAddress(bytes) => ip_matches(&ip, bytes),
            _ => false,
        }),
        Err(_) => names.iter().any(|name| match name {
            GeneralName::DNSName(pattern) => dns_matches(pattern, hostname),
            _ => false,
        }),
    }
}

fn ip_matches(ip: &IpAddr, san: &[u8]) -> bool {
    match ip {
        IpAddr::V4(v4) => san == v4.octets(),
        IpAddr::V6(v6) => san == v6.octets(),
    }
}

fn dns_matches(pattern: &str, hostname: &str) -> bool {
    let pattern = pattern.trim_end_matches('.');
    let hostname = hostname.trim_end_matches('.');
    if pattern.is_empty() || hostname.is_empty() {
        return false;
    }

    match pattern.strip_prefix("*.") {
        Some(base) => match hostname.split_once('.') {
            Some((label, rest)) => !label.is_empty() && !base.is_empty() && rest.eq_ignore_ascii_case(base),
            None => false,
        },
        None => pattern.eq_ignore_ascii_case(hostname),
    }
}
