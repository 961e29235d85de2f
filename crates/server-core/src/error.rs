use std::path::PathBuf;

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use ks_types::UnknownCertClass;
use thiserror::Error;

/// Startup and configuration failures.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("SSH key error: {0}")]
    SshKey(#[from] ssh_core::SshCoreError),

    #[error("Ledger error: {0}")]
    StateStore(#[from] state_store::DbError),

    #[error("TLS error: {0}")]
    Tls(String),
}

impl ServerError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn tls(msg: impl Into<String>) -> Self {
        Self::Tls(msg.into())
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Failures of a single enrollment request.
///
/// Every variant maps to exactly one HTTP status. Internal variants render a
/// generic body; their detail only reaches the server log.
#[derive(Error, Debug)]
pub enum EnrollError {
    /// No verified client certificate, proxy not authenticated, or missing username header.
    #[error("{0}")]
    Unauthenticated(&'static str),

    /// Verified client certificate does not cover the claimed hostname.
    #[error("{0}")]
    Forbidden(&'static str),

    /// User enrollment requested but no authenticating proxy is configured.
    #[error("user enrollment is not configured")]
    NotConfigured,

    /// Request body is not a parseable public key.
    #[error("invalid public key: {0}")]
    BadRequest(#[source] ssh_core::SshCoreError),

    #[error("ledger write failed: {0}")]
    Storage(#[from] state_store::DbError),

    #[error("secure random source failed: {0}")]
    Crypto(String),

    #[error("certificate signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    InvalidCertType(#[from] UnknownCertClass),
}

impl EnrollError {
    pub fn status(&self) -> StatusCode {
        match self {
            EnrollError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            EnrollError::Forbidden(_) => StatusCode::FORBIDDEN,
            EnrollError::NotConfigured => StatusCode::NOT_FOUND,
            EnrollError::BadRequest(_) => StatusCode::BAD_REQUEST,
            EnrollError::Storage(_)
            | EnrollError::Crypto(_)
            | EnrollError::Signing(_)
            | EnrollError::InvalidCertType(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status().is_server_error()
    }

    /// Message safe to return to the caller.
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "internal error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<ssh_key::Error> for EnrollError {
    fn from(e: ssh_key::Error) -> Self {
        Self::Signing(e.to_string())
    }
}

impl IntoResponse for EnrollError {
    fn into_response(self) -> Response {
        let body = format!("{}\n", self.public_message());
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(EnrollError::Unauthenticated("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(EnrollError::Forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(EnrollError::NotConfigured.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            EnrollError::BadRequest(ssh_core::SshCoreError::NoPublicKey).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(EnrollError::Crypto("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(EnrollError::Signing("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            EnrollError::InvalidCertType(UnknownCertClass(9)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            EnrollError::Storage(state_store::DbError::TaskPanicked("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = EnrollError::Storage(state_store::DbError::InvalidUrl("mysql://secret-host".into()));
        assert_eq!(err.public_message(), "internal error");
        assert!(err.to_string().contains("secret-host"));

        let err = EnrollError::Forbidden("hostname does not match certificate");
        assert_eq!(err.public_message(), "hostname does not match certificate");
    }
}
