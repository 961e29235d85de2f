//! HTTPS listener plumbing: rustls configuration and per-connection peer evidence.

use std::{convert::Infallible, io, path::Path, sync::Arc};

use axum::{Extension, extract::FromRequestParts, http::request::Parts, middleware::AddExtension};
use axum_server::{
    accept::Accept,
    tls_rustls::{RustlsAcceptor, RustlsConfig},
};
use futures_util::future::BoxFuture;
use ks_types::config::TlsConfig;
use rustls::{
    RootCertStore, ServerConfig,
    crypto::{CryptoProvider, ring},
    pki_types::{CertificateDer, PrivateKeyDer, pem::PemObject},
    server::WebPkiClientVerifier,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::server::TlsStream;
use tower::Layer;

use crate::error::{ServerError, ServerResult};

/// Client certificate chain verified during the TLS handshake, leaf first.
///
/// Empty when the client presented no certificate. Handlers receive this as
/// an extractor; requests that did not pass through [`PeerCertAcceptor`]
/// see an empty chain.
#[derive(Clone, Debug, Default)]
pub struct PeerCertificates(Arc<Vec<CertificateDer<'static>>>);

impl PeerCertificates {
    pub fn new(chain: Vec<CertificateDer<'static>>) -> Self {
        Self(Arc::new(chain))
    }

    pub fn leaf(&self) -> Option<&CertificateDer<'static>> {
        self.0.first()
    }
}

impl<S> FromRequestParts<S> for PeerCertificates
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<PeerCertificates>().cloned().unwrap_or_default())
    }
}

/// rustls acceptor that attaches the verified peer chain to every request
/// served on the connection.
#[derive(Clone)]
pub struct PeerCertAcceptor {
    inner: RustlsAcceptor,
}

impl PeerCertAcceptor {
    pub fn new(config: RustlsConfig) -> Self {
        Self {
            inner: RustlsAcceptor::new(config),
        }
    }
}

impl<I, S> Accept<I, S> for PeerCertAcceptor
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    S: Send + 'static,
{
    type Stream = TlsStream<I>;
    type Service = AddExtension<S, PeerCertificates>;
    type Future = BoxFuture<'static, io::Result<(Self::Stream, Self::Service)>>;

    fn accept(&self, stream: I, service: S) -> Self::Future {
        let acceptor = self.inner.clone();
        Box::pin(async move {
            let (stream, service) = acceptor.accept(stream, service).await?;
            let chain = stream
                .get_ref()
                .1
                .peer_certificates()
                .map(<[CertificateDer<'static>]>::to_vec)
                .unwrap_or_default();
            tracing::trace!(chain_len = chain.len(), "tls handshake complete");
            let service = Extension(PeerCertificates::new(chain)).layer(service);
            Ok((stream, service))
        })
    }
}

/// Build the listener's rustls configuration.
///
/// Client certificates are requested and verified against the `ca` bundle
/// but not required; handlers reject requests that arrive without one.
pub fn load_server_config(tls: &TlsConfig) -> ServerResult<RustlsConfig> {
    let provider = Arc::new(ring::default_provider());
    let config = build_server_config(tls, provider)?;
    Ok(RustlsConfig::from_config(Arc::new(config)))
}

fn build_server_config(tls: &TlsConfig, provider: Arc<CryptoProvider>) -> ServerResult<ServerConfig> {
    let mut roots = RootCertStore::empty();
    for cert in read_certificates(&tls.ca)? {
        roots
            .add(cert)
            .map_err(|e| ServerError::tls(format!("client CA {}: {e}", tls.ca.display())))?;
    }
    if roots.is_empty() {
        return Err(ServerError::tls(format!(
            "client CA bundle {} contains no certificates",
            tls.ca.display()
        )));
    }

    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
        .allow_unauthenticated()
        .build()
        .map_err(|e| ServerError::tls(format!("client verifier: {e}")))?;

    let chain = read_certificates(&tls.cert)?;
    if chain.is_empty() {
        return Err(ServerError::tls(format!(
            "server certificate {} contains no certificates",
            tls.cert.display()
        )));
    }
    let key = PrivateKeyDer::from_pem_file(&tls.key)
        .map_err(|e| ServerError::tls(format!("server key {}: {e}", tls.key.display())))?;

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ServerError::tls(e.to_string()))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, key)
        .map_err(|e| ServerError::tls(format!("server certificate/key: {e}")))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(config)
}

fn read_certificates(path: &Path) -> ServerResult<Vec<CertificateDer<'static>>> {
    CertificateDer::pem_file_iter(path)
        .and_then(|certs| certs.collect::<Result<Vec<_>, _>>())
        .map_err(|e| ServerError::tls(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rcgen::{BasicConstraints, CertificateParams, IsCa, KeyPair};

    use super::*;

    fn write_material(dir: &Path) -> TlsConfig {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca = ca_params.self_signed(&ca_key).unwrap();

        let server_key = KeyPair::generate().unwrap();
        let server = CertificateParams::new(vec!["localhost".to_string()])
            .unwrap()
            .signed_by(&server_key, &ca, &ca_key)
            .unwrap();

        let tls = TlsConfig {
            ca: dir.join("ca.pem"),
            cert: dir.join("server.pem"),
            key: dir.join("server.key"),
        };
        fs::write(&tls.ca, ca.pem()).unwrap();
        fs::write(&tls.cert, server.pem()).unwrap();
        fs::write(&tls.key, server_key.serialize_pem()).unwrap();
        tls
    }

    #[test]
    fn builds_config_from_pem_material() {
        let dir = tempfile::tempdir().unwrap();
        let tls = write_material(dir.path());
        let config = build_server_config(&tls, Arc::new(ring::default_provider())).unwrap();
        assert_eq!(config.alpn_protocols.len(), 2);
    }

    #[test]
    fn empty_ca_bundle_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tls = write_material(dir.path());
        fs::write(&tls.ca, "").unwrap();
        let err = build_server_config(&tls, Arc::new(ring::default_provider())).unwrap_err();
        assert!(matches!(err, ServerError::Tls(_)));
    }

    #[test]
    fn missing_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut tls = write_material(dir.path());
        tls.key = dir.path().join("absent.key");
        assert!(build_server_config(&tls, Arc::new(ring::default_provider())).is_err());
    }

    #[test]
    fn peer_certificates_accessors() {
        assert!(PeerCertificates::default().leaf().is_none());

        let chain = PeerCertificates::new(vec![CertificateDer::from(vec![1u8]), CertificateDer::from(vec![2u8])]);
        assert_eq!(chain.leaf().map(|c| c.as_ref()), Some(&[1u8][..]));
    }
}
