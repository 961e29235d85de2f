//! Shared fixtures for server-core integration tests.
//!
//! Each fixture owns a fresh migrated SQLite ledger, a random Ed25519 CA key
//! and an [`Enroller`] wired to both.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use ks_types::config::AuthenticatingProxy;
use server_core::{
    Authority, Enroller, PeerCertificates,
    policy::PrincipalPolicy,
    signer::{CaSigner, ValidityPeriods},
};
use ssh_key::{Algorithm, PrivateKey, PublicKey, rand_core::OsRng};
use state_store::{DbHandle, IssuanceLedger, test_support::SqliteTestDbFactory};
use tower::ServiceExt;

pub const PROXY_HOST: &str = "proxy.example.com";
pub const USER_HEADER: &str = "X-Forwarded-User";

pub struct Fixture {
    pub enroller: Enroller,
    pub ledger: DbHandle,
    pub ca_public: PublicKey,
    _factory: SqliteTestDbFactory,
}

impl Fixture {
    pub fn app(&self) -> Router {
        server_core::api::routes(self.enroller.clone())
    }
}

pub struct FixtureBuilder {
    ca_key: Option<PrivateKey>,
    proxy: bool,
    user_extensions: Vec<String>,
    connections: u32,
}

impl Default for FixtureBuilder {
    fn default() -> Self {
        Self {
            ca_key: None,
            proxy: true,
            user_extensions: vec!["permit-pty".to_string(), "permit-port-forwarding".to_string()],
            connections: 1,
        }
    }
}

impl FixtureBuilder {
    pub fn without_proxy(mut self) -> Self {
        self.proxy = false;
        self
    }

    /// Sign with `key` instead of a fresh Ed25519 CA key.
    pub fn ca_key(mut self, key: PrivateKey) -> Self {
        self.ca_key = Some(key);
        self
    }

    pub fn connections(mut self, connections: u32) -> Self {
        self.connections = connections;
        self
    }

    pub async fn build(self) -> Result<Fixture> {
        let factory = SqliteTestDbFactory::new();
        let ledger = factory.ledger_with_connections(self.connections).await?;
        let authority = self.authority()?;
        let ca_public = authority.signer().public_key().clone();
        let enroller = Enroller::new(Arc::new(authority), Arc::new(ledger.clone()));
        Ok(Fixture {
            enroller,
            ledger,
            ca_public,
            _factory: factory,
        })
    }

    /// Build with a caller-supplied ledger instead of SQLite.
    pub fn build_with_ledger(self, ledger: Arc<dyn IssuanceLedger>) -> Result<Enroller> {
        Ok(Enroller::new(Arc::new(self.authority()?), ledger))
    }

    fn authority(&self) -> Result<Authority> {
        let ca_key = match &self.ca_key {
            Some(key) => key.clone(),
            None => PrivateKey::random(&mut OsRng, Algorithm::Ed25519)?,
        };
        let mut aliases = HashMap::new();
        aliases.insert(
            "host.example.com".to_string(),
            vec!["a.example.com".to_string(), "b.example.com".to_string()],
        );
        aliases.insert("alice".to_string(), vec!["root".to_string()]);
        let policy = PrincipalPolicy::new(Some(".example.com".to_string()), aliases, self.user_extensions.clone());
        let proxy = self.proxy.then(|| AuthenticatingProxy {
            hostname: PROXY_HOST.to_string(),
            username_header: USER_HEADER.to_string(),
        });
        Ok(Authority::new(
            CaSigner::new(ca_key, ValidityPeriods::parse("168h", "24h")?),
            policy,
            proxy,
        ))
    }
}

/// A client certificate chain whose leaf carries the given SAN entries.
pub fn peer_chain(names: &[&str]) -> Result<PeerCertificates> {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    let leaf = rcgen::generate_simple_self_signed(names)?;
    Ok(PeerCertificates::new(vec![leaf.cert.der().clone()]))
}

/// A fresh client key and its authorized-key line.
pub fn client_key() -> Result<(PublicKey, String)> {
    let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)?;
    let line = key.public_key().to_openssh()?;
    Ok((key.public_key().clone(), format!("{line}\n")))
}

/// POST `body` to `uri`, optionally attaching transport evidence and one header.
pub async fn post(
    app: Router,
    uri: &str,
    body: impl Into<Body>,
    evidence: Option<PeerCertificates>,
    header: Option<(&str, &str)>,
) -> Result<(StatusCode, String)> {
    let mut request = Request::builder().method("POST").uri(uri);
    if let Some((name, value)) = header {
        request = request.header(name, value);
    }
    let mut request = request.body(body.into())?;
    if let Some(evidence) = evidence {
        request.extensions_mut().insert(evidence);
    }

    let response = app.oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, String::from_utf8(bytes.to_vec())?))
}

/// Log output captured from a thread-local subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Install a subscriber on the current thread; logs are kept until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
