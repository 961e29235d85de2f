//! Certificate issuance engine and its HTTPS front end.
//!
//! The request pipeline lives in [`enroll`]; [`run_server`] wires configuration,
//! ledger, authority and the TLS listener together for the binary.

pub mod api;
pub mod authority;
pub mod config;
pub mod enroll;
pub mod error;
pub mod identity;
pub mod policy;
pub mod signer;
pub mod tls;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::Handle;
use ks_types::config::Config;
use state_store::IssuanceLedger;
use tracing::{info, warn};

pub use authority::Authority;
pub use enroll::{Enroller, IssuedCertificate};
pub use error::{EnrollError, ServerError, ServerResult};
pub use tls::PeerCertificates;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Connect and migrate the ledger, build the authority and serve until Ctrl-C.
pub async fn run_server(config: Config) -> ServerResult<()> {
    let db = state_store::connect(&config.db).await?;
    state_store::migrate(&db).await?;
    info!(ledger = %state_store::display_path(&db), "issuance ledger ready");

    let authority = Authority::from_config(&config)?;
    let ledger: Arc<dyn IssuanceLedger> = Arc::new(db.clone());
    let result = serve(&config, authority, ledger).await;
    db.close().await;
    result
}

/// Serve the enrollment API over HTTPS with the given authority and ledger.
pub async fn serve(config: &Config, authority: Authority, ledger: Arc<dyn IssuanceLedger>) -> ServerResult<()> {
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .map_err(|e| ServerError::invalid_config(format!("listen_addr `{}`: {e}", config.listen_addr)))?;
    let request_timeout = config::parse_request_timeout(&config.request_timeout)?;
    let tls = tls::load_server_config(&config.tls)?;

    let app = api::router(Enroller::new(Arc::new(authority), ledger), request_timeout);

    let handle = Handle::new();
    tokio::spawn(shutdown_on_ctrl_c(handle.clone()));

    info!(%addr, "listening for enrollment requests");
    axum_server::bind(addr)
        .acceptor(tls::PeerCertAcceptor::new(tls))
        .handle(handle)
        .serve(app.into_make_service())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_on_ctrl_c(handle: Handle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c; shutdown must be forced");
        return;
    }
    info!("shutdown requested");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
