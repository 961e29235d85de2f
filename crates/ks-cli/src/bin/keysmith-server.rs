use anyhow::{Context, Result};
use clap::Parser;
use ks_cli::{
    init_tracing,
    server_cli::{ServerArgs, ServerSubcommand},
};
use server_core::config::load_config;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    let config = load_config(&args.config).with_context(|| format!("loading {}", args.config.display()))?;
    let config = args.apply_overrides(config);

    init_tracing(&config.log_level);

    match args.cmd.unwrap_or(ServerSubcommand::Start) {
        ServerSubcommand::Start => {
            info!(config = %args.config.display(), "starting keysmith-server");
            server_core::run_server(config).await?;
        }
        ServerSubcommand::Migrate => {
            let db = state_store::connect(&config.db).await?;
            state_store::migrate(&db).await?;
            info!(ledger = %state_store::display_path(&db), "ledger migrations applied");
            db.close().await;
        }
    }
    Ok(())
}
