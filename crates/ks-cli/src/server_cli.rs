use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ks_types::config::Config;

const DEFAULT_CONFIG_PATH: &str = "keysmith.toml";

#[derive(Debug, Parser)]
#[command(name = "keysmith-server", about = "SSH certificate authority issuing host and user certificates over HTTPS")]
pub struct ServerArgs {
    /// Path to the TOML configuration file
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
    /// Override `listen_addr` from the configuration
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    #[command(subcommand)]
    pub cmd: Option<ServerSubcommand>,
}

impl ServerArgs {
    /// Apply command-line overrides to a loaded configuration.
    pub fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(listen) = &self.listen {
            config.listen_addr = listen.clone();
        }
        config
    }
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum ServerSubcommand {
    /// Serve the enrollment API (default)
    Start,
    /// Apply ledger migrations and exit
    Migrate,
}
