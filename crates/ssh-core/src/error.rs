use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or parsing SSH key material
#[derive(Error, Debug)]
pub enum SshCoreError {
    /// Reading a key file failed
    #[error("failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encrypted private key without a passphrase
    #[error("encrypted private key requires a passphrase")]
    PassphraseRequired,

    /// Input is not valid UTF-8 text
    #[error("key material is not valid UTF-8")]
    NotUtf8,

    /// No key line found in authorized-key input
    #[error("no public key found in input")]
    NoPublicKey,

    /// Key material in a format we do not understand
    #[error("unsupported key format: {0}")]
    UnsupportedFormat(String),

    /// Error reported by the ssh-key crate
    #[error("SSH key error: {0}")]
    SshKey(#[from] ssh_key::Error),
}

/// Result type alias for SSH key operations
pub type SshResult<T> = Result<T, SshCoreError>;
