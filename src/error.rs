//! Error types for imvault

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for imvault
///
/// Format errors are always detected before any cryptographic work.
/// All AEAD verification failures collapse into [`Error::Authentication`];
/// the message intentionally does not say whether the password was wrong
/// or the archive was tampered with.
#[derive(Error, Debug)]
pub enum Error {
    // Format errors (pre-crypto)
    #[error("File is too small to be a valid .imv archive")]
    TooSmall,

    #[error("Not an imvault archive (bad magic)")]
    BadMagic,

    #[error("Unsupported archive version {0} (expected 1 or 2)")]
    UnsupportedVersion(u16),

    #[error("Truncated archive at chunk {0}")]
    TruncatedArchive(u32),

    // Crypto errors
    #[error("Decryption failed: wrong password or corrupted archive")]
    Authentication,

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    // Record store errors
    #[error("Chat not found: {0}")]
    ChatNotFound(i64),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// True for errors raised while parsing the .imv framing, before any
    /// decryption attempt.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::TooSmall
                | Error::BadMagic
                | Error::UnsupportedVersion(_)
                | Error::TruncatedArchive(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
