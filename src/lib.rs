//! imvault - Encrypted single-file archives for message conversations
//!
//! Bundles conversations (JSON metadata plus attachment files) into a
//! gzip-compressed tar payload and encrypts it into a single `.imv` file
//! with a password-derived key: Argon2id (or scrypt) into AES-256-GCM,
//! chunked, with every chunk bound to the file header and its own index.

pub mod archive;
pub mod config;
pub mod container;
pub mod crypto;
pub mod error;
pub mod record;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::archive::ArchiveBuilder;
    pub use crate::config::Config;
    pub use crate::crypto::ImvCipher;
    pub use crate::error::{Error, Result};
    pub use crate::store::RecordStore;
}
