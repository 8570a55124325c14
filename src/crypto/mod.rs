//! Cryptography module for imvault
//!
//! Provides AES-256-GCM chunked encryption with Argon2id (or scrypt)
//! key derivation. The .imv on-disk layout is defined here; all
//! multi-byte integers in the format are little-endian.

mod cipher;
mod kdf;

pub use cipher::{Header, ImvCipher};
pub use kdf::{Argon2Kdf, KdfProvider, ScryptKdf};

/// Size of AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Size of salt for key derivation
pub const SALT_SIZE: usize = 16;

/// Magic bytes identifying the .imv format family
pub const MAGIC: &[u8; 8] = b"IMVAULT1";

/// Legacy single-block format
pub const VERSION_LEGACY: u16 = 1;

/// Chunked format; the only version written by this crate
pub const VERSION_CHUNKED: u16 = 2;

/// Fixed header size: magic + version + salt + base nonce
pub const HEADER_SIZE: usize = MAGIC.len() + 2 + SALT_SIZE + NONCE_SIZE;
