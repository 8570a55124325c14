//! Configuration for imvault

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default maximum plaintext chunk size: 4MB.
///
/// Bounds per-chunk memory during encryption and decryption. Chunk lengths
/// are written explicitly into the .imv framing, so readers do not depend
/// on this value.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Default Argon2id memory cost: 64MB
pub const DEFAULT_ARGON2_MEMORY_KIB: u32 = 65536;

/// Default Argon2id iterations
pub const DEFAULT_ARGON2_ITERATIONS: u32 = 3;

/// Default Argon2id parallelism
pub const DEFAULT_ARGON2_PARALLELISM: u32 = 4;

/// Default scrypt cost exponent (N = 2^17), comparable work to the
/// Argon2id defaults
pub const DEFAULT_SCRYPT_LOG_N: u8 = 17;

/// Default scrypt block size
pub const DEFAULT_SCRYPT_R: u32 = 8;

/// Default scrypt parallelism
pub const DEFAULT_SCRYPT_P: u32 = 1;

/// Which password KDF to use
///
/// Selected once when the cipher is constructed, never probed at
/// encrypt/decrypt time. Argon2id is the default; scrypt is the fallback
/// for deployments that require it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KdfAlgorithm {
    #[default]
    Argon2id,
    Scrypt,
}

/// Key derivation parameters
///
/// Every field has a serde default so a config file may spell out only
/// the values it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfConfig {
    /// KDF algorithm selection
    #[serde(default)]
    pub algorithm: KdfAlgorithm,

    /// Argon2id memory cost in KiB
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2id iteration count
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2id lane count
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// scrypt cost exponent (N = 2^log_n)
    #[serde(default = "default_scrypt_log_n")]
    pub scrypt_log_n: u8,

    /// scrypt block size
    #[serde(default = "default_scrypt_r")]
    pub scrypt_r: u32,

    /// scrypt parallelism
    #[serde(default = "default_scrypt_p")]
    pub scrypt_p: u32,
}

fn default_argon2_memory_kib() -> u32 {
    DEFAULT_ARGON2_MEMORY_KIB
}

fn default_argon2_iterations() -> u32 {
    DEFAULT_ARGON2_ITERATIONS
}

fn default_argon2_parallelism() -> u32 {
    DEFAULT_ARGON2_PARALLELISM
}

fn default_scrypt_log_n() -> u8 {
    DEFAULT_SCRYPT_LOG_N
}

fn default_scrypt_r() -> u32 {
    DEFAULT_SCRYPT_R
}

fn default_scrypt_p() -> u32 {
    DEFAULT_SCRYPT_P
}

impl Default for KdfConfig {
    fn default() -> Self {
        KdfConfig {
            algorithm: KdfAlgorithm::default(),
            argon2_memory_kib: DEFAULT_ARGON2_MEMORY_KIB,
            argon2_iterations: DEFAULT_ARGON2_ITERATIONS,
            argon2_parallelism: DEFAULT_ARGON2_PARALLELISM,
            scrypt_log_n: DEFAULT_SCRYPT_LOG_N,
            scrypt_r: DEFAULT_SCRYPT_R,
            scrypt_p: DEFAULT_SCRYPT_P,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Key derivation parameters
    #[serde(default)]
    pub kdf: KdfConfig,

    /// Maximum plaintext bytes per encrypted chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

// A derived Default would zero chunk_size; the serde attributes only
// apply during deserialization.
impl Default for Config {
    fn default() -> Self {
        Config {
            kdf: KdfConfig::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be non-zero".to_string()));
        }
        if self.kdf.argon2_parallelism == 0 {
            return Err(Error::Config(
                "argon2_parallelism must be non-zero".to_string(),
            ));
        }
        if self.kdf.scrypt_log_n == 0 || self.kdf.scrypt_log_n > 63 {
            return Err(Error::Config(format!(
                "scrypt_log_n out of range: {}",
                self.kdf.scrypt_log_n
            )));
        }
        Ok(())
    }
}
