//! Password key derivation for imvault
//!
//! Two memory-hard KDFs sit behind the [`KdfProvider`] trait: Argon2id
//! (primary) and scrypt (fallback, configured for comparable cost). The
//! provider is chosen once when the cipher is built; encrypt/decrypt never
//! perform any algorithm probing of their own.

use crate::config::KdfConfig;
use crate::crypto::{KEY_SIZE, SALT_SIZE};
use crate::error::{Error, Result};
use zeroize::Zeroizing;

/// A password-based key derivation backend
///
/// Derivation is deterministic: identical (password, salt) inputs always
/// produce identical keys. Failures are parameter-construction problems,
/// which are configuration errors, not per-call conditions.
pub trait KdfProvider: Send + Sync {
    /// Derive a 256-bit key from a password and salt
    fn derive(&self, password: &str, salt: &[u8; SALT_SIZE]) -> Result<Zeroizing<[u8; KEY_SIZE]>>;

    /// Name of the backing algorithm, for logging
    fn name(&self) -> &'static str;
}

/// Argon2id key derivation
pub struct Argon2Kdf {
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
}

impl Argon2Kdf {
    pub fn new(config: &KdfConfig) -> Self {
        Argon2Kdf {
            memory_kib: config.argon2_memory_kib,
            iterations: config.argon2_iterations,
            parallelism: config.argon2_parallelism,
        }
    }
}

impl KdfProvider for Argon2Kdf {
    fn derive(&self, password: &str, salt: &[u8; SALT_SIZE]) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        let params = argon2::Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| Error::KeyDerivation(format!("invalid Argon2 parameters: {}", e)))?;

        let argon2 = argon2::Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            params,
        );

        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        argon2
            .hash_password_into(password.as_bytes(), salt, key.as_mut())
            .map_err(|e| Error::KeyDerivation(format!("Argon2 derivation failed: {}", e)))?;

        Ok(key)
    }

    fn name(&self) -> &'static str {
        "argon2id"
    }
}

/// scrypt key derivation (fallback)
pub struct ScryptKdf {
    log_n: u8,
    r: u32,
    p: u32,
}

impl ScryptKdf {
    pub fn new(config: &KdfConfig) -> Self {
        ScryptKdf {
            log_n: config.scrypt_log_n,
            r: config.scrypt_r,
            p: config.scrypt_p,
        }
    }
}

impl KdfProvider for ScryptKdf {
    fn derive(&self, password: &str, salt: &[u8; SALT_SIZE]) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        let params = scrypt::Params::new(self.log_n, self.r, self.p, KEY_SIZE)
            .map_err(|e| Error::KeyDerivation(format!("invalid scrypt parameters: {}", e)))?;

        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        scrypt::scrypt(password.as_bytes(), salt, &params, key.as_mut())
            .map_err(|e| Error::KeyDerivation(format!("scrypt derivation failed: {}", e)))?;

        Ok(key)
    }

    fn name(&self) -> &'static str {
        "scrypt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KdfConfig;

    // Low-cost parameters so the tests stay fast
    fn test_config() -> KdfConfig {
        KdfConfig {
            argon2_memory_kib: 1024,
            argon2_iterations: 1,
            argon2_parallelism: 1,
            scrypt_log_n: 10,
            scrypt_r: 8,
            scrypt_p: 1,
            ..KdfConfig::default()
        }
    }

    #[test]
    fn test_argon2_deterministic() {
        let kdf = Argon2Kdf::new(&test_config());
        let salt = [7u8; SALT_SIZE];

        let key1 = kdf.derive("password", &salt).unwrap();
        let key2 = kdf.derive("password", &salt).unwrap();
        assert_eq!(*key1, *key2);
    }

    #[test]
    fn test_scrypt_deterministic() {
        let kdf = ScryptKdf::new(&test_config());
        let salt = [7u8; SALT_SIZE];

        let key1 = kdf.derive("password", &salt).unwrap();
        let key2 = kdf.derive("password", &salt).unwrap();
        assert_eq!(*key1, *key2);
    }

    #[test]
    fn test_different_salts_give_different_keys() {
        let kdf = Argon2Kdf::new(&test_config());

        let key1 = kdf.derive("password", &[1u8; SALT_SIZE]).unwrap();
        let key2 = kdf.derive("password", &[2u8; SALT_SIZE]).unwrap();
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn test_different_passwords_give_different_keys() {
        let kdf = Argon2Kdf::new(&test_config());
        let salt = [3u8; SALT_SIZE];

        let key1 = kdf.derive("password-a", &salt).unwrap();
        let key2 = kdf.derive("password-b", &salt).unwrap();
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn test_providers_disagree() {
        let config = test_config();
        let salt = [9u8; SALT_SIZE];

        let argon2_key = Argon2Kdf::new(&config).derive("pw", &salt).unwrap();
        let scrypt_key = ScryptKdf::new(&config).derive("pw", &salt).unwrap();
        assert_ne!(*argon2_key, *scrypt_key);
    }

    #[test]
    fn test_unicode_password() {
        let kdf = Argon2Kdf::new(&test_config());
        let salt = [4u8; SALT_SIZE];

        let key = kdf.derive("\u{1f512}\u{e9}\u{f1}\u{fc} secure", &salt).unwrap();
        assert_eq!(key.len(), KEY_SIZE);
    }
}
