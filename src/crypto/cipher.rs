//! Chunked AES-256-GCM encryption for .imv archives
//!
//! On-disk layout (all integers little-endian):
//!
//! ```text
//! offset 0   magic        8 bytes   b"IMVAULT1"
//! offset 8   version      2 bytes   1 = legacy single block, 2 = chunked
//! offset 10  salt         16 bytes
//! offset 26  base nonce   12 bytes
//! offset 38  body
//! ```
//!
//! v2 body: `chunk_count (u32)` then per chunk `chunk_len (u32) || ciphertext`.
//! Chunk i is sealed with nonce = base nonce + i (96-bit little-endian add)
//! and AAD = header bytes || i. The header therefore binds salt, nonce and
//! version into every chunk's authentication tag, and the index binds chunk
//! order. v1 bodies are a single ciphertext sealed with the base nonce and
//! the header as AAD; they are read but never written.

use crate::config::{Config, KdfAlgorithm};
use crate::crypto::kdf::{Argon2Kdf, KdfProvider, ScryptKdf};
use crate::crypto::{
    HEADER_SIZE, KEY_SIZE, MAGIC, NONCE_SIZE, SALT_SIZE, TAG_SIZE, VERSION_CHUNKED, VERSION_LEGACY,
};
use crate::error::{Error, Result};
use rand::RngCore;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use tracing::debug;

/// Parsed .imv header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub salt: [u8; SALT_SIZE],
    pub base_nonce: [u8; NONCE_SIZE],
}

impl Header {
    /// Serialize to the fixed 38-byte wire form
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..8].copy_from_slice(MAGIC);
        bytes[8..10].copy_from_slice(&self.version.to_le_bytes());
        bytes[10..10 + SALT_SIZE].copy_from_slice(&self.salt);
        bytes[10 + SALT_SIZE..].copy_from_slice(&self.base_nonce);
        bytes
    }

    /// Parse and validate a header from the front of an archive
    ///
    /// All failures here are format errors, raised before any key
    /// derivation or decryption.
    pub fn parse(data: &[u8]) -> Result<Header> {
        if data.len() < HEADER_SIZE {
            return Err(Error::TooSmall);
        }
        if &data[..8] != MAGIC {
            return Err(Error::BadMagic);
        }

        let version = u16::from_le_bytes([data[8], data[9]]);
        if version != VERSION_LEGACY && version != VERSION_CHUNKED {
            return Err(Error::UnsupportedVersion(version));
        }

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&data[10..10 + SALT_SIZE]);
        let mut base_nonce = [0u8; NONCE_SIZE];
        base_nonce.copy_from_slice(&data[10 + SALT_SIZE..HEADER_SIZE]);

        Ok(Header {
            version,
            salt,
            base_nonce,
        })
    }
}

/// Add a counter to a 96-bit nonce, little-endian, wrapping in 96 bits
fn chunk_nonce(base_nonce: &[u8; NONCE_SIZE], index: u32) -> [u8; NONCE_SIZE] {
    let mut wide = [0u8; 16];
    wide[..NONCE_SIZE].copy_from_slice(base_nonce);
    let value = u128::from_le_bytes(wide).wrapping_add(index as u128) & ((1u128 << 96) - 1);

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&value.to_le_bytes()[..NONCE_SIZE]);
    nonce
}

/// AAD for chunk `index`: header bytes followed by the index
fn chunk_aad(header_bytes: &[u8; HEADER_SIZE], index: u32) -> [u8; HEADER_SIZE + 4] {
    let mut aad = [0u8; HEADER_SIZE + 4];
    aad[..HEADER_SIZE].copy_from_slice(header_bytes);
    aad[HEADER_SIZE..].copy_from_slice(&index.to_le_bytes());
    aad
}

fn aead_key(key: &[u8; KEY_SIZE]) -> Result<LessSafeKey> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| Error::Encryption("Failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Password-based chunked cipher for .imv archives
///
/// Holds the KDF provider (selected once from configuration) and the
/// maximum plaintext chunk size. Salt, base nonce and derived key are
/// per-call transients; nothing survives an encrypt or decrypt call.
pub struct ImvCipher {
    kdf: Box<dyn KdfProvider>,
    chunk_size: usize,
}

impl ImvCipher {
    /// Create a cipher from configuration, resolving the KDF provider once
    pub fn new(config: &Config) -> Result<Self> {
        let kdf: Box<dyn KdfProvider> = match config.kdf.algorithm {
            KdfAlgorithm::Argon2id => Box::new(Argon2Kdf::new(&config.kdf)),
            KdfAlgorithm::Scrypt => Box::new(ScryptKdf::new(&config.kdf)),
        };
        Self::with_provider(kdf, config.chunk_size)
    }

    /// Create a cipher with an explicit KDF provider and chunk size
    pub fn with_provider(kdf: Box<dyn KdfProvider>, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk size must be non-zero".to_string()));
        }
        Ok(ImvCipher { kdf, chunk_size })
    }

    /// Encrypt a plaintext payload into .imv v2 (chunked) format
    ///
    /// A fresh random salt and base nonce are drawn per call; two
    /// encryptions of the same payload never produce the same bytes.
    /// An empty payload yields a header and a zero chunk count.
    pub fn encrypt(&self, plaintext: &[u8], password: &str) -> Result<Vec<u8>> {
        let mut salt = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let mut base_nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut base_nonce);

        let header = Header {
            version: VERSION_CHUNKED,
            salt,
            base_nonce,
        };
        let header_bytes = header.to_bytes();

        let key = self.kdf.derive(password, &salt)?;
        let sealing_key = aead_key(&key)?;

        let chunk_count = plaintext.len().div_ceil(self.chunk_size);
        debug!(
            kdf = self.kdf.name(),
            chunks = chunk_count,
            plaintext_len = plaintext.len(),
            "encrypting archive"
        );

        let mut output = Vec::with_capacity(
            HEADER_SIZE + 4 + plaintext.len() + chunk_count * (4 + TAG_SIZE),
        );
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(&(chunk_count as u32).to_le_bytes());

        for (index, chunk) in plaintext.chunks(self.chunk_size).enumerate() {
            let index = index as u32;
            let nonce = Nonce::assume_unique_for_key(chunk_nonce(&base_nonce, index));
            let aad = chunk_aad(&header_bytes, index);

            let mut in_out = chunk.to_vec();
            sealing_key
                .seal_in_place_append_tag(nonce, Aad::from(&aad[..]), &mut in_out)
                .map_err(|_| Error::Encryption("AEAD sealing failed".to_string()))?;

            output.extend_from_slice(&(in_out.len() as u32).to_le_bytes());
            output.extend_from_slice(&in_out);
        }

        Ok(output)
    }

    /// Decrypt a .imv archive (v1 or v2) back to the plaintext payload
    ///
    /// Framing problems (bad magic, unknown version, truncation) surface
    /// as distinct format errors before any decryption work. Every AEAD
    /// failure, on any chunk or the legacy block, is reported as the one
    /// undifferentiated [`Error::Authentication`].
    pub fn decrypt(&self, data: &[u8], password: &str) -> Result<Vec<u8>> {
        let header = Header::parse(data)?;
        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes.copy_from_slice(&data[..HEADER_SIZE]);

        let body = &data[HEADER_SIZE..];

        // Validate all framing before deriving the key or opening anything.
        let chunks: Vec<&[u8]> = match header.version {
            VERSION_LEGACY => vec![body],
            _ => Self::scan_chunks(body)?,
        };

        let key = self.kdf.derive(password, &header.salt)?;
        let opening_key = aead_key(&key)?;

        debug!(
            kdf = self.kdf.name(),
            version = header.version,
            chunks = chunks.len(),
            "decrypting archive"
        );

        if header.version == VERSION_LEGACY {
            let nonce = Nonce::assume_unique_for_key(header.base_nonce);
            let mut in_out = body.to_vec();
            let plaintext = opening_key
                .open_in_place(nonce, Aad::from(&header_bytes[..]), &mut in_out)
                .map_err(|_| Error::Authentication)?;
            return Ok(plaintext.to_vec());
        }

        let mut plaintext = Vec::with_capacity(body.len());
        for (index, chunk) in chunks.iter().enumerate() {
            let index = index as u32;
            let nonce = Nonce::assume_unique_for_key(chunk_nonce(&header.base_nonce, index));
            let aad = chunk_aad(&header_bytes, index);

            let mut in_out = chunk.to_vec();
            let chunk_plaintext = opening_key
                .open_in_place(nonce, Aad::from(&aad[..]), &mut in_out)
                .map_err(|_| Error::Authentication)?;
            plaintext.extend_from_slice(chunk_plaintext);
        }

        Ok(plaintext)
    }

    /// Split a v2 body into ciphertext chunk slices, validating the framing
    fn scan_chunks(body: &[u8]) -> Result<Vec<&[u8]>> {
        if body.len() < 4 {
            return Err(Error::TruncatedArchive(0));
        }
        let chunk_count = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);

        let mut chunks = Vec::new();
        let mut pos = 4usize;
        for index in 0..chunk_count {
            if body.len() < pos + 4 {
                return Err(Error::TruncatedArchive(index));
            }
            let chunk_len = u32::from_le_bytes([
                body[pos],
                body[pos + 1],
                body[pos + 2],
                body[pos + 3],
            ]) as usize;
            pos += 4;

            if body.len() < pos + chunk_len {
                return Err(Error::TruncatedArchive(index));
            }
            chunks.push(&body[pos..pos + chunk_len]);
            pos += chunk_len;
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KdfConfig;

    // Small chunks and a cheap KDF keep the multi-chunk tests fast
    const TEST_CHUNK_SIZE: usize = 256;

    fn test_cipher() -> ImvCipher {
        let config = KdfConfig {
            argon2_memory_kib: 1024,
            argon2_iterations: 1,
            argon2_parallelism: 1,
            ..KdfConfig::default()
        };
        ImvCipher::with_provider(Box::new(Argon2Kdf::new(&config)), TEST_CHUNK_SIZE).unwrap()
    }

    #[test]
    fn test_cipher_from_default_config() {
        // The out-of-the-box configuration must yield a usable cipher;
        // key derivation cost is irrelevant here so nothing is encrypted.
        let cipher = ImvCipher::new(&Config::default()).unwrap();
        assert_eq!(cipher.chunk_size, crate::config::DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let config = KdfConfig::default();
        let result = ImvCipher::with_provider(Box::new(Argon2Kdf::new(&config)), 0);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_round_trip() {
        let cipher = test_cipher();
        let plaintext = b"Hello, imvault!".repeat(100);

        let encrypted = cipher.encrypt(&plaintext, "test-password-123").unwrap();
        let decrypted = cipher.decrypt(&encrypted, "test-password-123").unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_empty_payload_has_zero_chunks() {
        let cipher = test_cipher();

        let encrypted = cipher.encrypt(b"", "pw").unwrap();
        assert_eq!(encrypted.len(), HEADER_SIZE + 4);
        let chunk_count = u32::from_le_bytes(encrypted[HEADER_SIZE..].try_into().unwrap());
        assert_eq!(chunk_count, 0);

        let decrypted = cipher.decrypt(&encrypted, "pw").unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_exact_chunk_boundary() {
        let cipher = test_cipher();
        let plaintext = vec![0xabu8; TEST_CHUNK_SIZE];

        let encrypted = cipher.encrypt(&plaintext, "pw").unwrap();
        let chunk_count =
            u32::from_le_bytes(encrypted[HEADER_SIZE..HEADER_SIZE + 4].try_into().unwrap());
        assert_eq!(chunk_count, 1);
        assert_eq!(cipher.decrypt(&encrypted, "pw").unwrap(), plaintext);
    }

    #[test]
    fn test_one_byte_over_boundary_makes_two_chunks() {
        let cipher = test_cipher();
        let plaintext = vec![0xcdu8; TEST_CHUNK_SIZE + 1];

        let encrypted = cipher.encrypt(&plaintext, "pw").unwrap();
        let chunk_count =
            u32::from_le_bytes(encrypted[HEADER_SIZE..HEADER_SIZE + 4].try_into().unwrap());
        assert_eq!(chunk_count, 2);
        assert_eq!(cipher.decrypt(&encrypted, "pw").unwrap(), plaintext);
    }

    #[test]
    fn test_many_chunks_round_trip() {
        let cipher = test_cipher();
        let plaintext: Vec<u8> = (0..TEST_CHUNK_SIZE * 17 + 93)
            .map(|i| (i % 251) as u8)
            .collect();

        let encrypted = cipher.encrypt(&plaintext, "chunked-test").unwrap();
        assert_eq!(cipher.decrypt(&encrypted, "chunked-test").unwrap(), plaintext);
    }

    #[test]
    fn test_multi_megabyte_round_trip() {
        let config = KdfConfig {
            argon2_memory_kib: 1024,
            argon2_iterations: 1,
            argon2_parallelism: 1,
            ..KdfConfig::default()
        };
        let cipher =
            ImvCipher::with_provider(Box::new(Argon2Kdf::new(&config)), 64 * 1024).unwrap();
        let plaintext: Vec<u8> = (0..2 * 1024 * 1024 + 17).map(|i| (i % 253) as u8).collect();

        let encrypted = cipher.encrypt(&plaintext, "large-test").unwrap();
        assert_eq!(cipher.decrypt(&encrypted, "large-test").unwrap(), plaintext);
    }

    #[test]
    fn test_header_starts_with_magic_and_version() {
        let cipher = test_cipher();
        let encrypted = cipher.encrypt(b"data", "pw").unwrap();

        assert_eq!(&encrypted[..8], MAGIC);
        assert_eq!(
            u16::from_le_bytes([encrypted[8], encrypted[9]]),
            VERSION_CHUNKED
        );
    }

    #[test]
    fn test_fresh_salt_and_nonce_per_encryption() {
        let cipher = test_cipher();

        let enc1 = cipher.encrypt(b"data", "pw").unwrap();
        let enc2 = cipher.encrypt(b"data", "pw").unwrap();

        assert_ne!(enc1[10..26], enc2[10..26], "salt reused");
        assert_ne!(enc1[26..38], enc2[26..38], "base nonce reused");
        assert_ne!(enc1, enc2);
    }

    #[test]
    fn test_wrong_password_fails() {
        let cipher = test_cipher();
        let encrypted = cipher.encrypt(b"secret data", "correct-password").unwrap();

        let result = cipher.decrypt(&encrypted, "wrong-password");
        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = test_cipher();
        let mut encrypted = cipher.encrypt(b"secret data", "pw").unwrap();

        let last = encrypted.len() - 10;
        encrypted[last] ^= 0xff;
        assert!(matches!(
            cipher.decrypt(&encrypted, "pw"),
            Err(Error::Authentication)
        ));
    }

    #[test]
    fn test_tampered_salt_fails() {
        let cipher = test_cipher();
        let mut encrypted = cipher.encrypt(b"secret data", "pw").unwrap();

        // Salt is part of the AAD, so this must break authentication even
        // though it also changes the derived key.
        encrypted[12] ^= 0xff;
        assert!(matches!(
            cipher.decrypt(&encrypted, "pw"),
            Err(Error::Authentication)
        ));
    }

    #[test]
    fn test_tampered_length_prefix_fails() {
        let cipher = test_cipher();
        let plaintext = vec![1u8; TEST_CHUNK_SIZE * 2];
        let mut encrypted = cipher.encrypt(&plaintext, "pw").unwrap();

        // First chunk's length prefix sits right after the chunk count
        encrypted[HEADER_SIZE + 4] ^= 0x01;
        let result = cipher.decrypt(&encrypted, "pw");
        assert!(matches!(
            result,
            Err(Error::Authentication) | Err(Error::TruncatedArchive(_))
        ));
    }

    #[test]
    fn test_swapped_chunks_fail() {
        let cipher = test_cipher();
        let plaintext = vec![9u8; TEST_CHUNK_SIZE * 2];
        let encrypted = cipher.encrypt(&plaintext, "pw").unwrap();

        // Both chunks have identical framing; swap their ciphertexts.
        let chunk_span = 4 + TEST_CHUNK_SIZE + TAG_SIZE;
        let first = HEADER_SIZE + 4;
        let second = first + chunk_span;

        let mut swapped = encrypted.clone();
        swapped[first..first + chunk_span]
            .copy_from_slice(&encrypted[second..second + chunk_span]);
        swapped[second..second + chunk_span]
            .copy_from_slice(&encrypted[first..first + chunk_span]);

        assert!(matches!(
            cipher.decrypt(&swapped, "pw"),
            Err(Error::Authentication)
        ));
    }

    #[test]
    fn test_too_small_input() {
        let cipher = test_cipher();
        let err = cipher.decrypt(b"short", "pw").unwrap_err();
        assert!(matches!(err, Error::TooSmall));
        assert!(err.is_format_error());
    }

    #[test]
    fn test_bad_magic() {
        let cipher = test_cipher();
        let mut encrypted = cipher.encrypt(b"data", "pw").unwrap();
        encrypted[..8].copy_from_slice(b"NOTMAGIC");

        assert!(matches!(
            cipher.decrypt(&encrypted, "pw"),
            Err(Error::BadMagic)
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let cipher = test_cipher();
        let mut encrypted = cipher.encrypt(b"data", "pw").unwrap();
        encrypted[8] = 99;
        encrypted[9] = 0;

        assert!(matches!(
            cipher.decrypt(&encrypted, "pw"),
            Err(Error::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_truncated_chunk_bytes() {
        let cipher = test_cipher();
        let plaintext = vec![5u8; TEST_CHUNK_SIZE * 3];
        let encrypted = cipher.encrypt(&plaintext, "pw").unwrap();

        // Drop the tail of the final chunk
        let truncated = &encrypted[..encrypted.len() - 7];
        assert!(matches!(
            cipher.decrypt(truncated, "pw"),
            Err(Error::TruncatedArchive(2))
        ));
    }

    #[test]
    fn test_missing_chunk_count() {
        let cipher = test_cipher();
        let encrypted = cipher.encrypt(b"data", "pw").unwrap();

        let truncated = &encrypted[..HEADER_SIZE + 2];
        assert!(matches!(
            cipher.decrypt(truncated, "pw"),
            Err(Error::TruncatedArchive(0))
        ));
    }

    #[test]
    fn test_v1_archive_decrypts() {
        // Assemble a legacy single-block archive by hand and read it
        // through the normal decrypt path.
        let cipher = test_cipher();
        let plaintext = b"v1 test data";
        let password = "v1-password";

        let salt = [0x11u8; SALT_SIZE];
        let nonce_bytes = [0x22u8; NONCE_SIZE];
        let header = Header {
            version: VERSION_LEGACY,
            salt,
            base_nonce: nonce_bytes,
        };
        let header_bytes = header.to_bytes();

        let key = cipher.kdf.derive(password, &salt).unwrap();
        let sealing_key = aead_key(&key).unwrap();
        let mut in_out = plaintext.to_vec();
        sealing_key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(&header_bytes[..]),
                &mut in_out,
            )
            .unwrap();

        let mut archive = header_bytes.to_vec();
        archive.extend_from_slice(&in_out);

        assert_eq!(cipher.decrypt(&archive, password).unwrap(), plaintext);
    }

    #[test]
    fn test_v1_wrong_password_fails() {
        let cipher = test_cipher();
        let salt = [0x11u8; SALT_SIZE];
        let nonce_bytes = [0x22u8; NONCE_SIZE];
        let header = Header {
            version: VERSION_LEGACY,
            salt,
            base_nonce: nonce_bytes,
        };
        let header_bytes = header.to_bytes();

        let key = cipher.kdf.derive("right", &salt).unwrap();
        let sealing_key = aead_key(&key).unwrap();
        let mut in_out = b"legacy".to_vec();
        sealing_key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(&header_bytes[..]),
                &mut in_out,
            )
            .unwrap();

        let mut archive = header_bytes.to_vec();
        archive.extend_from_slice(&in_out);

        assert!(matches!(
            cipher.decrypt(&archive, "wrong"),
            Err(Error::Authentication)
        ));
    }

    #[test]
    fn test_chunk_nonce_increments_little_endian() {
        let base = [0u8; NONCE_SIZE];
        assert_eq!(chunk_nonce(&base, 0), base);

        let one = chunk_nonce(&base, 1);
        assert_eq!(one[0], 1);
        assert!(one[1..].iter().all(|&b| b == 0));

        // Carry across the first byte
        let mut base_ff = [0u8; NONCE_SIZE];
        base_ff[0] = 0xff;
        let carried = chunk_nonce(&base_ff, 1);
        assert_eq!(carried[0], 0);
        assert_eq!(carried[1], 1);
    }

    #[test]
    fn test_chunk_nonce_wraps_in_96_bits() {
        let all_ff = [0xffu8; NONCE_SIZE];
        let wrapped = chunk_nonce(&all_ff, 1);
        assert_eq!(wrapped, [0u8; NONCE_SIZE]);
    }

    #[test]
    fn test_header_round_trip() {
        let header = Header {
            version: VERSION_CHUNKED,
            salt: [3u8; SALT_SIZE],
            base_nonce: [4u8; NONCE_SIZE],
        };
        let parsed = Header::parse(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_scrypt_cipher_round_trip() {
        let config = KdfConfig {
            scrypt_log_n: 10,
            ..KdfConfig::default()
        };
        let cipher =
            ImvCipher::with_provider(Box::new(ScryptKdf::new(&config)), TEST_CHUNK_SIZE).unwrap();

        let encrypted = cipher.encrypt(b"scrypt payload", "pw").unwrap();
        assert_eq!(cipher.decrypt(&encrypted, "pw").unwrap(), b"scrypt payload");
    }
}
