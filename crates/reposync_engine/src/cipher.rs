//! Payload encryption.
//!
//! Link objects are sealed with AES-256-GCM. Every object gets its own random
//! salt, so the key is re-derived per object from the shared passphrase:
//!
//! ```text
//! "RSC1" || salt (16) || nonce (12) || ciphertext || tag (16)
//! ```
//!
//! The four-byte magic is also bound as associated data.

use crate::error::{SyncError, SyncResult};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use std::fs;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

const MAGIC: &[u8; 4] = b"RSC1";
const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const KEY_SIZE: usize = 32;
const HEADER_SIZE: usize = MAGIC.len() + SALT_SIZE + NONCE_SIZE;
const KEY_INFO: &[u8] = b"reposync-link-key-v1";

/// Symmetric encryption of opaque link payloads.
pub trait Cipher: Send + Sync {
    /// Encrypts a payload.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Crypto`] on failure.
    fn encrypt(&self, plaintext: &[u8]) -> SyncResult<Vec<u8>>;

    /// Decrypts a payload produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Crypto`] for a wrong passphrase or tampered data.
    fn decrypt(&self, ciphertext: &[u8]) -> SyncResult<Vec<u8>>;
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct DerivedKey([u8; KEY_SIZE]);

/// AES-256-GCM keyed by HKDF-SHA256 over a shared passphrase.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PassphraseCipher {
    passphrase: Vec<u8>,
}

impl PassphraseCipher {
    /// Creates a cipher from a passphrase.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] for an empty passphrase.
    pub fn new(passphrase: impl Into<Vec<u8>>) -> SyncResult<Self> {
        let passphrase = passphrase.into();
        if passphrase.is_empty() {
            return Err(SyncError::Config("passphrase must not be empty".into()));
        }
        Ok(Self { passphrase })
    }

    /// Reads the passphrase from a file, dropping a trailing line break.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the file is missing or empty.
    pub fn from_file(path: &Path) -> SyncResult<Self> {
        let mut raw = fs::read(path).map_err(|e| {
            SyncError::Config(format!("cannot read passphrase {}: {e}", path.display()))
        })?;
        while matches!(raw.last(), Some(b'\n' | b'\r')) {
            raw.pop();
        }
        let cipher = Self::new(raw.as_slice());
        raw.zeroize();
        cipher
    }

    fn derive(&self, salt: &[u8]) -> SyncResult<DerivedKey> {
        let hk = Hkdf::<Sha256>::new(Some(salt), &self.passphrase);
        let mut key = DerivedKey([0u8; KEY_SIZE]);
        hk.expand(KEY_INFO, &mut key.0)
            .map_err(|_| SyncError::Crypto("HKDF expand failed".into()))?;
        Ok(key)
    }
}

impl Cipher for PassphraseCipher {
    fn encrypt(&self, plaintext: &[u8]) -> SyncResult<Vec<u8>> {
        let mut salt = [0u8; SALT_SIZE];
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce_bytes);

        let key = self.derive(&salt)?;
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&key.0));
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: MAGIC,
                },
            )
            .map_err(|_| SyncError::Crypto("encryption error".into()))?;

        let mut out = Vec::with_capacity(HEADER_SIZE + sealed.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce_bytes);
        out.extend(sealed);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> SyncResult<Vec<u8>> {
        if ciphertext.len() < HEADER_SIZE + TAG_SIZE {
            return Err(SyncError::Crypto("ciphertext too short".into()));
        }
        if &ciphertext[..MAGIC.len()] != MAGIC {
            return Err(SyncError::Crypto("unknown ciphertext format".into()));
        }
        let salt = &ciphertext[MAGIC.len()..MAGIC.len() + SALT_SIZE];
        let nonce = &ciphertext[MAGIC.len() + SALT_SIZE..HEADER_SIZE];

        let key = self.derive(salt)?;
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&key.0));
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: &ciphertext[HEADER_SIZE..],
                    aad: MAGIC,
                },
            )
            .map_err(|_| SyncError::Crypto("decryption failed (wrong passphrase?)".into()))
    }
}

impl std::fmt::Debug for PassphraseCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassphraseCipher")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}
