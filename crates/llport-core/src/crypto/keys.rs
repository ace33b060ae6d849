use std::fmt;

use rand::RngCore;
use secrecy::{ExposeSecret, SecretBox};
use zeroize::Zeroizing;

use super::CryptoError;

/// Length of an AES-256-XTS key: two 256-bit AES keys.
pub const FILE_KEY_LEN: usize = 64;

/// Per-file contents encryption key.
///
/// The key lives in a `SecretBox` so it is zeroed on drop and never shows up in
/// `Debug` output. Access goes through [`FileKey::with_key`], which keeps the
/// exposure scoped to a callback.
pub struct FileKey {
    key: SecretBox<[u8; FILE_KEY_LEN]>,
}

impl FileKey {
    /// Generate a fresh random key.
    pub fn random() -> Self {
        let mut key = Box::new([0u8; FILE_KEY_LEN]);
        rand::rng().fill_bytes(&mut key[..]);
        Self {
            key: SecretBox::new(key),
        }
    }

    /// Build a key from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != FILE_KEY_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: FILE_KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut key = Box::new([0u8; FILE_KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self {
            key: SecretBox::new(key),
        })
    }

    /// Build a key from a hex string (128 hex digits).
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(hex::decode(text.trim()).map_err(|_| {
            CryptoError::InvalidKeyLength {
                expected: FILE_KEY_LEN,
                actual: text.trim().len() / 2,
            }
        })?);
        Self::from_bytes(&bytes)
    }

    /// Run `f` with the raw key material.
    pub fn with_key<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8; FILE_KEY_LEN]) -> R,
    {
        f(self.key.expose_secret())
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKey").field("key", &"[REDACTED]").finish()
    }
}
