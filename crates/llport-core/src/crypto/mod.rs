//! Block cipher engine for per-file contents encryption.
//!
//! Every filesystem block is encrypted independently with the file's key and a
//! tweak derived from the block's logical position. Encryption is deterministic
//! for a given `(key, logical block)` pair, which is what allows random-access
//! in-place decryption of individual blocks.

pub mod keys;
pub mod pagecache;
pub mod xts;

use thiserror::Error;

/// Size of a page-cache page.
pub const PAGE_SIZE: usize = 4096;
/// `log2(PAGE_SIZE)`.
pub const PAGE_SHIFT: u32 = 12;
/// Smallest supported filesystem block (one 512-byte sector).
pub const MIN_BLOCK_BITS: u32 = 9;

/// Errors that can occur during block encryption or decryption.
///
/// None of these are transient: a failed block operation points at corrupt
/// input or a key mismatch and is never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The buffer handed to the cipher is not exactly one block.
    #[error("Invalid block length: expected {expected} bytes, got {actual}")]
    InvalidBlockLength { expected: usize, actual: usize },

    /// A page range is not aligned to the filesystem block size.
    #[error("Unaligned range: offset {offset}, length {len}, block size {block_size}")]
    UnalignedRange {
        offset: usize,
        len: usize,
        block_size: usize,
    },

    /// The configured block size is unsupported.
    #[error("Unsupported block size 2^{block_bits} (must be between 2^{MIN_BLOCK_BITS} and 2^{PAGE_SHIFT})")]
    InvalidBlockSize { block_bits: u32 },

    /// Key material has the wrong length.
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// The cipher rejected the operation.
    #[error("Block {lblk} {direction} failed: {reason}")]
    CipherFailure {
        lblk: u64,
        direction: Direction,
        reason: String,
    },
}

/// Which way a block is being transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Encrypt => write!(f, "encryption"),
            Direction::Decrypt => write!(f, "decryption"),
        }
    }
}

/// A per-file tweakable block cipher.
///
/// Implementations are stateless per call and shared between threads.
pub trait BlockCipher: Send + Sync {
    /// `log2` of the filesystem block size.
    fn block_bits(&self) -> u32;

    /// Filesystem block size in bytes.
    fn block_size(&self) -> usize {
        1 << self.block_bits()
    }

    /// Transform exactly one block in place; `lblk` selects the tweak.
    fn crypt_block(
        &self,
        direction: Direction,
        lblk: u64,
        block: &mut [u8],
    ) -> Result<(), CryptoError>;
}

/// Reject block sizes outside `[512, PAGE_SIZE]`.
pub fn validate_block_bits(block_bits: u32) -> Result<(), CryptoError> {
    if (MIN_BLOCK_BITS..=PAGE_SHIFT).contains(&block_bits) {
        Ok(())
    } else {
        Err(CryptoError::InvalidBlockSize { block_bits })
    }
}

// Re-export commonly used types
pub use keys::FileKey;
pub use pagecache::{decrypt_pagecache_blocks, encrypt_pagecache_blocks};
pub use xts::XtsBlockCipher;
