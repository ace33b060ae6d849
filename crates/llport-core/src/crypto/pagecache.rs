//! Page-granular helpers on top of [`BlockCipher`].
//!
//! A page holds `PAGE_SIZE >> block_bits` filesystem blocks. The logical block
//! number of the first block in a page range is
//! `(page.index << (PAGE_SHIFT - block_bits)) + (offset >> block_bits)`.

use thiserror::Error;
use tracing::{instrument, trace};

use super::{BlockCipher, CryptoError, Direction, PAGE_SHIFT, PAGE_SIZE};
use crate::bounce::{BounceBuffer, BounceError, BouncePool};
use crate::page::Page;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageCryptError {
    #[error(transparent)]
    Bounce(#[from] BounceError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Logical block number of the block at `offset` within `page`.
pub fn page_lblk(page: &Page, offset: usize, block_bits: u32) -> u64 {
    (page.index() << (PAGE_SHIFT - block_bits)) + (offset >> block_bits) as u64
}

fn check_range(cipher: &dyn BlockCipher, offset: usize, len: usize) -> Result<(), CryptoError> {
    let block_size = cipher.block_size();
    let mask = block_size - 1;
    if offset & mask != 0
        || len & mask != 0
        || offset.checked_add(len).is_none_or(|end| end > PAGE_SIZE)
    {
        return Err(CryptoError::UnalignedRange {
            offset,
            len,
            block_size,
        });
    }
    Ok(())
}

/// Decrypt the blocks in `[offset, offset + len)` of `page` in place.
///
/// Stops at the first failing block; blocks before it stay decrypted.
#[instrument(level = "trace", skip(cipher, page), fields(index = page.index()))]
pub fn decrypt_pagecache_blocks(
    cipher: &dyn BlockCipher,
    page: &Page,
    len: usize,
    offset: usize,
) -> Result<(), CryptoError> {
    check_range(cipher, offset, len)?;

    let block_size = cipher.block_size();
    let mut lblk = page_lblk(page, offset, cipher.block_bits());
    let mut data = page.data();
    for block in data[offset..offset + len].chunks_exact_mut(block_size) {
        cipher.crypt_block(Direction::Decrypt, lblk, block)?;
        lblk += 1;
    }
    Ok(())
}

/// Encrypt the blocks in `[offset, offset + len)` of `page` into a bounce buffer.
///
/// The ciphertext lands at the same offsets inside the returned buffer. The
/// plaintext page is left untouched.
#[instrument(level = "trace", skip(cipher, pool, page), fields(index = page.index()))]
pub fn encrypt_pagecache_blocks(
    cipher: &dyn BlockCipher,
    pool: &BouncePool,
    page: &Page,
    len: usize,
    offset: usize,
) -> Result<BounceBuffer, PageCryptError> {
    check_range(cipher, offset, len)?;

    let mut bounce = pool.alloc()?;
    if bounce.len() < offset + len {
        return Err(CryptoError::InvalidBlockLength {
            expected: offset + len,
            actual: bounce.len(),
        }
        .into());
    }
    let block_size = cipher.block_size();
    let mut lblk = page_lblk(page, offset, cipher.block_bits());

    bounce[offset..offset + len].copy_from_slice(&page.data()[offset..offset + len]);
    for block in bounce[offset..offset + len].chunks_exact_mut(block_size) {
        cipher.crypt_block(Direction::Encrypt, lblk, block)?;
        lblk += 1;
    }
    trace!(blocks = len / block_size, "encrypted page range into bounce buffer");
    Ok(bounce)
}
