//! Writing encrypted zeroes over a range of blocks.
//!
//! Each block is written as the encryption of an all-zero block at its logical
//! position, so reading it back through the file's cipher yields zeroes. The
//! range is processed strictly in order, one synchronous write per block, and
//! processing stops at the first failure.

use thiserror::Error;
use tracing::{debug, instrument, trace};

use crate::bounce::BouncePool;
use crate::crypto::{BlockCipher, CryptoError, Direction};
use crate::device::{BlockDevice, IoStatus, pblk_to_sector};

#[derive(Error, Debug)]
pub enum ZeroOutError {
    /// No bounce buffer was available. Nothing was written.
    #[error("no bounce buffer available for zeroing")]
    OutOfMemory,

    /// Encrypting a zero block failed. Earlier blocks were written.
    #[error("failed to encrypt zero block {lblk}: {source}")]
    Crypto {
        lblk: u64,
        #[source]
        source: CryptoError,
    },

    /// A write could not be submitted or completed with an error.
    #[error("I/O error writing block {pblk}")]
    Io {
        pblk: u64,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl ZeroOutError {
    /// The errno a caller reports for this failure.
    pub fn errno(&self) -> i32 {
        match self {
            ZeroOutError::OutOfMemory => libc::ENOMEM,
            ZeroOutError::Crypto { .. } | ZeroOutError::Io { .. } => libc::EIO,
        }
    }
}

/// Overwrite `len` blocks with encrypted zeroes.
///
/// Logical block `lblk + i` is encrypted and written to physical block
/// `pblk + i`. On error, blocks before the failing one have been written and
/// nothing after it has.
#[instrument(level = "debug", skip(cipher, dev, pool))]
pub fn zeroout_range(
    cipher: &dyn BlockCipher,
    dev: &dyn BlockDevice,
    pool: &BouncePool,
    lblk: u64,
    pblk: u64,
    len: u32,
) -> Result<(), ZeroOutError> {
    let block_bits = cipher.block_bits();
    let block_size = cipher.block_size();
    let mut bounce = pool.alloc().map_err(|_| ZeroOutError::OutOfMemory)?;
    if bounce.len() < block_size {
        return Err(ZeroOutError::Io { pblk, source: None });
    }

    for i in 0..u64::from(len) {
        let (lblk, pblk) = (lblk.wrapping_add(i), pblk.wrapping_add(i));
        let block = &mut bounce[..block_size];
        block.fill(0);
        cipher
            .crypt_block(Direction::Encrypt, lblk, block)
            .map_err(|source| ZeroOutError::Crypto { lblk, source })?;

        let sector = pblk_to_sector(pblk, block_bits);
        match dev.write_sync(sector, block) {
            Ok(IoStatus::Ok) => trace!(lblk, pblk, sector, "wrote zero block"),
            Ok(IoStatus::Failed(errno)) => {
                debug!(pblk, errno, "zero block write completed with error");
                return Err(ZeroOutError::Io { pblk, source: None });
            }
            Err(e) => {
                debug!(pblk, error = %e, "zero block write not submitted");
                return Err(ZeroOutError::Io {
                    pblk,
                    source: Some(e),
                });
            }
        }
    }

    Ok(())
}
