//! AES-256-XTS block cipher.
//!
//! The tweak for a block is its logical block number as a little-endian
//! 128-bit integer, the default IEEE P1619 data-unit tweak.

use aes::Aes256;
use aes::cipher::KeyInit;
use tracing::trace;
use xts_mode::{Xts128, get_tweak_default};

use super::keys::{FILE_KEY_LEN, FileKey};
use super::{BlockCipher, CryptoError, Direction, validate_block_bits};

/// AES-256-XTS contents cipher bound to one file key.
pub struct XtsBlockCipher {
    xts: Xts128<Aes256>,
    block_bits: u32,
}

impl XtsBlockCipher {
    /// Create a cipher for blocks of `2^block_bits` bytes.
    pub fn new(key: &FileKey, block_bits: u32) -> Result<Self, CryptoError> {
        validate_block_bits(block_bits)?;

        let half = FILE_KEY_LEN / 2;
        let (cipher_1, cipher_2) = key.with_key(|raw| {
            let c1 = Aes256::new_from_slice(&raw[..half]);
            let c2 = Aes256::new_from_slice(&raw[half..]);
            (c1, c2)
        });
        let invalid = |_| CryptoError::InvalidKeyLength {
            expected: FILE_KEY_LEN,
            actual: FILE_KEY_LEN,
        };

        Ok(Self {
            xts: Xts128::new(cipher_1.map_err(invalid)?, cipher_2.map_err(invalid)?),
            block_bits,
        })
    }
}

impl std::fmt::Debug for XtsBlockCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XtsBlockCipher")
            .field("block_bits", &self.block_bits)
            .finish_non_exhaustive()
    }
}

impl BlockCipher for XtsBlockCipher {
    fn block_bits(&self) -> u32 {
        self.block_bits
    }

    fn crypt_block(
        &self,
        direction: Direction,
        lblk: u64,
        block: &mut [u8],
    ) -> Result<(), CryptoError> {
        let expected = self.block_size();
        if block.len() != expected {
            return Err(CryptoError::InvalidBlockLength {
                expected,
                actual: block.len(),
            });
        }

        trace!(lblk, %direction, "xts block");
        let tweak = get_tweak_default(u128::from(lblk));
        match direction {
            Direction::Encrypt => self.xts.encrypt_sector(block, tweak),
            Direction::Decrypt => self.xts.decrypt_sector(block, tweak),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn sequential_key() -> FileKey {
        let bytes: Vec<u8> = (0u8..64).collect();
        FileKey::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn test_known_answer_zero_block() {
        let cipher = XtsBlockCipher::new(&sequential_key(), 9).unwrap();

        let mut block = vec![0u8; 512];
        cipher.crypt_block(Direction::Encrypt, 0, &mut block).unwrap();
        assert_eq!(block[..16], hex!("cd6b103236fbd87dba93e9001e29bc3d"));
        assert_eq!(block[496..], hex!("226790136af4ae079c61a907ba497df2"));

        let mut block = vec![0u8; 512];
        cipher.crypt_block(Direction::Encrypt, 7, &mut block).unwrap();
        assert_eq!(block[..16], hex!("fb3094e9a7d77e6584d48c0635a59d88"));
        assert_eq!(block[496..], hex!("d630316e56f46684eb542647e78cdb44"));
    }

    #[test]
    fn test_same_position_is_deterministic() {
        let cipher = XtsBlockCipher::new(&FileKey::random(), 12).unwrap();
        let plaintext: Vec<u8> = (0..4096).map(|i| (i % 251) as u8).collect();

        let mut first = plaintext.clone();
        let mut second = plaintext.clone();
        cipher.crypt_block(Direction::Encrypt, 42, &mut first).unwrap();
        cipher.crypt_block(Direction::Encrypt, 42, &mut second).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, plaintext);
    }

    #[test]
    fn test_different_positions_differ() {
        let cipher = XtsBlockCipher::new(&FileKey::random(), 12).unwrap();
        let mut at_1 = vec![0u8; 4096];
        let mut at_2 = vec![0u8; 4096];
        cipher.crypt_block(Direction::Encrypt, 1, &mut at_1).unwrap();
        cipher.crypt_block(Direction::Encrypt, 2, &mut at_2).unwrap();
        assert_ne!(at_1, at_2);
    }

    #[test]
    fn test_decrypt_inverts_encrypt() {
        let cipher = XtsBlockCipher::new(&FileKey::random(), 10).unwrap();
        let plaintext: Vec<u8> = (0..1024).map(|i| (i * 7 % 256) as u8).collect();
        let mut block = plaintext.clone();
        cipher.crypt_block(Direction::Encrypt, 9, &mut block).unwrap();
        cipher.crypt_block(Direction::Decrypt, 9, &mut block).unwrap();
        assert_eq!(block, plaintext);
    }

    #[test]
    fn test_wrong_position_does_not_decrypt() {
        let cipher = XtsBlockCipher::new(&FileKey::random(), 9).unwrap();
        let plaintext = vec![0x5au8; 512];
        let mut block = plaintext.clone();
        cipher.crypt_block(Direction::Encrypt, 3, &mut block).unwrap();
        cipher.crypt_block(Direction::Decrypt, 4, &mut block).unwrap();
        assert_ne!(block, plaintext);
    }

    #[test]
    fn test_rejects_partial_block() {
        let cipher = XtsBlockCipher::new(&FileKey::random(), 12).unwrap();
        let mut short = vec![0u8; 100];
        let err = cipher
            .crypt_block(Direction::Decrypt, 0, &mut short)
            .unwrap_err();
        assert_eq!(
            err,
            CryptoError::InvalidBlockLength {
                expected: 4096,
                actual: 100
            }
        );
    }

    #[test]
    fn test_rejects_unsupported_block_size() {
        assert!(matches!(
            XtsBlockCipher::new(&FileKey::random(), 13),
            Err(CryptoError::InvalidBlockSize { block_bits: 13 })
        ));
        assert!(XtsBlockCipher::new(&FileKey::random(), 8).is_err());
    }
}
