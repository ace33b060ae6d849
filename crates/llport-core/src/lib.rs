//! FID identity and per-block encryption I/O completion.
//!
//! - [`fid`]: the filesystem object identifier and its inode-number hashes
//! - [`crypto`]: per-block tweakable cipher and page-range helpers
//! - [`bounce`]: bounded, non-blocking scratch buffers for ciphertext
//! - [`decrypt`]: read completion, inline or on a worker pool
//! - [`zeroout`]: writing encrypted zeroes over a block range

pub mod bio;
pub mod bounce;
pub mod config;
pub mod crypto;
pub mod decrypt;
pub mod device;
pub mod fid;
pub mod page;
pub mod zeroout;

pub use bio::{IoSegment, ReadIo};
pub use bounce::{BounceBuffer, BounceError, BouncePool};
pub use config::{ConfigError, CryptConfig};
pub use crypto::{BlockCipher, CryptoError, Direction, FileKey, XtsBlockCipher};
pub use decrypt::{DecryptQueue, DecryptSummary, QueueError, decrypt_bio, finish_bio};
pub use device::{BlockDevice, FileBlockDevice, IoStatus, MemoryBlockDevice};
pub use fid::{Fid, FidParseError};
pub use page::Page;
pub use zeroout::{ZeroOutError, zeroout_range};
