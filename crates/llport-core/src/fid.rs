//! File identifiers and their projections onto external identity spaces.
//!
//! A [`Fid`] names a filesystem object independently of where it is stored.
//! External protocols cannot carry a FID directly, so this module provides the
//! projections they need:
//!
//! - [`Fid::build_ino`] flattens a FID into a 64-bit (or 32-bit) inode number.
//!   The flattening is lossy, which is why the inode cache re-checks FID equality
//!   on every hash hit.
//! - [`Fid::build_gen`] yields the generation number paired with that inode.
//! - [`Fid::to_le_bytes`] / [`Fid::from_le_bytes`] give the fixed 16-byte wire
//!   encoding used by directory entries and external handles.
//!
//! # Sequence Ranges
//!
//! | Range | Meaning |
//! |-------|---------|
//! | `0` | legacy OST objects on MDT0 |
//! | `1..=11` | reserved sequences |
//! | `12..=0xffff_ffff` | IGIF: inode/generation packed into a FID |
//! | `0x1_0000_0000..=0x1_ffff_ffff` | IDIF: OST object ids |
//! | `0x2_0000_0000..` | normal sequences |

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Legacy OST objects living on MDT0.
pub const FID_SEQ_OST_MDT0: u64 = 0;
/// Last reserved sequence.
pub const FID_SEQ_RSVD: u64 = 11;
/// First IGIF sequence.
pub const FID_SEQ_IGIF: u64 = 12;
/// Last IGIF sequence.
pub const FID_SEQ_IGIF_MAX: u64 = 0x0_ffff_ffff;
/// First IDIF sequence.
pub const FID_SEQ_IDIF: u64 = 0x1_0000_0000;
/// Last IDIF sequence.
pub const FID_SEQ_IDIF_MAX: u64 = 0x1_ffff_ffff;
/// First sequence handed out to normal objects.
pub const FID_SEQ_START: u64 = 0x2_0000_0000;
/// Sequence of the filesystem root.
pub const FID_SEQ_ROOT: u64 = 0x2_0000_0007;
/// First sequence handed out to clients.
pub const FID_SEQ_NORMAL: u64 = 0x2_0000_0400;

/// Size of a FID on the wire.
pub const FID_LEN: usize = 16;

/// A file identifier: `(sequence, object id, version)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Fid {
    /// Sequence number.
    pub seq: u64,
    /// Object id within the sequence.
    pub oid: u32,
    /// Version, zero for every live object.
    pub ver: u32,
}

impl Fid {
    /// The all-zero FID, used as the "no parent" sentinel.
    pub const ZERO: Fid = Fid {
        seq: 0,
        oid: 0,
        ver: 0,
    };

    pub const fn new(seq: u64, oid: u32, ver: u32) -> Self {
        Self { seq, oid, ver }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// IGIF: an old-style inode/generation pair carried in a FID.
    pub fn is_igif(&self) -> bool {
        (FID_SEQ_IGIF..=FID_SEQ_IGIF_MAX).contains(&self.seq)
    }

    /// IDIF: an OST object id carried in a FID.
    pub fn is_idif(&self) -> bool {
        (FID_SEQ_IDIF..=FID_SEQ_IDIF_MAX).contains(&self.seq)
    }

    pub fn is_seq_reserved(&self) -> bool {
        self.seq > FID_SEQ_OST_MDT0 && self.seq <= FID_SEQ_RSVD
    }

    /// Structural validity check applied to FIDs that cross the export boundary.
    ///
    /// The zero FID is never sane.
    pub fn is_sane(&self) -> bool {
        (self.seq >= FID_SEQ_START && self.ver == 0)
            || self.is_igif()
            || self.is_idif()
            || self.is_seq_reserved()
    }

    /// Flatten into a 64-bit inode number.
    pub fn flatten(&self) -> u64 {
        if self.is_igif() {
            return self.seq;
        }

        let seq = self.seq;
        let ino = (seq << 24)
            .wrapping_add((seq >> 24) & 0xff_ffff_0000)
            .wrapping_add(u64::from(self.oid));

        if ino == 0 { u64::from(self.oid) } else { ino }
    }

    /// Flatten into a 32-bit inode number.
    ///
    /// The high bits of the OID land in higher bits of the result so objects
    /// created close together in time rarely collide.
    pub fn flatten32(&self) -> u32 {
        if self.is_igif() {
            return self.seq as u32;
        }

        let seq = self.seq.wrapping_sub(FID_SEQ_START);
        let oid = u64::from(self.oid);
        let ino = ((seq & 0x000f_ffff) << 12)
            .wrapping_add((seq >> 8) & 0xffff_f000)
            .wrapping_add((seq >> 32) & 0xffff_ff00)
            .wrapping_add(oid & 0xff00_0fff)
            .wrapping_add((oid & 0x00ff_f000) << 8) as u32;

        if ino == 0 { self.oid } else { ino }
    }

    /// Inode number presented to the external protocol.
    ///
    /// This is also the inode cache hash key.
    pub fn build_ino(&self, api32: bool) -> u64 {
        if api32 {
            u64::from(self.flatten32())
        } else {
            self.flatten()
        }
    }

    /// Generation number paired with [`Fid::build_ino`].
    pub fn build_gen(&self) -> u32 {
        if self.is_igif() {
            return self.oid;
        }
        (self.flatten() >> 32) as u32
    }

    pub fn to_le_bytes(&self) -> [u8; FID_LEN] {
        let mut out = [0u8; FID_LEN];
        out[..8].copy_from_slice(&self.seq.to_le_bytes());
        out[8..12].copy_from_slice(&self.oid.to_le_bytes());
        out[12..].copy_from_slice(&self.ver.to_le_bytes());
        out
    }

    pub fn from_le_bytes(bytes: &[u8; FID_LEN]) -> Self {
        let mut seq = [0u8; 8];
        let mut oid = [0u8; 4];
        let mut ver = [0u8; 4];
        seq.copy_from_slice(&bytes[..8]);
        oid.copy_from_slice(&bytes[8..12]);
        ver.copy_from_slice(&bytes[12..]);
        Self {
            seq: u64::from_le_bytes(seq),
            oid: u32::from_le_bytes(oid),
            ver: u32::from_le_bytes(ver),
        }
    }
}

impl fmt::Display for Fid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}:{:#x}:{:#x}]", self.seq, self.oid, self.ver)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FidParseError {
    #[error("expected three ':'-separated fields, got {0}")]
    FieldCount(usize),

    #[error("invalid {field} field '{value}'")]
    InvalidField { field: &'static str, value: String },
}

fn parse_hex_field<T>(field: &'static str, value: &str) -> Result<T, FidParseError>
where
    T: TryFrom<u64>,
{
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u64::from_str_radix(digits, 16)
        .ok()
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| FidParseError::InvalidField {
            field,
            value: value.to_string(),
        })
}

impl FromStr for Fid {
    type Err = FidParseError;

    /// Parses `[0x<seq>:0x<oid>:0x<ver>]`; brackets and `0x` prefixes are optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(trimmed);

        let fields: Vec<&str> = inner.split(':').map(str::trim).collect();
        if fields.len() != 3 {
            return Err(FidParseError::FieldCount(fields.len()));
        }

        Ok(Fid {
            seq: parse_hex_field("seq", fields[0])?,
            oid: parse_hex_field("oid", fields[1])?,
            ver: parse_hex_field("ver", fields[2])?,
        })
    }
}

/// Hash a filesystem UUID string into the 32-bit value used as the export fsid.
pub fn uuid_to_int(name: &[u8]) -> u32 {
    let mut key0: u32 = 0x12a3_fe2d;
    let mut key1: u32 = 0x37ab_e8f9;

    for &byte in name {
        // Bytes are mixed in as signed chars.
        let mixed = i32::from(byte as i8).wrapping_mul(7_152_373) as u32;
        let mut key = key1.wrapping_add(key0 ^ mixed);
        if key & 0x8000_0000 != 0 {
            key = key.wrapping_sub(0x7fff_ffff);
        }
        key1 = key0;
        key0 = key;
    }

    key0 << 1
}
