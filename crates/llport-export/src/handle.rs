//! External file handle codec.
//!
//! Wire format, 32 bytes:
//!
//! | bytes   | field                                   |
//! |---------|-----------------------------------------|
//! | `0..16` | child FID, little-endian                |
//! | `16..32`| parent FID, little-endian (zero if none)|
//!
//! Handles are tagged with [`FILEID_LUSTRE`]; decoding refuses any other tag.

use llport_core::Fid;
use llport_core::fid::FID_LEN;

use crate::error::ExportError;

/// Handle type tag of this codec.
pub const FILEID_LUSTRE: u8 = 0x97;
/// Handle type tag reporting an encoding failure.
pub const FILEID_INVALID: u8 = 0xff;
/// Encoded handle length in bytes.
pub const LUSTRE_FH_LEN: usize = 2 * FID_LEN;

/// Decoded handle contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LustreFileHandle {
    pub child: Fid,
    pub parent: Fid,
}

/// Result of a successful encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedHandle {
    pub fh_type: u8,
    pub len: usize,
}

impl LustreFileHandle {
    pub fn new(child: Fid, parent: Option<Fid>) -> Self {
        Self {
            child,
            parent: parent.unwrap_or(Fid::ZERO),
        }
    }

    pub fn has_parent(&self) -> bool {
        !self.parent.is_zero()
    }

    pub fn to_bytes(&self) -> [u8; LUSTRE_FH_LEN] {
        let mut out = [0u8; LUSTRE_FH_LEN];
        out[..FID_LEN].copy_from_slice(&self.child.to_le_bytes());
        out[FID_LEN..].copy_from_slice(&self.parent.to_le_bytes());
        out
    }

    /// Write the handle to the front of `buf`.
    ///
    /// An undersized `buf` is left untouched and the error carries the length
    /// needed.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<EncodedHandle, ExportError> {
        if buf.len() < LUSTRE_FH_LEN {
            return Err(ExportError::BufferTooSmall {
                required: LUSTRE_FH_LEN,
            });
        }
        buf[..LUSTRE_FH_LEN].copy_from_slice(&self.to_bytes());
        Ok(EncodedHandle {
            fh_type: FILEID_LUSTRE,
            len: LUSTRE_FH_LEN,
        })
    }

    /// Parse a handle of type `fh_type`.
    pub fn decode(fh_type: u8, buf: &[u8]) -> Result<Self, ExportError> {
        if fh_type != FILEID_LUSTRE || buf.len() < LUSTRE_FH_LEN {
            return Err(ExportError::Protocol {
                fh_type,
                len: buf.len(),
            });
        }
        let mut child = [0u8; FID_LEN];
        let mut parent = [0u8; FID_LEN];
        child.copy_from_slice(&buf[..FID_LEN]);
        parent.copy_from_slice(&buf[FID_LEN..LUSTRE_FH_LEN]);
        Ok(Self {
            child: Fid::from_le_bytes(&child),
            parent: Fid::from_le_bytes(&parent),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use proptest::prelude::*;

    #[test]
    fn test_wire_layout() {
        let handle = LustreFileHandle::new(Fid::new(0x200000400, 1, 0), Some(Fid::new(0x200000007, 1, 0)));
        assert_eq!(
            handle.to_bytes(),
            hex!("0004000002000000010000000000000007000000020000000100000000000000")
        );
    }

    #[test]
    fn test_child_only_has_zero_parent() {
        let handle = LustreFileHandle::new(Fid::new(0x200000400, 1, 0), None);
        assert!(!handle.has_parent());
        assert_eq!(&handle.to_bytes()[FID_LEN..], &[0u8; FID_LEN]);
    }

    #[test]
    fn test_short_buffer_untouched() {
        let handle = LustreFileHandle::new(Fid::new(0x200000400, 1, 0), None);
        let mut buf = [0xa5u8; LUSTRE_FH_LEN - 1];
        assert_eq!(
            handle.encode_into(&mut buf),
            Err(ExportError::BufferTooSmall {
                required: LUSTRE_FH_LEN
            })
        );
        assert_eq!(buf, [0xa5u8; LUSTRE_FH_LEN - 1]);
    }

    #[test]
    fn test_truncated_handle_rejected() {
        let bytes = LustreFileHandle::default().to_bytes();
        assert!(matches!(
            LustreFileHandle::decode(FILEID_LUSTRE, &bytes[..20]),
            Err(ExportError::Protocol { len: 20, .. })
        ));
    }

    proptest! {
        #[test]
        fn test_foreign_tags_rejected(tag in any::<u8>().prop_filter("own tag", |t| *t != FILEID_LUSTRE)) {
            let bytes = LustreFileHandle::default().to_bytes();
            let rejected = matches!(
                LustreFileHandle::decode(tag, &bytes),
                Err(ExportError::Protocol { .. })
            );
            prop_assert!(rejected);
        }

        #[test]
        fn test_encode_decode(seq in any::<u64>(), oid in any::<u32>(), pseq in any::<u64>(), poid in any::<u32>()) {
            let handle = LustreFileHandle::new(Fid::new(seq, oid, 0), Some(Fid::new(pseq, poid, 0)));
            let mut buf = [0u8; 64];
            let encoded = handle.encode_into(&mut buf).unwrap();
            prop_assert_eq!(encoded, EncodedHandle { fh_type: FILEID_LUSTRE, len: LUSTRE_FH_LEN });
            prop_assert_eq!(LustreFileHandle::decode(encoded.fh_type, &buf[..encoded.len]).unwrap(), handle);
        }
    }
}
