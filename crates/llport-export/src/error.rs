//! Error type for the export layer.
//!
//! Every failure maps to the POSIX errno the protocol server expects via
//! [`ExportError::errno`]. `Stale` is an expected outcome when a client holds
//! a handle to an object that no longer exists, and is never logged as an
//! error.

use thiserror::Error;

use crate::metadata::MdError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    // ========================================================================
    // Handle errors
    // ========================================================================
    /// The handle refers to an object that does not exist (or never did).
    #[error("Stale file handle")]
    Stale,

    /// The handle carries a foreign type tag or is malformed.
    #[error("Unrecognized file handle (type {fh_type:#x}, {len} bytes)")]
    Protocol { fh_type: u8, len: usize },

    /// The caller's handle buffer cannot hold the encoded handle.
    #[error("Handle buffer too small: {required} bytes required")]
    BufferTooSmall { required: usize },

    // ========================================================================
    // Name resolution errors
    // ========================================================================
    #[error("Not a directory")]
    NotDirectory,

    /// The directory has no way to enumerate its entries.
    #[error("Directory has no entry reader")]
    NoEntryReader,

    #[error("No directory entry refers to the object")]
    NotFound,

    // ========================================================================
    // Metadata service errors
    // ========================================================================
    /// The metadata service returned a body that does not describe an object.
    #[error("Invalid metadata reply: {0}")]
    InvalidReply(String),

    #[error(transparent)]
    Metadata(#[from] MdError),

    // ========================================================================
    // Setup errors
    // ========================================================================
    /// A shared inode cache hashes with a different inode number width.
    #[error("Inode cache uses need_32bit_api={cache}, session wants {session}")]
    CacheModeMismatch { cache: bool, session: bool },
}

impl ExportError {
    /// Positive POSIX errno for this error.
    pub fn errno(&self) -> i32 {
        match self {
            ExportError::Stale => libc::ESTALE,
            ExportError::Protocol { .. } | ExportError::InvalidReply(_) => libc::EPROTO,
            ExportError::BufferTooSmall { .. } => libc::EOVERFLOW,
            ExportError::NotDirectory => libc::ENOTDIR,
            ExportError::NoEntryReader | ExportError::CacheModeMismatch { .. } => libc::EINVAL,
            ExportError::NotFound => libc::ENOENT,
            ExportError::Metadata(e) => e.errno(),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, ExportError::Stale)
    }
}
