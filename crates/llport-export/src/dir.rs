//! Directory enumeration.

use llport_core::Fid;
use llport_core::fid::FID_LEN;

use crate::inode::Inode;
use crate::metadata::MdError;

/// One entry produced by a directory scan. The FID is stored as it appears
/// in the directory page: little-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub fid_le: [u8; FID_LEN],
    pub name: String,
    /// Position of the entry in the directory stream.
    pub hash: u64,
}

impl DirEntry {
    pub fn new(fid: Fid, name: impl Into<String>, hash: u64) -> Self {
        Self {
            fid_le: fid.to_le_bytes(),
            name: name.into(),
            hash,
        }
    }

    pub fn fid(&self) -> Fid {
        Fid::from_le_bytes(&self.fid_le)
    }
}

/// What a scan actor wants after seeing an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirAction {
    Continue,
    Stop,
}

/// Reads a directory's entries in stream order.
pub trait DirectoryReader: Send + Sync {
    /// Feed entries starting at `*pos` to `actor` until it returns
    /// [`DirAction::Stop`] or the directory is exhausted. `*pos` is left just
    /// past the last entry handed out.
    fn read_dir(
        &self,
        dir: &Inode,
        pos: &mut u64,
        actor: &mut dyn FnMut(&DirEntry) -> DirAction,
    ) -> Result<(), MdError>;
}
