//! Export operations offered to the protocol server.

use std::sync::Arc;

use crate::dentry::Dentry;
use crate::error::ExportError;
use crate::handle::EncodedHandle;
use crate::inode::Inode;

/// The hooks an NFS server needs to export the filesystem.
pub trait ExportOperations {
    /// Encode `inode` (and optionally `parent`) into `buf`.
    fn encode_fh(
        &self,
        inode: &Inode,
        parent: Option<&Inode>,
        buf: &mut [u8],
    ) -> Result<EncodedHandle, ExportError>;

    /// Dentry for the child named by a handle.
    fn fh_to_dentry(&self, fh: &[u8], fh_type: u8) -> Result<Arc<Dentry>, ExportError>;

    /// Dentry for the parent named by a handle.
    fn fh_to_parent(&self, fh: &[u8], fh_type: u8) -> Result<Arc<Dentry>, ExportError>;

    /// Name under which `child` appears in `dir`.
    fn get_name(&self, dir: &Dentry, child: &Dentry) -> Result<String, ExportError>;

    /// Dentry for the parent directory of `child`.
    fn get_parent(&self, child: &Dentry) -> Result<Arc<Dentry>, ExportError>;
}
