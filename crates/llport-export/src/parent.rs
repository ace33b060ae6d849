//! Parent lookup through the metadata service.

use llport_core::Fid;
use tracing::{debug, error, instrument};

use crate::error::ExportError;
use crate::inode::Inode;
use crate::metadata::{DOTDOT, MdOpData, MetadataService, OBD_MD_FLID};

/// FID of `dir`'s parent, looked up by `".."`.
///
/// The server may have lost the parent's FID. The reply then has no
/// [`OBD_MD_FLID`] and the zero FID is returned, which resolves as stale.
#[instrument(level = "debug", skip(md, dir), fields(dir = %dir.fid()))]
pub fn get_parent_fid(md: &dyn MetadataService, fsname: &str, dir: &Inode) -> Result<Fid, ExportError> {
    if !dir.is_dir() {
        return Err(ExportError::NotDirectory);
    }

    let ea_size = md.default_md_size()?;
    let body = md
        .getattr_name(&MdOpData::by_name(dir.fid(), DOTDOT, ea_size))
        .inspect_err(|e| {
            error!(
                "{fsname}: failure inode {} get parent: rc = {}",
                dir.fid(),
                e.rc
            );
        })?;

    if body.has(OBD_MD_FLID) {
        debug!(parent = %body.fid1, "parent found");
        Ok(body.fid1)
    } else {
        Ok(Fid::ZERO)
    }
}
