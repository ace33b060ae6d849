//! FID to inode resolution.

use std::sync::Arc;

use llport_core::Fid;
use tracing::{debug, instrument, trace};

use crate::error::ExportError;
use crate::inode::{Inode, InodeCache};
use crate::metadata::{MdOpData, MetadataService};

/// Looks FIDs up in the inode cache, falling back to a metadata `getattr`.
///
/// Inode numbers are built with the width the cache was created with.
pub struct IdentityResolver {
    cache: Arc<InodeCache>,
    md: Arc<dyn MetadataService>,
}

impl IdentityResolver {
    pub fn new(cache: Arc<InodeCache>, md: Arc<dyn MetadataService>) -> Self {
        Self { cache, md }
    }

    pub fn cache(&self) -> &Arc<InodeCache> {
        &self.cache
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataService> {
        &self.md
    }

    pub fn need_32bit_api(&self) -> bool {
        self.cache.need_32bit_api()
    }

    /// The inode for `fid`, from cache or freshly fetched.
    ///
    /// Metadata failures are returned as-is and leave the cache unchanged.
    /// Clients routinely present handles to objects that are gone, so those
    /// failures are only logged at debug level. A miss that grows the cache
    /// past its limit evicts unreferenced inodes.
    #[instrument(level = "debug", skip(self), fields(fid = %fid))]
    pub fn resolve(&self, fid: &Fid) -> Result<Arc<Inode>, ExportError> {
        trace!(hash = self.cache.hash(fid), "searching inode");

        if let Some(inode) = self.cache.find(fid) {
            return Ok(inode);
        }

        let ea_size = self.md.default_md_size()?;
        let body = self
            .md
            .getattr(&MdOpData::by_fid(*fid, ea_size))
            .inspect_err(|e| debug!(rc = e.rc, "can't get object attrs"))?;

        let inode = Inode::from_body(&body, self.need_32bit_api())?;
        if inode.fid() != *fid {
            debug!(reply = %inode.fid(), "getattr reply names a different object");
            return Err(ExportError::InvalidReply(format!(
                "requested {fid}, reply carries {}",
                inode.fid()
            )));
        }
        let inode = self.cache.insert_or_get(inode);
        self.cache.shrink();
        Ok(inode)
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("cache", &self.cache.stats())
            .field("need_32bit_api", &self.need_32bit_api())
            .finish_non_exhaustive()
    }
}
