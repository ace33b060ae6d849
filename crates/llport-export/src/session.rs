//! A mounted filesystem as seen by the export layer.

use std::sync::Arc;

use llport_core::Fid;
use tracing::{debug, instrument, trace};

use crate::config::ExportConfig;
use crate::dentry::Dentry;
use crate::dir::DirectoryReader;
use crate::error::ExportError;
use crate::handle::{EncodedHandle, LustreFileHandle};
use crate::inode::{Inode, InodeCache};
use crate::metadata::MetadataService;
use crate::names::find_name;
use crate::ops::ExportOperations;
use crate::parent::get_parent_fid;
use crate::resolver::IdentityResolver;

/// Owns the inode cache and the collaborators used to resolve handles.
pub struct ExportSession {
    config: ExportConfig,
    resolver: IdentityResolver,
    dir_reader: Option<Arc<dyn DirectoryReader>>,
}

impl ExportSession {
    pub fn new(config: ExportConfig, md: Arc<dyn MetadataService>) -> Self {
        let cache = Arc::new(InodeCache::from_config(&config));
        Self {
            resolver: IdentityResolver::new(cache, md),
            config,
            dir_reader: None,
        }
    }

    /// A session sharing an existing inode cache.
    ///
    /// The cache must hash inode numbers with the width `config` asks for.
    pub fn with_cache(
        config: ExportConfig,
        md: Arc<dyn MetadataService>,
        cache: Arc<InodeCache>,
    ) -> Result<Self, ExportError> {
        if cache.need_32bit_api() != config.need_32bit_api {
            return Err(ExportError::CacheModeMismatch {
                cache: cache.need_32bit_api(),
                session: config.need_32bit_api,
            });
        }
        Ok(Self {
            resolver: IdentityResolver::new(cache, md),
            config,
            dir_reader: None,
        })
    }

    #[must_use]
    pub fn with_directory_reader(mut self, reader: Arc<dyn DirectoryReader>) -> Self {
        self.dir_reader = Some(reader);
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<InodeCache> {
        self.resolver.cache()
    }

    pub fn fsid(&self) -> u32 {
        self.config.fsid()
    }

    /// Resolve `fid` to a cached inode.
    pub fn iget(&self, fid: &Fid) -> Result<Arc<Inode>, ExportError> {
        self.resolver.resolve(fid)
    }

    /// Dentry for `fid`, marked as reached through an external handle.
    ///
    /// Insane FIDs and bad inodes are stale. An insane FID never reaches the
    /// metadata service.
    #[instrument(level = "debug", skip(self), fields(fid = %fid))]
    pub fn iget_for_nfs(&self, fid: &Fid) -> Result<Arc<Dentry>, ExportError> {
        if !fid.is_sane() {
            trace!("insane fid");
            return Err(ExportError::Stale);
        }

        let inode = self.resolver.resolve(fid)?;
        if inode.is_bad() {
            debug!("resolved inode is bad");
            return Err(ExportError::Stale);
        }

        let dentry = Dentry::obtain_alias(inode);
        dentry.data().nfs_dentry = true;
        Ok(dentry)
    }
}

impl std::fmt::Debug for ExportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportSession")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("has_dir_reader", &self.dir_reader.is_some())
            .finish()
    }
}

impl ExportOperations for ExportSession {
    #[instrument(level = "debug", skip_all, fields(fsname = %self.config.fsname, fid = %inode.fid(), maxlen = buf.len()))]
    fn encode_fh(
        &self,
        inode: &Inode,
        parent: Option<&Inode>,
        buf: &mut [u8],
    ) -> Result<EncodedHandle, ExportError> {
        LustreFileHandle::new(inode.fid(), parent.map(Inode::fid)).encode_into(buf)
    }

    fn fh_to_dentry(&self, fh: &[u8], fh_type: u8) -> Result<Arc<Dentry>, ExportError> {
        let handle = LustreFileHandle::decode(fh_type, fh)?;
        self.iget_for_nfs(&handle.child)
    }

    fn fh_to_parent(&self, fh: &[u8], fh_type: u8) -> Result<Arc<Dentry>, ExportError> {
        let handle = LustreFileHandle::decode(fh_type, fh)?;
        self.iget_for_nfs(&handle.parent)
    }

    fn get_name(&self, dir: &Dentry, child: &Dentry) -> Result<String, ExportError> {
        find_name(self.dir_reader.as_deref(), dir.inode(), &child.fid())
    }

    fn get_parent(&self, child: &Dentry) -> Result<Arc<Dentry>, ExportError> {
        let parent = get_parent_fid(
            self.resolver.metadata().as_ref(),
            &self.config.fsname,
            child.inode(),
        )?;
        self.iget_for_nfs(&parent)
    }
}
