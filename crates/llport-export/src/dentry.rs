//! Dentries handed back to the protocol server.

use std::sync::Arc;

use llport_core::Fid;
use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use crate::inode::Inode;

/// Per-dentry filesystem data, guarded by the dentry's own lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DentryData {
    /// Set once the dentry has been reached through an external handle. File
    /// opens through such a dentry keep the open cache enabled.
    pub nfs_dentry: bool,
}

/// A name-cache entry aliasing an inode.
#[derive(Debug)]
pub struct Dentry {
    inode: Arc<Inode>,
    /// Not attached to a parent; created straight from an identifier.
    disconnected: bool,
    data: Mutex<DentryData>,
}

impl Dentry {
    /// The existing alias of `inode`, or a new disconnected one.
    pub fn obtain_alias(inode: Arc<Inode>) -> Arc<Dentry> {
        let mut slot = inode.alias_slot();
        if let Some(existing) = slot.upgrade() {
            return existing;
        }
        trace!(fid = %inode.fid(), "allocating disconnected alias");
        let dentry = Arc::new(Dentry {
            inode: Arc::clone(&inode),
            disconnected: true,
            data: Mutex::new(DentryData::default()),
        });
        *slot = Arc::downgrade(&dentry);
        dentry
    }

    pub fn inode(&self) -> &Arc<Inode> {
        &self.inode
    }

    pub fn fid(&self) -> Fid {
        self.inode.fid()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn data(&self) -> MutexGuard<'_, DentryData> {
        self.data.lock()
    }

    pub fn is_nfs_dentry(&self) -> bool {
        self.data.lock().nfs_dentry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::InodeAttrs;

    #[test]
    fn test_alias_is_shared_while_alive() {
        let inode = Arc::new(Inode::new(Fid::new(0x200000400, 3, 0), InodeAttrs::default(), false));
        let first = Dentry::obtain_alias(Arc::clone(&inode));
        let second = Dentry::obtain_alias(Arc::clone(&inode));
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_disconnected());

        drop(first);
        drop(second);
        let third = Dentry::obtain_alias(inode);
        assert!(!third.is_nfs_dentry());
    }
}
