//! In-memory inodes and the hash-indexed inode cache.
//!
//! The cache is keyed by the FID's inode number ([`Fid::build_ino`]). Distinct
//! FIDs may share an inode number, so each key holds a short list of inodes
//! and every lookup confirms FID equality. An inode's FID never changes after
//! it is created.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use llport_core::Fid;
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, trace};

use crate::config::{DEFAULT_INODE_CACHE_LIMIT, ExportConfig};
use crate::dentry::Dentry;
use crate::error::ExportError;
use crate::metadata::{MdtBody, OBD_MD_FLMODE, OBD_MD_FLTYPE};

/// File type bits of `mode`.
pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;

/// Attributes refreshed from metadata replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InodeAttrs {
    pub mode: u32,
    pub size: u64,
    pub nlink: u32,
    pub ea_size: u32,
}

impl InodeAttrs {
    fn from_body(body: &MdtBody) -> Self {
        Self {
            mode: body.mode,
            size: body.size,
            nlink: body.nlink,
            ea_size: body.ea_size,
        }
    }
}

/// A cached filesystem object.
#[derive(Debug)]
pub struct Inode {
    fid: Fid,
    ino: u64,
    generation: u32,
    attrs: RwLock<InodeAttrs>,
    bad: AtomicBool,
    /// Serializes directory modification and scans.
    dir_lock: Mutex<()>,
    alias: Mutex<Weak<Dentry>>,
}

impl Inode {
    pub fn new(fid: Fid, attrs: InodeAttrs, api32: bool) -> Self {
        Self {
            fid,
            ino: fid.build_ino(api32),
            generation: fid.build_gen(),
            attrs: RwLock::new(attrs),
            bad: AtomicBool::new(false),
            dir_lock: Mutex::new(()),
            alias: Mutex::new(Weak::new()),
        }
    }

    /// Build an inode from a getattr reply.
    ///
    /// A reply that carries no file type yields a bad inode. A reply whose FID
    /// is not sane is rejected.
    pub fn from_body(body: &MdtBody, api32: bool) -> Result<Self, ExportError> {
        if !body.fid1.is_sane() {
            return Err(ExportError::InvalidReply(format!(
                "reply carries invalid fid {}",
                body.fid1
            )));
        }
        let inode = Self::new(body.fid1, InodeAttrs::from_body(body), api32);
        let typed = body.valid & (OBD_MD_FLTYPE | OBD_MD_FLMODE) != 0 && body.mode & S_IFMT != 0;
        if !typed {
            inode.make_bad();
        }
        Ok(inode)
    }

    pub fn fid(&self) -> Fid {
        self.fid
    }

    /// Cache hash key.
    pub fn ino(&self) -> u64 {
        self.ino
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn attrs(&self) -> InodeAttrs {
        *self.attrs.read()
    }

    pub fn set_attrs(&self, attrs: InodeAttrs) {
        *self.attrs.write() = attrs;
    }

    pub fn is_dir(&self) -> bool {
        self.attrs.read().mode & S_IFMT == S_IFDIR
    }

    pub fn is_bad(&self) -> bool {
        self.bad.load(Ordering::Acquire)
    }

    pub fn make_bad(&self) {
        self.bad.store(true, Ordering::Release);
    }

    /// Take the directory modification lock.
    pub fn lock_dir(&self) -> MutexGuard<'_, ()> {
        self.dir_lock.lock()
    }

    pub(crate) fn alias_slot(&self) -> MutexGuard<'_, Weak<Dentry>> {
        self.alias.lock()
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Insertions under a key already holding a different FID.
    pub collisions: u64,
    pub evictions: u64,
}

/// Sharded inode cache.
///
/// The inode number width is fixed when the cache is built, so one FID always
/// hashes to one key no matter who looks it up.
///
/// # Thread Safety
///
/// Each key is guarded by its `DashMap` shard lock, so inserting a FID is
/// atomic: two threads racing to insert the same FID end up sharing one
/// inode.
#[derive(Debug)]
pub struct InodeCache {
    inodes: DashMap<u64, Vec<Arc<Inode>>>,
    need_32bit_api: bool,
    limit: usize,
    entries: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    collisions: AtomicU64,
    evictions: AtomicU64,
}

impl Default for InodeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeCache {
    /// A cache of 64-bit inode numbers.
    pub fn new() -> Self {
        Self::with_api(false)
    }

    pub fn with_api(need_32bit_api: bool) -> Self {
        Self {
            inodes: DashMap::new(),
            need_32bit_api,
            limit: DEFAULT_INODE_CACHE_LIMIT,
            entries: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            collisions: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::with_api(config.need_32bit_api).with_limit(config.inode_cache_limit)
    }

    /// Evict unreferenced inodes once more than `limit` are cached.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn need_32bit_api(&self) -> bool {
        self.need_32bit_api
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Hash key of `fid` in this cache.
    pub fn hash(&self, fid: &Fid) -> u64 {
        fid.build_ino(self.need_32bit_api)
    }

    /// Find the cached inode for `fid`.
    pub fn find(&self, fid: &Fid) -> Option<Arc<Inode>> {
        let found = self
            .inodes
            .get(&self.hash(fid))
            .and_then(|bucket| bucket.iter().find(|inode| inode.fid == *fid).cloned());
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Insert `inode`, or return the inode already cached for its FID.
    ///
    /// When another thread won the race, the winner is returned with its
    /// attributes refreshed from `inode`.
    pub fn insert_or_get(&self, inode: Inode) -> Arc<Inode> {
        let hash = self.hash(&inode.fid);
        let mut bucket = self.inodes.entry(hash).or_default();
        if let Some(existing) = bucket.iter().find(|cached| cached.fid == inode.fid) {
            trace!(fid = %inode.fid, "inode inserted concurrently, reusing");
            existing.set_attrs(inode.attrs());
            if inode.is_bad() {
                existing.make_bad();
            }
            return Arc::clone(existing);
        }
        if !bucket.is_empty() {
            self.collisions.fetch_add(1, Ordering::Relaxed);
            trace!(fid = %inode.fid, hash, "inode number collision");
        }
        let inode = Arc::new(inode);
        bucket.push(Arc::clone(&inode));
        self.entries.fetch_add(1, Ordering::Relaxed);
        inode
    }

    /// Drop inodes that nothing outside the cache refers to. Returns how many
    /// were evicted.
    pub fn prune(&self) -> usize {
        let mut evicted = 0;
        self.inodes.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|inode| Arc::strong_count(inode) > 1);
            evicted += before - bucket.len();
            !bucket.is_empty()
        });
        self.entries.fetch_sub(evicted, Ordering::Relaxed);
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    /// Prune if the cache holds more than its limit.
    ///
    /// Must not be called while holding an entry of this cache.
    pub fn shrink(&self) -> usize {
        if self.len() <= self.limit {
            return 0;
        }
        let evicted = self.prune();
        debug!(evicted, remaining = self.len(), limit = self.limit, "inode cache shrunk");
        evicted
    }

    /// Number of cached inodes.
    pub fn len(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            collisions: self.collisions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::OBD_MD_FLID;

    fn file_attrs() -> InodeAttrs {
        InodeAttrs {
            mode: S_IFREG | 0o644,
            ..InodeAttrs::default()
        }
    }

    #[test]
    fn test_find_requires_fid_match() {
        let cache = InodeCache::new();
        let a = Fid::new(0x200000400, 0x1000005, 0);
        let b = Fid::new(0x200000401, 5, 0);
        assert_eq!(a.flatten(), b.flatten());

        let inode_a = cache.insert_or_get(Inode::new(a, file_attrs(), false));
        assert!(cache.find(&b).is_none());

        let inode_b = cache.insert_or_get(Inode::new(b, file_attrs(), false));
        assert!(!Arc::ptr_eq(&inode_a, &inode_b));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().collisions, 1);
        assert!(Arc::ptr_eq(&cache.find(&b).unwrap(), &inode_b));
    }

    #[test]
    fn test_duplicate_insert_returns_existing() {
        let cache = InodeCache::new();
        let fid = Fid::new(0x200000400, 1, 0);
        let first = cache.insert_or_get(Inode::new(fid, file_attrs(), false));

        let refreshed = InodeAttrs {
            size: 42,
            ..file_attrs()
        };
        let second = cache.insert_or_get(Inode::new(fid, refreshed, false));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.attrs().size, 42);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_prune_keeps_referenced() {
        let cache = InodeCache::new();
        let kept = cache.insert_or_get(Inode::new(Fid::new(0x200000400, 1, 0), file_attrs(), false));
        drop(cache.insert_or_get(Inode::new(Fid::new(0x200000400, 2, 0), file_attrs(), false)));

        assert_eq!(cache.prune(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.find(&kept.fid()).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_shrink_respects_limit() {
        let cache = InodeCache::new().with_limit(2);
        let held = cache.insert_or_get(Inode::new(Fid::new(0x200000400, 1, 0), file_attrs(), false));
        for oid in 2..=3 {
            drop(cache.insert_or_get(Inode::new(Fid::new(0x200000400, oid, 0), file_attrs(), false)));
        }
        assert_eq!(cache.len(), 3);

        assert_eq!(cache.shrink(), 2);
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&cache.find(&held.fid()).unwrap(), &held));
        // At or under the limit nothing is touched
        drop(cache.insert_or_get(Inode::new(Fid::new(0x200000400, 4, 0), file_attrs(), false)));
        assert_eq!(cache.shrink(), 0);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_api32_cache_hashes_by_short_number() {
        let cache = InodeCache::with_api(true);
        let fid = Fid::new(0x200000400, 1, 0);
        assert_eq!(cache.hash(&fid), 0x400001);
        let inode = cache.insert_or_get(Inode::new(fid, file_attrs(), true));
        assert!(Arc::ptr_eq(&cache.find(&fid).unwrap(), &inode));
    }

    #[test]
    fn test_from_body_marks_untyped_bad() {
        let body = MdtBody {
            fid1: Fid::new(0x200000400, 9, 0),
            valid: OBD_MD_FLID,
            ..MdtBody::default()
        };
        assert!(Inode::from_body(&body, false).unwrap().is_bad());

        let typed = MdtBody {
            valid: OBD_MD_FLID | OBD_MD_FLTYPE,
            mode: S_IFDIR | 0o755,
            ..body.clone()
        };
        let inode = Inode::from_body(&typed, false).unwrap();
        assert!(!inode.is_bad());
        assert!(inode.is_dir());

        let insane = MdtBody {
            fid1: Fid::ZERO,
            ..typed
        };
        assert!(matches!(
            Inode::from_body(&insane, false),
            Err(ExportError::InvalidReply(_))
        ));
    }

    #[test]
    fn test_api32_hash() {
        let fid = Fid::new(0x200000400, 1, 0);
        assert_eq!(Inode::new(fid, file_attrs(), true).ino(), 0x400001);
        assert_eq!(Inode::new(fid, file_attrs(), false).ino(), 0x0200_0004_0000_0001);
    }
}
