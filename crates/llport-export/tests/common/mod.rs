//! In-memory metadata service and directory reader for export tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use llport_core::Fid;
use llport_export::inode::{S_IFDIR, S_IFREG};
use llport_export::metadata::{DOTDOT, OBD_MD_FLID, OBD_MD_FLMODE, OBD_MD_FLTYPE};
use llport_export::{
    DirAction, DirEntry, DirectoryReader, ExportConfig, ExportSession, Inode, MdError, MdOpData,
    MdtBody, MetadataService,
};
use parking_lot::Mutex;

pub const ROOT: Fid = Fid::new(0x200000007, 1, 0);

pub fn fid(oid: u32) -> Fid {
    Fid::new(0x200000400, oid, 0)
}

#[derive(Default)]
struct Objects {
    bodies: HashMap<Fid, MdtBody>,
    /// `None` models a server that lost the parent's FID.
    parents: HashMap<Fid, Option<Fid>>,
    failing: HashMap<Fid, i32>,
}

/// Metadata service backed by a map, counting every request.
#[derive(Default)]
pub struct MemoryMetadata {
    objects: Mutex<Objects>,
    pub getattr_calls: AtomicUsize,
    pub getattr_name_calls: AtomicUsize,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        let md = Self::default();
        md.add_dir(ROOT, None);
        md
    }

    fn add(&self, fid: Fid, mode: u32, parent: Option<Option<Fid>>) {
        let mut objects = self.objects.lock();
        objects.bodies.insert(
            fid,
            MdtBody {
                fid1: fid,
                valid: OBD_MD_FLID | OBD_MD_FLTYPE | OBD_MD_FLMODE,
                mode,
                nlink: 1,
                ..MdtBody::default()
            },
        );
        if let Some(parent) = parent {
            objects.parents.insert(fid, parent);
        }
    }

    pub fn add_dir(&self, fid: Fid, parent: Option<Fid>) {
        self.add(fid, S_IFDIR | 0o755, Some(parent));
    }

    pub fn add_file(&self, fid: Fid) {
        self.add(fid, S_IFREG | 0o644, None);
    }

    /// An object whose reply carries no file type.
    pub fn add_untyped(&self, fid: Fid) {
        self.objects.lock().bodies.insert(
            fid,
            MdtBody {
                fid1: fid,
                valid: OBD_MD_FLID,
                ..MdtBody::default()
            },
        );
    }

    pub fn fail_for(&self, fid: Fid, rc: i32) {
        self.objects.lock().failing.insert(fid, rc);
    }

    pub fn calls(&self) -> usize {
        self.getattr_calls.load(Ordering::SeqCst) + self.getattr_name_calls.load(Ordering::SeqCst)
    }
}

impl MetadataService for MemoryMetadata {
    fn default_md_size(&self) -> Result<u32, MdError> {
        Ok(256)
    }

    fn getattr(&self, op: &MdOpData) -> Result<MdtBody, MdError> {
        self.getattr_calls.fetch_add(1, Ordering::SeqCst);
        let objects = self.objects.lock();
        if let Some(&rc) = objects.failing.get(&op.fid1) {
            return Err(MdError::new(rc));
        }
        objects
            .bodies
            .get(&op.fid1)
            .cloned()
            .ok_or(MdError::new(-libc::ENOENT))
    }

    fn getattr_name(&self, op: &MdOpData) -> Result<MdtBody, MdError> {
        self.getattr_name_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(op.name.as_deref(), Some(DOTDOT));
        let objects = self.objects.lock();
        if let Some(&rc) = objects.failing.get(&op.fid1) {
            return Err(MdError::new(rc));
        }
        match objects.parents.get(&op.fid1) {
            Some(Some(parent)) => Ok(objects.bodies.get(parent).cloned().unwrap_or(MdtBody {
                fid1: *parent,
                valid: OBD_MD_FLID,
                ..MdtBody::default()
            })),
            Some(None) => Ok(MdtBody::default()),
            None => Err(MdError::new(-libc::ENOENT)),
        }
    }
}

/// Directory contents keyed by directory FID.
#[derive(Default)]
pub struct MemoryDirectories {
    entries: Mutex<HashMap<Fid, Vec<DirEntry>>>,
    pub visited: AtomicUsize,
}

impl MemoryDirectories {
    pub fn link(&self, dir: Fid, name: &str, child: Fid) {
        let mut entries = self.entries.lock();
        let list = entries.entry(dir).or_default();
        let hash = list.len() as u64;
        list.push(DirEntry::new(child, name, hash));
    }
}

impl DirectoryReader for MemoryDirectories {
    fn read_dir(
        &self,
        dir: &Inode,
        pos: &mut u64,
        actor: &mut dyn FnMut(&DirEntry) -> DirAction,
    ) -> Result<(), MdError> {
        let entries = self.entries.lock();
        let Some(list) = entries.get(&dir.fid()) else {
            return Ok(());
        };
        for entry in list.iter().skip(*pos as usize) {
            self.visited.fetch_add(1, Ordering::SeqCst);
            *pos = entry.hash + 1;
            if actor(entry) == DirAction::Stop {
                break;
            }
        }
        Ok(())
    }
}

pub struct Harness {
    pub md: Arc<MemoryMetadata>,
    pub dirs: Arc<MemoryDirectories>,
    pub session: ExportSession,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ExportConfig::default())
    }

    pub fn with_config(config: ExportConfig) -> Self {
        let md = Arc::new(MemoryMetadata::new());
        let dirs = Arc::new(MemoryDirectories::default());
        let session = ExportSession::new(config, md.clone()).with_directory_reader(dirs.clone());
        Self { md, dirs, session }
    }
}
