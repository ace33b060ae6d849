//! Storage I/O layer seen by the zero-range writer.
//!
//! Addresses are 512-byte sectors. A physical block `pblk` of a filesystem with
//! `2^block_bits`-byte blocks starts at sector `pblk << (block_bits - 9)`.
//!
//! Two outcomes are distinguished on purpose: `Err(_)` means the request could
//! not be submitted, `Ok(IoStatus::Failed(_))` means it was submitted and the
//! device completed it with an error.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;
use tracing::debug;

/// `log2` of the sector size.
pub const SECTOR_SHIFT: u32 = 9;
/// Sector size in bytes.
pub const SECTOR_SIZE: usize = 1 << SECTOR_SHIFT;

/// Completion status of a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStatus {
    Ok,
    /// Completed with the given errno.
    Failed(i32),
}

impl IoStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, IoStatus::Ok)
    }
}

/// First sector of physical block `pblk`.
pub fn pblk_to_sector(pblk: u64, block_bits: u32) -> u64 {
    pblk << (block_bits - SECTOR_SHIFT)
}

/// Synchronous block device.
pub trait BlockDevice: Send + Sync {
    /// Write `buf` at `sector`, blocking until the device acknowledges it.
    fn write_sync(&self, sector: u64, buf: &[u8]) -> io::Result<IoStatus>;

    /// Read `buf.len()` bytes at `sector`, blocking until complete.
    fn read_sync(&self, sector: u64, buf: &mut [u8]) -> io::Result<IoStatus>;
}

/// A block device backed by a regular file (an image file).
#[derive(Debug)]
pub struct FileBlockDevice {
    file: Mutex<File>,
}

impl FileBlockDevice {
    /// Open (or create) an image file for read/write access.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        debug!(path = %path.display(), "opened block image");
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    pub fn from_file(file: File) -> Self {
        Self {
            file: Mutex::new(file),
        }
    }
}

impl BlockDevice for FileBlockDevice {
    fn write_sync(&self, sector: u64, buf: &[u8]) -> io::Result<IoStatus> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(sector << SECTOR_SHIFT))?;
        file.write_all(buf)?;
        file.sync_data()?;
        Ok(IoStatus::Ok)
    }

    fn read_sync(&self, sector: u64, buf: &mut [u8]) -> io::Result<IoStatus> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(sector << SECTOR_SHIFT))?;
        match file.read_exact(buf) {
            Ok(()) => Ok(IoStatus::Ok),
            // Reading past the end of a sparse image yields zeroes.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                let len = file.metadata()?.len();
                let start = (sector << SECTOR_SHIFT).min(len);
                let available = (len - start) as usize;
                file.seek(SeekFrom::Start(start))?;
                file.read_exact(&mut buf[..available])?;
                buf[available..].fill(0);
                Ok(IoStatus::Ok)
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    data: Vec<u8>,
    writes: Vec<u64>,
    reject_submission: HashSet<u64>,
    fail_completion: HashSet<u64>,
}

/// In-memory block device with fault injection.
///
/// Records the sector of every accepted write so callers can check ordering.
#[derive(Debug, Default)]
pub struct MemoryBlockDevice {
    state: Mutex<MemoryState>,
}

impl MemoryBlockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to submit writes to `sector`.
    pub fn reject_submission_at(&self, sector: u64) {
        self.state.lock().reject_submission.insert(sector);
    }

    /// Accept writes to `sector` but complete them with `EIO`.
    pub fn fail_completion_at(&self, sector: u64) {
        self.state.lock().fail_completion.insert(sector);
    }

    /// Sectors of completed writes, in submission order.
    pub fn writes(&self) -> Vec<u64> {
        self.state.lock().writes.clone()
    }

    /// Copy of `len` bytes starting at `sector`.
    pub fn contents(&self, sector: u64, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        let _ = self.read_sync(sector, &mut out);
        out
    }
}

impl BlockDevice for MemoryBlockDevice {
    fn write_sync(&self, sector: u64, buf: &[u8]) -> io::Result<IoStatus> {
        let mut state = self.state.lock();
        if state.reject_submission.contains(&sector) {
            return Err(io::Error::other(format!(
                "submission rejected for sector {sector}"
            )));
        }
        if state.fail_completion.contains(&sector) {
            return Ok(IoStatus::Failed(libc::EIO));
        }

        let start = (sector as usize) << SECTOR_SHIFT;
        let end = start + buf.len();
        if state.data.len() < end {
            state.data.resize(end, 0);
        }
        state.data[start..end].copy_from_slice(buf);
        state.writes.push(sector);
        Ok(IoStatus::Ok)
    }

    fn read_sync(&self, sector: u64, buf: &mut [u8]) -> io::Result<IoStatus> {
        let state = self.state.lock();
        let start = (sector as usize) << SECTOR_SHIFT;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = state.data.get(start + i).copied().unwrap_or(0);
        }
        Ok(IoStatus::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pblk_to_sector() {
        assert_eq!(pblk_to_sector(0, 12), 0);
        assert_eq!(pblk_to_sector(3, 12), 24);
        assert_eq!(pblk_to_sector(3, 9), 3);
    }

    #[test]
    fn test_memory_device_roundtrip() {
        let dev = MemoryBlockDevice::new();
        assert_eq!(dev.write_sync(8, &[7u8; 512]).unwrap(), IoStatus::Ok);
        assert_eq!(dev.contents(8, 512), vec![7u8; 512]);
        assert_eq!(dev.contents(0, 16), vec![0u8; 16]);
        assert_eq!(dev.writes(), vec![8]);
    }

    #[test]
    fn test_memory_device_fault_injection() {
        let dev = MemoryBlockDevice::new();
        dev.reject_submission_at(1);
        dev.fail_completion_at(2);
        assert!(dev.write_sync(1, &[0u8; 512]).is_err());
        assert_eq!(
            dev.write_sync(2, &[0u8; 512]).unwrap(),
            IoStatus::Failed(libc::EIO)
        );
        assert!(dev.writes().is_empty());
    }

    #[test]
    fn test_file_device_roundtrip() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let dev = FileBlockDevice::open(tmp.path()).unwrap();

        dev.write_sync(4, &[0xaa; 1024]).unwrap();

        let mut buf = vec![0u8; 1024];
        dev.read_sync(4, &mut buf).unwrap();
        assert_eq!(buf, vec![0xaa; 1024]);

        // Past the end of the image reads back as zeroes
        let mut tail = vec![0xffu8; 512];
        dev.read_sync(100, &mut tail).unwrap();
        assert_eq!(tail, vec![0u8; 512]);
    }
}
