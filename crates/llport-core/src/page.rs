//! Page-cache pages as seen by the I/O completion path.
//!
//! The page cache itself is an external collaborator. This type carries only
//! what the completion path observes and transitions: the page's data, its
//! index in the file, and the `locked` / `uptodate` / `error` flags. Waiters
//! blocked on a locked page are released by [`Page::unlock`].

use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::crypto::PAGE_SIZE;

#[derive(Debug, Default, Clone, Copy)]
struct PageFlags {
    locked: bool,
    uptodate: bool,
    error: bool,
}

/// A page-cache page.
#[derive(Debug)]
pub struct Page {
    index: u64,
    data: Mutex<Box<[u8]>>,
    flags: Mutex<PageFlags>,
    unlocked: Condvar,
}

impl Page {
    /// A zero-filled, unlocked page at `index`.
    pub fn new(index: u64) -> Self {
        Self::with_data(index, vec![0u8; PAGE_SIZE])
    }

    /// A page holding `data`, padded or truncated to `PAGE_SIZE`.
    pub fn with_data(index: u64, mut data: Vec<u8>) -> Self {
        data.resize(PAGE_SIZE, 0);
        Self {
            index,
            data: Mutex::new(data.into_boxed_slice()),
            flags: Mutex::new(PageFlags::default()),
            unlocked: Condvar::new(),
        }
    }

    /// A page that starts locked, as pages under read I/O do.
    pub fn new_locked(index: u64, data: Vec<u8>) -> Self {
        let page = Self::with_data(index, data);
        page.flags.lock().locked = true;
        page
    }

    /// Page index within the owning file.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Exclusive access to the page contents.
    pub fn data(&self) -> MutexGuard<'_, Box<[u8]>> {
        self.data.lock()
    }

    /// Copy of the page contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().to_vec()
    }

    /// Block until the page is unlocked, then take the page lock.
    pub fn lock(&self) {
        let mut flags = self.flags.lock();
        while flags.locked {
            self.unlocked.wait(&mut flags);
        }
        flags.locked = true;
    }

    /// Take the page lock if it is free.
    pub fn try_lock(&self) -> bool {
        let mut flags = self.flags.lock();
        if flags.locked {
            false
        } else {
            flags.locked = true;
            true
        }
    }

    /// Release the page lock and wake every waiter.
    pub fn unlock(&self) {
        let mut flags = self.flags.lock();
        flags.locked = false;
        drop(flags);
        self.unlocked.notify_all();
    }

    /// Block until the page is unlocked.
    pub fn wait_unlocked(&self) {
        let mut flags = self.flags.lock();
        while flags.locked {
            self.unlocked.wait(&mut flags);
        }
    }

    /// Like [`Page::wait_unlocked`], giving up after `timeout`.
    ///
    /// Returns `true` if the page was unlocked in time.
    pub fn wait_unlocked_timeout(&self, timeout: Duration) -> bool {
        let mut flags = self.flags.lock();
        if flags.locked {
            let _ = self
                .unlocked
                .wait_while_for(&mut flags, |f| f.locked, timeout);
        }
        !flags.locked
    }

    pub fn is_locked(&self) -> bool {
        self.flags.lock().locked
    }

    pub fn set_uptodate(&self) {
        self.flags.lock().uptodate = true;
    }

    pub fn is_uptodate(&self) -> bool {
        self.flags.lock().uptodate
    }

    pub fn set_error(&self) {
        self.flags.lock().error = true;
    }

    pub fn clear_error(&self) {
        self.flags.lock().error = false;
    }

    pub fn is_error(&self) -> bool {
        self.flags.lock().error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_page_is_unlocked_and_clean() {
        let page = Page::new(3);
        assert_eq!(page.index(), 3);
        assert!(!page.is_locked());
        assert!(!page.is_uptodate());
        assert!(!page.is_error());
        assert_eq!(page.snapshot().len(), PAGE_SIZE);
    }

    #[test]
    fn test_try_lock() {
        let page = Page::new(0);
        assert!(page.try_lock());
        assert!(!page.try_lock());
        page.unlock();
        assert!(page.try_lock());
    }

    #[test]
    fn test_unlock_releases_waiter() {
        let page = Arc::new(Page::new_locked(0, Vec::new()));
        let waiter = {
            let page = Arc::clone(&page);
            thread::spawn(move || {
                page.wait_unlocked();
                page.is_uptodate()
            })
        };

        page.set_uptodate();
        page.unlock();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_wait_timeout_on_locked_page() {
        let page = Page::new_locked(0, Vec::new());
        assert!(!page.wait_unlocked_timeout(Duration::from_millis(20)));
        page.unlock();
        assert!(page.wait_unlocked_timeout(Duration::from_millis(20)));
    }
}
