//! Memory mappings shared between the producer and consumer processes.
//!
//! Two flavours are provided:
//! - [`MmapFileMut`]: file-backed `MAP_SHARED` mappings, used when the
//!   two processes are unrelated and agree on a path.
//! - [`SharedAnon`]: a `MAP_SHARED | MAP_ANONYMOUS` region with no backing file, visible
//!   to every process forked after it was created.

use memmap2::MmapMut;
use std::{
    fs::{File, OpenOptions},
    io,
    path::{Path, PathBuf},
    ptr::NonNull,
};

pub struct MmapFileMut {
    _file: File,
    mmap: MmapMut,
}

impl MmapFileMut {
    /// Create a file of `size_bytes` at `path` and map it read-write.
    ///
    /// The kernel zero-fills the new length, so every byte of the mapping starts at 0.
    /// Same as [`create_rw_with`](Self::create_rw_with) with nothing to initialize.
    pub fn create_rw<P: AsRef<Path>>(path: P, size_bytes: u64) -> io::Result<Self> {
        Self::create_rw_with(path, size_bytes, |_| {})
    }

    /// Create a fresh file of `size_bytes`, let `init` fill the mapping, then rename
    /// the file over `path`.
    ///
    /// An existing file at `path` is replaced, never truncated: a process that already
    /// mapped the old file keeps its (now unlinked) pages, and an opener of `path`
    /// sees either the old file or the fully initialized new one.
    pub fn create_rw_with<P: AsRef<Path>>(
        path: P,
        size_bytes: u64,
        init: impl FnOnce(&mut [u8]),
    ) -> io::Result<Self> {
        let path = path.as_ref();
        let staging = staging_path(path)?;

        let created = Self::map_new(&staging, size_bytes).and_then(|mut mm| {
            init(&mut mm.mmap[..]);
            std::fs::rename(&staging, path)?;
            Ok(mm)
        });
        if created.is_err() {
            let _ = std::fs::remove_file(&staging);
        }
        let mm = created?;

        tracing::debug!(path = %path.display(), size_bytes, "created shared file mapping");
        Ok(mm)
    }

    fn map_new(path: &Path, size_bytes: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size_bytes)?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    /// Open an existing file and map it read-write.
    pub fn open_rw<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        tracing::debug!(path = %path.as_ref().display(), len = mmap.len(), "opened shared file mapping");
        Ok(Self { _file: file, mmap })
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

/// `<dir>/<name>.tmp.<pid>`, next to `path` so the final rename stays on one filesystem.
fn staging_path(path: &Path) -> io::Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "mapping path has no file name"))?;
    let mut staged = name.to_os_string();
    staged.push(format!(".tmp.{}", std::process::id()));
    Ok(path.with_file_name(staged))
}

/// Returns the OS page size, falling back to 4 KiB if `sysconf` refuses to answer.
pub fn page_size() -> usize {
    // SAFETY: sysconf has no memory-safety preconditions.
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz <= 0 { 4096 } else { sz as usize }
}

/// A shared anonymous mapping (`MAP_SHARED | MAP_ANONYMOUS`).
///
/// The region is zeroed by the kernel and rounded up to whole pages. It has no name
/// and no backing file: the only way for a second process to see it is to inherit it
/// across `fork()`. Each process unmaps its own view when its handle drops; the
/// peer's view of the same physical pages is unaffected.
///
/// The handle is move-only. There is no `Clone`, so a mapping can never have two
/// owners in the same process that would both try to unmap it.
pub struct SharedAnon {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the handle only exposes raw pointers; synchronizing access to the bytes is
// the caller's job (the latch does it with atomics).
unsafe impl Send for SharedAnon {}
unsafe impl Sync for SharedAnon {}

impl SharedAnon {
    /// Maps at least `min_len` bytes of shared anonymous memory, rounded up to a
    /// whole number of pages (a request of 0 still maps one page).
    pub fn new(min_len: usize) -> io::Result<Self> {
        let page = page_size();
        let len = min_len.max(1).div_ceil(page) * page;

        // SAFETY: MAP_ANONYMOUS needs no file descriptor; we check MAP_FAILED below.
        let raw = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let ptr = NonNull::new(raw as *mut u8)
            .ok_or_else(|| io::Error::other("mmap returned a null mapping"))?;

        tracing::debug!(len, "created shared anonymous mapping");
        Ok(Self { ptr, len })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for SharedAnon {
    fn drop(&mut self) {
        // SAFETY: ptr/len came from a successful mmap and are unmapped exactly once,
        // since the handle cannot be cloned.
        let rc = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len) };
        if rc != 0 {
            tracing::warn!(err = %io::Error::last_os_error(), "munmap of shared anonymous region failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(label: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("baton_mmap_{label}_{}", std::process::id()))
    }

    #[test]
    fn anon_region_is_page_rounded_and_zeroed() {
        let region = SharedAnon::new(1).unwrap();
        assert_eq!(region.len(), page_size());
        let bytes = unsafe { std::slice::from_raw_parts(region.as_ptr(), region.len()) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn anon_region_of_zero_still_maps_a_page() {
        let region = SharedAnon::new(0).unwrap();
        assert_eq!(region.len(), page_size());
    }

    #[test]
    fn file_mapping_is_shared_between_handles() {
        let path = temp_path("shared");
        let mut writer = MmapFileMut::create_rw(&path, 64).unwrap();
        unsafe { writer.as_mut_ptr().add(7).write(0xAB) };

        let reader = MmapFileMut::open_rw(&path).unwrap();
        assert_eq!(reader.len(), 64);
        assert_eq!(unsafe { reader.as_ptr().add(7).read() }, 0xAB);

        drop(reader);
        drop(writer);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn create_replaces_instead_of_truncating() {
        let path = temp_path("replace");
        let mut old = MmapFileMut::create_rw(&path, 64).unwrap();
        unsafe { old.as_mut_ptr().write(0x11) };

        let fresh = MmapFileMut::create_rw_with(&path, 128, |bytes| bytes[0] = 0x22).unwrap();

        // The earlier mapping keeps its length and contents.
        assert_eq!(old.len(), 64);
        assert_eq!(unsafe { old.as_ptr().read() }, 0x11);
        assert_eq!(fresh.len(), 128);

        let reopened = MmapFileMut::open_rw(&path).unwrap();
        assert_eq!(reopened.len(), 128);
        assert_eq!(unsafe { reopened.as_ptr().read() }, 0x22);
        assert!(!staging_path(&path).unwrap().exists());

        drop((old, fresh, reopened));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn failed_create_leaves_nothing_behind() {
        let path = temp_path("no_such_dir").join("latch");
        assert!(MmapFileMut::create_rw(&path, 64).is_err());
        assert!(MmapFileMut::create_rw("/", 64).is_err());
    }

    #[test]
    fn opening_missing_file_fails() {
        let path = temp_path("missing");
        assert!(MmapFileMut::open_rw(&path).is_err());
    }
}
