//! Best-effort readability check for foreign memory.
//!
//! Dereferencing a bad address would kill the process, so the probe asks the kernel
//! to read the bytes instead: `write(2)` from the address into a pipe fails with
//! `EFAULT` when the range isn't mapped readable. The bytes are drained right back
//! out of the pipe.

use std::io;

/// Bytes pushed through the pipe per write; far below `PIPE_BUF`, so a write never
/// blocks on a full pipe.
const CHUNK: usize = 512;

struct Pipe {
    read: libc::c_int,
    write: libc::c_int,
}

impl Pipe {
    fn new() -> io::Result<Self> {
        let mut fds: [libc::c_int; 2] = [-1; 2];
        // SAFETY: fds has room for the two descriptors pipe() fills in.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            read: fds[0],
            write: fds[1],
        })
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        // SAFETY: both descriptors came from pipe() and are closed once.
        unsafe {
            libc::close(self.read);
            libc::close(self.write);
        }
    }
}

/// Returns `Ok(())` if `len` bytes starting at `addr` are readable by this process.
pub(crate) fn probe_readable(addr: usize, len: usize) -> io::Result<()> {
    if len == 0 {
        return Ok(());
    }
    let pipe = Pipe::new()?;
    let mut sink = [0u8; CHUNK];

    let mut offset = 0;
    while offset < len {
        let n = CHUNK.min(len - offset);
        let src = addr.wrapping_add(offset) as *const libc::c_void;

        // SAFETY: the kernel validates `src`; an unreadable range yields EFAULT
        // instead of a fault in this process.
        let wrote = unsafe { libc::write(pipe.write, src, n) };
        if wrote < 0 {
            return Err(io::Error::last_os_error());
        }
        let wrote = wrote as usize;
        if wrote == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "probe pipe accepted no bytes"));
        }

        // SAFETY: `sink` is a local buffer of at least `wrote` bytes.
        let drained = unsafe { libc::read(pipe.read, sink.as_mut_ptr() as *mut libc::c_void, wrote) };
        if drained < 0 {
            return Err(io::Error::last_os_error());
        }
        offset += wrote;
    }
    Ok(())
}
