//! Memory protection for secret material
//!
//! Passphrases, derived keys, share plaintexts and private keys must
//! never reach disk. Two best-effort hardening measures:
//!
//! 1. Core dump prevention via `setrlimit(RLIMIT_CORE, 0)` so a crash
//!    cannot write secrets to disk.
//! 2. `mlock`-backed buffers so secrets cannot be swapped out.
//!
//! Failures are logged rather than fatal — containers and unprivileged
//! users may not be allowed either operation.

use std::sync::atomic::{AtomicBool, Ordering};

static CORE_DUMPS_DISABLED: AtomicBool = AtomicBool::new(false);

/// Disable core dumps for the current process. Call once at startup.
///
/// Returns `true` if dumps are disabled (or were already).
pub fn disable_core_dumps() -> bool {
    if CORE_DUMPS_DISABLED.swap(true, Ordering::SeqCst) {
        return true;
    }

    #[cfg(unix)]
    {
        // SAFETY: setrlimit with RLIMIT_CORE=0 is a standard POSIX call
        unsafe {
            let rlim = libc::rlimit {
                rlim_cur: 0,
                rlim_max: 0,
            };
            if libc::setrlimit(libc::RLIMIT_CORE, &rlim) != 0 {
                eprintln!(
                    "[vigil] warning: failed to disable core dumps: {}",
                    std::io::Error::last_os_error()
                );
                return false;
            }
        }
        true
    }

    #[cfg(not(unix))]
    {
        eprintln!("[vigil] warning: core dump prevention not supported on this platform");
        false
    }
}

/// A buffer that is mlocked while alive and zeroized before release.
///
/// Holds working copies of keys and share plaintexts during seal,
/// release and recovery.
pub struct LockedBuffer {
    data: Vec<u8>,
    locked: bool,
}

impl LockedBuffer {
    /// Allocate a zero-filled buffer of `len` bytes and lock it in RAM.
    pub fn new(len: usize) -> Self {
        let data = vec![0u8; len];
        let locked = lock(&data);
        if !locked && len > 0 {
            eprintln!(
                "[vigil] warning: failed to mlock {} bytes — secret may be swappable",
                len
            );
        }
        Self { data, locked }
    }

    /// Copy `bytes` into a fresh locked buffer.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = Self::new(bytes.len());
        buf.data.copy_from_slice(bytes);
        buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for LockedBuffer {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.data.zeroize();
        if self.locked {
            unlock(&self.data);
        }
    }
}

#[cfg(unix)]
fn lock(data: &[u8]) -> bool {
    if data.is_empty() {
        return true;
    }
    // SAFETY: data is a live allocation of at least data.len() bytes
    unsafe { libc::mlock(data.as_ptr() as *const libc::c_void, data.len()) == 0 }
}

#[cfg(unix)]
fn unlock(data: &[u8]) {
    if data.is_empty() {
        return;
    }
    // SAFETY: matches the mlock call in `lock`
    unsafe {
        libc::munlock(data.as_ptr() as *const libc::c_void, data.len());
    }
}

#[cfg(not(unix))]
fn lock(_data: &[u8]) -> bool {
    false
}

#[cfg(not(unix))]
fn unlock(_data: &[u8]) {}
