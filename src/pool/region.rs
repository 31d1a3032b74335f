// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! A single file-descriptor-backed pool region.
//!
//! Linux-only: allocated with `memfd_create`, grown with `ftruncate`, sealed
//! with `F_SEAL_SHRINK | F_SEAL_GROW`, and mapped read-write with `mmap`.
//! This is the same CPU shared-memory primitive the daemon's cross-process
//! frame transport uses elsewhere (`FrameTransportHandle::Memfd`); this
//! crate owns allocation and mapping, out-of-band fd transfer is the
//! transport's job (§1, out of scope).

use std::ffi::CString;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bitflags::bitflags;

use super::{round_up_page, PoolId};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RegionFlags: u32 {
        const HAS_FD    = 0b001;
        const MAPPED_RW = 0b010;
        const SEALED    = 0b100;
    }
}

struct Mapping {
    fd: RawFd,
    ptr: *mut libc::c_void,
    size: usize,
}

// SAFETY: the mapping is only ever read/written through the region's public
// API, which requires `&mut` for writes and is only called from a single
// loop at a time per the data-loop ownership discipline (§5).
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Drop for Mapping {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr, self.size);
            libc::close(self.fd);
        }
    }
}

/// A single pool region, reference-counted by its owners (ports or links).
///
/// Freeing the last owning clone closes the fd and unmaps.
#[derive(Clone)]
pub struct PoolRegion {
    id: PoolId,
    mapping: Arc<Mapping>,
    flags: RegionFlags,
    refcount: Arc<AtomicUsize>,
}

impl PoolRegion {
    pub(super) fn new(id: PoolId, requested: usize) -> std::io::Result<Self> {
        let size = round_up_page(requested.max(1));
        let name = CString::new(format!("mediagraphd-pool-{}", id.raw())).unwrap();

        let fd = unsafe { libc::memfd_create(name.as_ptr(), libc::MFD_ALLOW_SEALING) };
        if fd < 0 {
            return Err(std::io::Error::last_os_error());
        }

        if unsafe { libc::ftruncate(fd, size as libc::off_t) } < 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let seals = libc::F_SEAL_SHRINK | libc::F_SEAL_GROW;
        if unsafe { libc::fcntl(fd, libc::F_ADD_SEALS, seals) } < 0 {
            let err = std::io::Error::last_os_error();
            unsafe {
                libc::munmap(ptr, size);
                libc::close(fd);
            }
            return Err(err);
        }

        Ok(Self {
            id,
            mapping: Arc::new(Mapping { fd, ptr, size }),
            flags: RegionFlags::HAS_FD | RegionFlags::MAPPED_RW | RegionFlags::SEALED,
            refcount: Arc::new(AtomicUsize::new(1)),
        })
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn size(&self) -> usize {
        self.mapping.size
    }

    pub fn fd(&self) -> RawFd {
        self.mapping.fd
    }

    pub fn flags(&self) -> RegionFlags {
        self.flags
    }

    /// Raw pointer to `offset` within the region. Caller must stay within
    /// `size()` and respect the read/write discipline in §5.
    ///
    /// # Safety
    /// `offset + len` must not exceed `self.size()`.
    pub unsafe fn ptr_at(&self, offset: usize) -> *mut u8 {
        debug_assert!(offset <= self.mapping.size);
        (self.mapping.ptr as *mut u8).add(offset)
    }

    /// Take an additional reference on this region (e.g. a port or link
    /// adopting it as an owner). Returns the new refcount.
    pub fn add_owner(&self) -> usize {
        self.refcount.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drop a reference. Returns the remaining refcount; the underlying fd
    /// and mapping are only released when the last `PoolRegion` clone (the
    /// last owner) is dropped.
    pub fn remove_owner(&self) -> usize {
        self.refcount.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn owner_count(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for PoolRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRegion")
            .field("id", &self.id)
            .field("size", &self.mapping.size)
            .field("flags", &self.flags)
            .field("owners", &self.owner_count())
            .finish()
    }
}
