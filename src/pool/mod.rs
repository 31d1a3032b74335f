// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shared-memory pool (component A, §4.5).
//!
//! Allocates page-rounded, file-descriptor-backed regions, seals them, and
//! maps them read-write. A region is freed only when its owner refcount
//! drops to zero; there is no compaction.

mod region;

pub use region::{PoolRegion, RegionFlags};

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{GraphError, Result};

/// Page size used to round region sizes up to. 4096 on every platform this
/// crate targets.
pub const PAGE_SIZE: usize = 4096;

pub fn round_up_page(size: usize) -> usize {
    round_up(size, PAGE_SIZE)
}

/// Round `size` up to the next multiple of `align`.
pub fn round_up(size: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (size + align - 1) & !(align - 1)
}

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(u64);

impl PoolId {
    pub(crate) fn raw(self) -> u64 {
        self.0
    }
}

/// Allocates backing regions for buffers.
///
/// A single `BufferPool` allocates one [`PoolRegion`] per call; the link
/// allocator (§4.3 Allocate) lays out multiple buffers within that one
/// region itself rather than asking the pool for one region per buffer.
#[derive(Debug, Default)]
pub struct BufferPool;

impl BufferPool {
    pub fn new() -> Self {
        Self
    }

    /// Allocate a sealed, read-write mapped region of at least `size` bytes.
    pub fn allocate(&self, size: usize) -> Result<PoolRegion> {
        let id = PoolId(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed));
        PoolRegion::new(id, size)
            .map_err(|e| GraphError::PoolExhausted(format!("pool {id:?}: {e}")))
    }
}

impl std::fmt::Debug for PoolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PoolId({})", self.0)
    }
}
