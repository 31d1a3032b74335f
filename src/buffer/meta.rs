// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Meta types attached to buffers (§6 port-info parameters).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaType {
    Header,
    VideoCrop,
    Cursor,
    Ringbuffer,
}

/// Request to enable a meta type on a port, with type-specific parameters
/// (§6 `MetaEnable{type, [type-specific bytes]}`).
#[derive(Debug, Clone)]
pub enum MetaEnable {
    Header,
    VideoCrop,
    Cursor,
    Ringbuffer { minsize: u32, stride: u32, blocks: u32 },
}

impl MetaEnable {
    pub fn meta_type(&self) -> MetaType {
        match self {
            MetaEnable::Header => MetaType::Header,
            MetaEnable::VideoCrop => MetaType::VideoCrop,
            MetaEnable::Cursor => MetaType::Cursor,
            MetaEnable::Ringbuffer { .. } => MetaType::Ringbuffer,
        }
    }
}

/// Header meta, bit-exact per §6: `{flags: u32, seq: u64, pts: i64, dts_offset: i64}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct HeaderMeta {
    pub flags: u32,
    pub seq: u64,
    pub pts: i64,
    pub dts_offset: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VideoCropMeta {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CursorMeta {
    pub x: i32,
    pub y: i32,
    pub visible: bool,
}

/// Ringbuffer meta: capacity plus read/write indices, shared between
/// producer and consumer through the pool-backed region (§9 S6).
#[derive(Debug)]
pub struct RingbufferMeta {
    pub capacity: u32,
    pub stride: u32,
    read_index: AtomicU64,
    write_index: AtomicU64,
}

impl RingbufferMeta {
    pub fn new(capacity: u32, stride: u32) -> Self {
        Self {
            capacity,
            stride,
            read_index: AtomicU64::new(0),
            write_index: AtomicU64::new(0),
        }
    }

    pub fn read_index(&self) -> u64 {
        self.read_index.load(Ordering::Acquire)
    }

    pub fn write_index(&self) -> u64 {
        self.write_index.load(Ordering::Acquire)
    }

    pub fn set_read_index(&self, v: u64) {
        self.read_index.store(v, Ordering::Release);
    }

    pub fn set_write_index(&self, v: u64) {
        self.write_index.store(v, Ordering::Release);
    }
}

impl Clone for RingbufferMeta {
    fn clone(&self) -> Self {
        Self {
            capacity: self.capacity,
            stride: self.stride,
            read_index: AtomicU64::new(self.read_index()),
            write_index: AtomicU64::new(self.write_index()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Meta {
    Header(HeaderMeta),
    VideoCrop(VideoCropMeta),
    Cursor(CursorMeta),
    Ringbuffer(std::sync::Arc<RingbufferMeta>),
}

impl Meta {
    pub fn meta_type(&self) -> MetaType {
        match self {
            Meta::Header(_) => MetaType::Header,
            Meta::VideoCrop(_) => MetaType::VideoCrop,
            Meta::Cursor(_) => MetaType::Cursor,
            Meta::Ringbuffer(_) => MetaType::Ringbuffer,
        }
    }

    /// Storage size in bytes reserved inline for this meta (§4.3 allocator
    /// layout); headers are zero-initialised at alloc time.
    pub fn storage_size(enable: &MetaEnable) -> usize {
        match enable {
            MetaEnable::Header => std::mem::size_of::<HeaderMeta>(),
            MetaEnable::VideoCrop => std::mem::size_of::<VideoCropMeta>(),
            MetaEnable::Cursor => std::mem::size_of::<CursorMeta>(),
            MetaEnable::Ringbuffer { .. } => std::mem::size_of::<RingbufferMeta>(),
        }
    }

    pub fn new_zeroed(enable: &MetaEnable) -> Self {
        match enable {
            MetaEnable::Header => Meta::Header(HeaderMeta::default()),
            MetaEnable::VideoCrop => Meta::VideoCrop(VideoCropMeta::default()),
            MetaEnable::Cursor => Meta::Cursor(CursorMeta::default()),
            MetaEnable::Ringbuffer { minsize, stride, .. } => {
                Meta::Ringbuffer(std::sync::Arc::new(RingbufferMeta::new(*minsize, *stride)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ringbuffer_starts_at_zero_indices() {
        let rb = RingbufferMeta::new(4096, 1);
        assert_eq!(rb.read_index(), 0);
        assert_eq!(rb.write_index(), 0);
        assert_eq!(rb.capacity, 4096);
    }
}
