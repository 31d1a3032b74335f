// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Port capability flags and allocation parameters (§3, §4.1 `get_info`).

use bitflags::bitflags;

use crate::buffer::MetaEnable;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PortCapabilities: u32 {
        const CAN_USE_BUFFERS   = 0b0001;
        const CAN_ALLOC_BUFFERS = 0b0010;
        const LIVE              = 0b0100;
        const NO_REF            = 0b1000;
    }
}

/// Allocation parameters a port declares via `get_info` (§4.1).
#[derive(Debug, Clone)]
pub struct AllocParams {
    pub minsize: u32,
    pub stride: u32,
    pub min_buffers: u32,
    /// Maximum buffer count. `0` means "unbounded"; the link allocator
    /// substitutes `MAX_BUFFERS` (§8 invariant 9).
    pub max_buffers: u32,
    pub align: u32,
    pub enabled_metas: Vec<MetaEnable>,
}

impl Default for AllocParams {
    fn default() -> Self {
        Self {
            minsize: 0,
            stride: 0,
            min_buffers: 1,
            max_buffers: 0,
            align: 16,
            enabled_metas: vec![crate::buffer::MetaEnable::Header],
        }
    }
}

impl AllocParams {
    pub fn has_ringbuffer(&self) -> bool {
        self.enabled_metas
            .iter()
            .any(|m| matches!(m, MetaEnable::Ringbuffer { .. }))
    }
}

/// Combined capability + allocation info returned by `get_info`.
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub capabilities: PortCapabilities,
    pub alloc: AllocParams,
    /// True when the port already owns a set of buffers from a prior
    /// allocation (e.g. an output already linked elsewhere). A link seeing
    /// this adopts the existing buffers instead of reallocating (§4.3
    /// Allocate, reused-output path).
    pub allocated: bool,
    /// The port's current buffers, populated only when `allocated` is true.
    pub buffers: Vec<crate::buffer::Buffer>,
}
