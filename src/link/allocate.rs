// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Buffer allocation (§4.3 Allocate, §4.5).

use crate::buffer::{Buffer, ChunkHeader, DataBlock, Meta, MetaEnable, MetaType};
use crate::pool::{round_up, BufferPool, PoolRegion};
use crate::port::{AllocParams, PortCapabilities};

use super::error::LinkError;

/// `MAX_BUFFERS` substituted when a side declares `max_buffers == 0`
/// (§8 invariant 9).
pub const MAX_BUFFERS: u32 = 16;

/// Each buffer's storage (metas + data) is rounded up to this boundary
/// within the pool region (§4.3).
const BUFFER_ALIGN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocator {
    Output,
    Input,
    Link,
}

/// Decide who allocates, per the capability matrix priority order (§4.3).
pub fn choose_allocator(
    output: PortCapabilities,
    input: PortCapabilities,
) -> Result<Allocator, LinkError> {
    let o_alloc = output.contains(PortCapabilities::CAN_ALLOC_BUFFERS);
    let o_use = output.contains(PortCapabilities::CAN_USE_BUFFERS);
    let i_alloc = input.contains(PortCapabilities::CAN_ALLOC_BUFFERS);
    let i_use = input.contains(PortCapabilities::CAN_USE_BUFFERS);

    if o_alloc && i_use {
        Ok(Allocator::Output)
    } else if o_use && i_alloc {
        Ok(Allocator::Input)
    } else if o_use && i_use {
        Ok(Allocator::Link)
    } else if o_alloc && i_alloc {
        // Both can allocate; arbitrary tie-break toward output (§4.3 item 4).
        Ok(Allocator::Output)
    } else {
        Err(LinkError::no_common_buffer_alloc(
            "neither side can use buffers the other allocates, and only the link can act as a fallback, which requires CanUseBuffers on both sides",
        ))
    }
}

/// The combined parameters an allocation will use: per-side maxima, with
/// the ringbuffer override (§4.3, §8 invariants 9 & 10).
#[derive(Debug, Clone)]
pub struct AllocationPlan {
    pub n_buffers: u32,
    pub min_buffers: u32,
    pub max_buffers: u32,
    pub minsize: u32,
    pub stride: u32,
    pub align: u32,
    pub metas: Vec<MetaEnable>,
}

fn effective_max(max_buffers: u32) -> u32 {
    if max_buffers == 0 {
        MAX_BUFFERS
    } else {
        max_buffers
    }
}

fn union_metas(a: &[MetaEnable], b: &[MetaEnable]) -> Vec<MetaEnable> {
    let mut out: Vec<MetaEnable> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for m in a.iter().chain(b.iter()) {
        let ty = m.meta_type();
        if seen.insert(ty) {
            out.push(m.clone());
        }
    }
    out
}

impl AllocationPlan {
    pub fn compute(output: &AllocParams, input: &AllocParams) -> Self {
        let minsize = output.minsize.max(input.minsize);
        let stride = output.stride.max(input.stride);
        let align = output.align.max(input.align);
        let metas = union_metas(&output.enabled_metas, &input.enabled_metas);

        let ringbuffer = metas
            .iter()
            .find_map(|m| match m {
                MetaEnable::Ringbuffer { minsize, stride, .. } => Some((*minsize, *stride)),
                _ => None,
            });

        if let Some((rb_minsize, rb_stride)) = ringbuffer {
            return Self {
                n_buffers: 1,
                min_buffers: 1,
                max_buffers: 1,
                minsize: rb_minsize,
                stride: rb_stride,
                align,
                metas,
            };
        }

        let combined_min = output.min_buffers.max(input.min_buffers).max(1);
        let combined_max = effective_max(output.max_buffers).min(effective_max(input.max_buffers));
        // The link allocates the capped maximum, not the minimum (§8 invariant 9):
        // with max_buffers=0 on both sides that's MAX_BUFFERS, matching
        // `impl->n_buffers = max_buffers` in the original allocator.
        let n_buffers = combined_max.max(combined_min);

        Self {
            n_buffers,
            min_buffers: combined_min,
            max_buffers: combined_max,
            minsize,
            stride,
            align,
            metas,
        }
    }

    /// Bounds to hand to a node's own `alloc_buffers` when it (not the
    /// link) owns the allocation (§4.3 Allocate, output-/input-allocates
    /// cases).
    pub fn to_alloc_params(&self) -> crate::port::AllocParams {
        crate::port::AllocParams {
            minsize: self.minsize,
            stride: self.stride,
            min_buffers: self.min_buffers,
            max_buffers: self.max_buffers,
            align: self.align,
            enabled_metas: self.metas.clone(),
        }
    }

    /// A plan from one side's own `AllocParams`, used when a node's
    /// `alloc_buffers` is the one doing the allocating rather than the link
    /// combining two sides (§4.1 `alloc_buffers`).
    pub fn from_params(params: &AllocParams) -> Self {
        let ringbuffer = params.enabled_metas.iter().find_map(|m| match m {
            MetaEnable::Ringbuffer { minsize, stride, .. } => Some((*minsize, *stride)),
            _ => None,
        });
        if let Some((rb_minsize, rb_stride)) = ringbuffer {
            return Self {
                n_buffers: 1,
                min_buffers: 1,
                max_buffers: 1,
                minsize: rb_minsize,
                stride: rb_stride,
                align: params.align,
                metas: params.enabled_metas.clone(),
            };
        }

        let min_buffers = params.min_buffers.max(1);
        let max_buffers = effective_max(params.max_buffers).max(min_buffers);
        Self {
            n_buffers: min_buffers,
            min_buffers,
            max_buffers,
            minsize: params.minsize,
            stride: params.stride,
            align: params.align,
            metas: params.enabled_metas.clone(),
        }
    }

    fn meta_storage_size(&self) -> usize {
        self.metas.iter().map(Meta::storage_size).sum()
    }

    /// Size of one buffer's storage (metas + data payload), rounded to the
    /// 64-byte buffer boundary (§4.3).
    pub fn per_buffer_size(&self) -> usize {
        round_up(self.meta_storage_size() + self.minsize as usize, BUFFER_ALIGN)
    }

    /// Total pool region size: `n·round_up(hdr+minsize, 64) + n·sizeof(ptr)`
    /// (§8 S2) — a leading pointer-array plus the per-buffer storage.
    pub fn total_size(&self) -> usize {
        let ptr_array = self.n_buffers as usize * std::mem::size_of::<usize>();
        ptr_array + self.n_buffers as usize * self.per_buffer_size()
    }
}

/// Lay out `plan.n_buffers` buffers contiguously in one freshly allocated
/// pool region: `[ptr_array | buf0 metas+data | buf1 ...]` (§4.3, §4.5).
pub fn allocate_region(
    pool: &BufferPool,
    plan: &AllocationPlan,
) -> Result<(PoolRegion, Vec<Buffer>), LinkError> {
    let region = pool
        .allocate(plan.total_size())
        .map_err(LinkError::no_common_buffer_alloc)?;

    let ptr_array_size = plan.n_buffers as usize * std::mem::size_of::<usize>();
    let per_buffer = plan.per_buffer_size();

    let mut buffers = Vec::with_capacity(plan.n_buffers as usize);
    for i in 0..plan.n_buffers {
        let mut buf = Buffer::new(i);
        let buf_offset = ptr_array_size + i as usize * per_buffer;

        let mut meta_offset = buf_offset;
        for enable in &plan.metas {
            buf.metas.push(Meta::new_zeroed(enable));
            meta_offset += Meta::storage_size(enable);
        }

        let data_offset = meta_offset;
        let data_size = plan.minsize as usize;
        let mem = crate::buffer::MemRef::pool(region.clone(), data_offset, data_size);
        let mut block = DataBlock::new(mem);
        block.chunk = ChunkHeader {
            offset: 0,
            size: 0,
            stride: plan.stride,
        };
        buf.datas.push(block);

        buffers.push(buf);
    }

    // `pool.allocate` already returned `region` with an owner count of 1;
    // that one value is itself the adoption token the caller stores
    // (`Link::region` or a node's own `region` field) and releases with a
    // single `remove_owner` on teardown.
    Ok((region, buffers))
}

/// Find the ringbuffer meta's storage type marker, used by callers that
/// need to know whether a plan forced `n_buffers == 1`.
pub fn is_ringbuffer_plan(plan: &AllocationPlan) -> bool {
    plan.metas
        .iter()
        .any(|m| m.meta_type() == MetaType::Ringbuffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::MetaEnable;

    fn params(minsize: u32, min_buffers: u32, max_buffers: u32) -> AllocParams {
        AllocParams {
            minsize,
            stride: 4,
            min_buffers,
            max_buffers,
            align: 16,
            enabled_metas: vec![MetaEnable::Header],
        }
    }

    #[test]
    fn zero_max_buffers_picks_16() {
        let plan = AllocationPlan::compute(&params(1024, 1, 0), &params(1024, 1, 0));
        assert_eq!(effective_max(0), MAX_BUFFERS);
        assert_eq!(plan.n_buffers, MAX_BUFFERS);
    }

    #[test]
    fn n_buffers_is_the_capped_maximum_not_the_minimum() {
        let plan = AllocationPlan::compute(&params(1024, 2, 4), &params(1024, 1, 6));
        assert_eq!(plan.min_buffers, 2);
        assert_eq!(plan.max_buffers, 4);
        assert_eq!(plan.n_buffers, 4);
    }

    #[test]
    fn ringbuffer_forces_single_buffer() {
        let mut output = params(0, 4, 8);
        output.enabled_metas = vec![MetaEnable::Ringbuffer {
            minsize: 4096,
            stride: 1,
            blocks: 1,
        }];
        let input = params(0, 4, 8);
        let plan = AllocationPlan::compute(&output, &input);
        assert_eq!(plan.n_buffers, 1);
        assert_eq!(plan.minsize, 4096);
        assert!(is_ringbuffer_plan(&plan));
    }

    #[test]
    fn total_size_matches_s2_formula() {
        let output = params(32, 4, 4);
        let input = params(32, 4, 4);
        let plan = AllocationPlan::compute(&output, &input);
        let hdr = std::mem::size_of::<crate::buffer::HeaderMeta>();
        let expected = plan.n_buffers as usize * round_up(hdr + 32, 64)
            + plan.n_buffers as usize * std::mem::size_of::<usize>();
        assert_eq!(plan.total_size(), expected);
    }

    #[test]
    fn choose_allocator_priority() {
        use PortCapabilities as C;
        assert_eq!(
            choose_allocator(C::CAN_ALLOC_BUFFERS, C::CAN_USE_BUFFERS).unwrap(),
            Allocator::Output
        );
        assert_eq!(
            choose_allocator(C::CAN_USE_BUFFERS, C::CAN_ALLOC_BUFFERS).unwrap(),
            Allocator::Input
        );
        assert_eq!(
            choose_allocator(C::CAN_USE_BUFFERS, C::CAN_USE_BUFFERS).unwrap(),
            Allocator::Link
        );
        assert_eq!(
            choose_allocator(C::CAN_ALLOC_BUFFERS, C::CAN_ALLOC_BUFFERS).unwrap(),
            Allocator::Output
        );
        assert!(choose_allocator(C::empty(), C::empty()).is_err());
    }
}
