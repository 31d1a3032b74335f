// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Port (component C, §3, §4.2).
//!
//! A `Port` is plain data owned by exactly one node; the behavior that
//! drives it (`enum_formats`, `set_format`, `use_buffers`, ...) lives on the
//! node's [`crate::node::NodeContract`] implementation, which is handed the
//! port id to operate on. This keeps the public object an opaque handle and
//! all state internal, per the "object-owns-implementation" design note
//! (§9) rather than reproducing the source's container-arithmetic idiom.

mod format;
mod info;

pub use format::{AudioFormat, Format, FormatFilter, PixelFormat, SampleFormat, VideoFormat};
pub use info::{AllocParams, PortCapabilities, PortInfo};

use crate::buffer::Buffer;
use crate::link::LinkId;

pub type PortId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// A cursor into a node's `enum_formats` sequence (§4.1), opaque to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnumCursor(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetFormatFlags {
    /// The node must pick the closest format it supports.
    Nearest,
    /// The format must be matched exactly.
    Fixed,
}

/// Port state (§4.2): no format, format-set, buffers-set, or streaming.
/// Mirrors the owning node's `Ready`/`Paused`/`Streaming` states, since a
/// port only ever progresses in lockstep with the node that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    NoFormat,
    FormatSet,
    BuffersSet,
    Streaming,
}

#[derive(Debug, Clone)]
pub struct Port {
    pub id: PortId,
    pub direction: Direction,
    pub capabilities: PortCapabilities,
    pub alloc: AllocParams,
    pub format: Option<Format>,
    pub buffers: Vec<Buffer>,
    /// True iff this port owns the pool region backing `buffers` (§3
    /// invariant: `allocated ⇒ buffers != [] ∧ port owns the backing region`).
    pub allocated: bool,
    /// The real-time partner link, cached for the data loop (§3). Ports own
    /// no link reference beyond this id — the link itself holds observer
    /// tokens on the port (§9).
    pub link: Option<LinkId>,
}

impl Port {
    pub fn new(id: PortId, direction: Direction, capabilities: PortCapabilities, alloc: AllocParams) -> Self {
        Self {
            id,
            direction,
            capabilities,
            alloc,
            format: None,
            buffers: Vec::new(),
            allocated: false,
            link: None,
        }
    }

    pub fn state(&self) -> PortState {
        if self.format.is_none() {
            PortState::NoFormat
        } else if self.buffers.is_empty() {
            PortState::FormatSet
        } else {
            PortState::BuffersSet
        }
    }

    pub fn info(&self) -> PortInfo {
        PortInfo {
            capabilities: self.capabilities,
            alloc: self.alloc.clone(),
            allocated: self.allocated,
            buffers: if self.allocated { self.buffers.clone() } else { Vec::new() },
        }
    }

    pub fn is_live(&self) -> bool {
        self.capabilities.contains(PortCapabilities::LIVE)
    }

    /// Clear the format, which also clears buffers and returns to no-format
    /// (§4.2).
    pub fn clear_format(&mut self) {
        self.format = None;
        self.clear_buffers();
    }

    /// Set `null` buffers: returns to `FormatSet` from `BuffersSet` (§4.2).
    pub fn clear_buffers(&mut self) {
        self.buffers.clear();
        self.allocated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_port() -> Port {
        Port::new(
            0,
            Direction::Output,
            PortCapabilities::CAN_ALLOC_BUFFERS,
            AllocParams::default(),
        )
    }

    #[test]
    fn clearing_format_clears_buffers() {
        let mut port = test_port();
        port.format = Some(Format::Audio(AudioFormat {
            rate: 44100,
            channels: 2,
            sample_format: SampleFormat::S16,
        }));
        port.buffers.push(Buffer::new(0));
        assert_eq!(port.state(), PortState::BuffersSet);

        port.clear_format();
        assert_eq!(port.state(), PortState::NoFormat);
        assert!(port.buffers.is_empty());
    }

    #[test]
    fn clearing_buffers_returns_to_format_set() {
        let mut port = test_port();
        port.format = Some(Format::Audio(AudioFormat {
            rate: 44100,
            channels: 2,
            sample_format: SampleFormat::S16,
        }));
        port.buffers.push(Buffer::new(0));
        port.allocated = true;

        port.clear_buffers();
        assert_eq!(port.state(), PortState::FormatSet);
        assert!(!port.allocated);
    }
}
