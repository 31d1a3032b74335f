// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Node (component D, §3, §4.1): the contract every node implementation
//! (device, test source, in-process filter, remote client proxy) satisfies.

mod core;
pub mod state;

pub use core::{NodeCore, NodeId};
pub use state::{Command, NodeEvent, NodeState};

use crate::buffer::{Buffer, BufferId};
use crate::pool::BufferPool;
use crate::port::{AllocParams, EnumCursor, Format, FormatFilter, PortId, PortInfo, SetFormatFlags};
use crate::result::ResultCode;

/// Outcome of one `enum_formats` step (§4.1): either a candidate plus the
/// cursor to resume from, or termination.
#[derive(Debug, Clone)]
pub enum EnumFormats {
    Candidate(Format, EnumCursor),
    End,
}

/// The operations every node implementation exposes (§4.1).
///
/// State transitions are driven exclusively by `set_format`,
/// `use_buffers`/`alloc_buffers`, and `send_command`. Any operation may
/// return [`ResultCode::AsyncPending`]; the result is delivered later on
/// the control loop via [`NodeEvent::AsyncComplete`].
pub trait NodeContract: Send {
    fn id(&self) -> &NodeId;
    fn state(&self) -> NodeState;

    fn get_props(&self) -> serde_json::Value;
    fn set_props(&mut self, props: serde_json::Value) -> ResultCode;

    fn send_command(&mut self, cmd: Command) -> ResultCode;

    fn ports(&self, dir: crate::port::Direction) -> Vec<PortId>;

    fn enum_formats(&self, port_id: PortId, filter: &FormatFilter, cursor: EnumCursor) -> EnumFormats;
    fn set_format(&mut self, port_id: PortId, flags: SetFormatFlags, format: Format) -> ResultCode;
    fn get_format(&self, port_id: PortId) -> Option<Format>;
    fn get_info(&self, port_id: PortId) -> Option<PortInfo>;

    fn use_buffers(&mut self, port_id: PortId, buffers: Option<Vec<Buffer>>) -> ResultCode;
    fn alloc_buffers(
        &mut self,
        port_id: PortId,
        params: &AllocParams,
        pool: &BufferPool,
    ) -> Result<Vec<BufferId>, ResultCode>;
    fn reuse_buffer(&mut self, port_id: PortId, id: BufferId) -> ResultCode;

    /// Advance one frame on the data loop: produce into `port_id`'s next
    /// free buffer.
    fn process_output(&mut self, port_id: PortId) -> ResultCode;

    /// Which buffer id `process_output` most recently filled on `port_id`,
    /// for the data loop to hand off to the link's input side (§5). Not
    /// part of the external wire surface; an internal accessor the dual-loop
    /// handoff needs since buffers never cross the loop boundary themselves.
    fn current_output_buffer(&self, port_id: PortId) -> Option<BufferId>;
    /// Advance one frame on the data loop: consume the buffer most recently
    /// handed off to `port_id`.
    fn process_input(&mut self, port_id: PortId, buffer_id: BufferId) -> ResultCode;

    /// Drain events raised since the last call (§4.1 event callback).
    fn poll_events(&mut self) -> Vec<NodeEvent>;

    /// Peek at a port's buffer list without taking it (data-loop read path,
    /// §5: buffers are written only on the control loop).
    fn peek_buffer(&self, port_id: PortId, id: BufferId) -> Option<Buffer>;

    fn link_attached(&mut self, port_id: PortId, link: crate::link::LinkId);
    fn link_detached(&mut self, port_id: PortId);
}
