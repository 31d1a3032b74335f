// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! A counting consumer node: accepts whatever format and buffers its one
//! input port is handed, and tracks how many buffers it has consumed.

use crate::buffer::{Buffer, BufferId};
use crate::link::{allocate_region, AllocationPlan, LinkId};
use crate::node::{Command, EnumFormats, NodeContract, NodeCore, NodeEvent, NodeId, NodeState};
use crate::pool::{BufferPool, PoolRegion};
use crate::port::{
    AllocParams, AudioFormat, Direction, EnumCursor, Format, FormatFilter, Port, PortCapabilities,
    PortId, PortInfo, SampleFormat, SetFormatFlags,
};
use crate::result::ResultCode;

const INPUT_PORT: PortId = 0;

/// A sink that accepts a fixed set of candidate rates and counts consumed
/// buffers, for use as the downstream end of negotiation/allocation tests.
pub struct TestSink {
    core: NodeCore,
    candidates: Vec<Format>,
    consumed: u64,
    region: Option<PoolRegion>,
}

impl TestSink {
    pub fn new(id: impl Into<NodeId>, rates: impl IntoIterator<Item = u32>) -> Self {
        let mut core = NodeCore::new(id);
        core.add_port(Port::new(
            INPUT_PORT,
            Direction::Input,
            PortCapabilities::CAN_USE_BUFFERS,
            AllocParams::default(),
        ));
        let candidates = rates
            .into_iter()
            .map(|rate| {
                Format::Audio(AudioFormat {
                    rate,
                    channels: 2,
                    sample_format: SampleFormat::S16,
                })
            })
            .collect();
        Self {
            core,
            candidates,
            consumed: 0,
            region: None,
        }
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Override the input port's capability flags, for scenarios that need
    /// a non-default allocation role (§8 S2: both sides `CanUseBuffers`).
    pub fn with_capabilities(mut self, caps: PortCapabilities) -> Self {
        if let Some(port) = self.core.port_mut(INPUT_PORT) {
            port.capabilities = caps;
        }
        self
    }

    /// Override the input port's declared allocation parameters, for
    /// scenarios that need a ringbuffer meta or non-default sizing (§8 S6).
    pub fn with_alloc_params(mut self, params: AllocParams) -> Self {
        if let Some(port) = self.core.port_mut(INPUT_PORT) {
            port.alloc = params;
        }
        self
    }
}

impl NodeContract for TestSink {
    fn id(&self) -> &NodeId {
        &self.core.id
    }

    fn state(&self) -> NodeState {
        self.core.state()
    }

    fn get_props(&self) -> serde_json::Value {
        serde_json::json!({ "consumed": self.consumed })
    }

    fn set_props(&mut self, _props: serde_json::Value) -> ResultCode {
        ResultCode::Ok
    }

    fn send_command(&mut self, cmd: Command) -> ResultCode {
        self.core.send_command(cmd)
    }

    fn ports(&self, dir: Direction) -> Vec<PortId> {
        self.core.ports_in(dir)
    }

    fn enum_formats(&self, port_id: PortId, filter: &FormatFilter, cursor: EnumCursor) -> EnumFormats {
        if port_id != INPUT_PORT {
            return EnumFormats::End;
        }
        let mut idx = cursor.0 as usize;
        while idx < self.candidates.len() {
            let candidate = self.candidates[idx];
            idx += 1;
            if filter.matches(&candidate) {
                return EnumFormats::Candidate(candidate, EnumCursor(idx as u32));
            }
        }
        EnumFormats::End
    }

    fn set_format(&mut self, port_id: PortId, _flags: SetFormatFlags, format: Format) -> ResultCode {
        if port_id != INPUT_PORT {
            return ResultCode::InvalidPort;
        }
        if !self.candidates.contains(&format) {
            return ResultCode::InvalidArguments;
        }
        if let Some(port) = self.core.port_mut(port_id) {
            port.format = Some(format);
        }
        self.core.on_format_set(port_id);
        ResultCode::Ok
    }

    fn get_format(&self, port_id: PortId) -> Option<Format> {
        self.core.port(port_id)?.format
    }

    fn get_info(&self, port_id: PortId) -> Option<PortInfo> {
        Some(self.core.port(port_id)?.info())
    }

    fn use_buffers(&mut self, port_id: PortId, buffers: Option<Vec<Buffer>>) -> ResultCode {
        let Some(port) = self.core.port_mut(port_id) else {
            return ResultCode::InvalidPort;
        };
        match buffers {
            Some(bufs) => {
                port.buffers = bufs;
                port.allocated = false;
                match self.core.on_buffers_set(port_id) {
                    Ok(()) => ResultCode::Ok,
                    Err(e) => ResultCode::from(&e),
                }
            }
            None => {
                port.clear_buffers();
                self.core.on_buffers_cleared();
                ResultCode::Ok
            }
        }
    }

    fn alloc_buffers(
        &mut self,
        port_id: PortId,
        params: &AllocParams,
        pool: &BufferPool,
    ) -> Result<Vec<BufferId>, ResultCode> {
        if port_id != INPUT_PORT {
            return Err(ResultCode::InvalidPort);
        }
        let plan = AllocationPlan::from_params(params);
        let (region, buffers) = allocate_region(pool, &plan).map_err(|_| ResultCode::Error)?;
        let ids = buffers.iter().map(|b| b.id).collect();
        self.region = Some(region);

        let Some(port) = self.core.port_mut(port_id) else {
            return Err(ResultCode::InvalidPort);
        };
        port.buffers = buffers;
        port.allocated = true;
        self.core
            .on_buffers_set(port_id)
            .map_err(|e| ResultCode::from(&e))?;
        Ok(ids)
    }

    fn reuse_buffer(&mut self, port_id: PortId, id: BufferId) -> ResultCode {
        let Some(port) = self.core.port(port_id) else {
            return ResultCode::InvalidPort;
        };
        if port.buffers.iter().find(|b| b.id == id).is_none() {
            return ResultCode::InvalidBufferId;
        }
        tracing::trace!(node = %self.core.id, port = port_id, buffer = id, "buffer reused");
        ResultCode::Ok
    }

    fn process_output(&mut self, _port_id: PortId) -> ResultCode {
        ResultCode::InvalidPort
    }

    fn current_output_buffer(&self, _port_id: PortId) -> Option<BufferId> {
        None
    }

    fn process_input(&mut self, port_id: PortId, buffer_id: BufferId) -> ResultCode {
        if port_id != INPUT_PORT {
            return ResultCode::InvalidPort;
        }
        if self.core.port(port_id).and_then(|p| p.buffers.iter().find(|b| b.id == buffer_id)).is_none() {
            return ResultCode::InvalidBufferId;
        }
        self.consumed += 1;
        self.core.push_event(NodeEvent::ReuseBuffer {
            port_id,
            buffer_id,
        });
        ResultCode::Ok
    }

    fn poll_events(&mut self) -> Vec<NodeEvent> {
        self.core.take_events()
    }

    fn peek_buffer(&self, port_id: PortId, id: BufferId) -> Option<Buffer> {
        self.core.port(port_id)?.buffers.iter().find(|b| b.id == id).cloned()
    }

    fn link_attached(&mut self, port_id: PortId, link: LinkId) {
        if let Some(port) = self.core.port_mut(port_id) {
            port.link = Some(link);
        }
    }

    fn link_detached(&mut self, port_id: PortId) {
        if let Some(port) = self.core.port_mut(port_id) {
            port.link = None;
            port.clear_format();
        }
        self.core.on_format_cleared(port_id);
        if let Some(region) = self.region.take() {
            region.remove_owner();
        }
        if !self.core.any_port_linked() {
            self.core.drop_idle();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_consumed_buffers() {
        let mut sink = TestSink::new("sink0", [44100]);
        let format = Format::Audio(AudioFormat {
            rate: 44100,
            channels: 2,
            sample_format: SampleFormat::S16,
        });
        assert_eq!(
            sink.set_format(INPUT_PORT, SetFormatFlags::Fixed, format),
            ResultCode::Ok
        );
        let pool = BufferPool::new();
        let params = AllocParams {
            min_buffers: 2,
            max_buffers: 2,
            ..AllocParams::default()
        };
        let ids = sink.alloc_buffers(INPUT_PORT, &params, &pool).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(sink.process_input(INPUT_PORT, ids[0]), ResultCode::Ok);
        assert_eq!(sink.consumed(), 1);
    }

    #[test]
    fn rejects_unknown_buffer_id() {
        let mut sink = TestSink::new("sink0", [44100]);
        assert_eq!(sink.process_input(INPUT_PORT, 99), ResultCode::InvalidBufferId);
    }

    #[test]
    fn reuse_buffer_rejects_unknown_id() {
        let mut sink = TestSink::new("sink0", [44100]);
        let format = Format::Audio(AudioFormat {
            rate: 44100,
            channels: 2,
            sample_format: SampleFormat::S16,
        });
        assert_eq!(
            sink.set_format(INPUT_PORT, SetFormatFlags::Fixed, format),
            ResultCode::Ok
        );
        let pool = BufferPool::new();
        let ids = sink.alloc_buffers(INPUT_PORT, &AllocParams::default(), &pool).unwrap();
        assert_eq!(sink.reuse_buffer(INPUT_PORT, ids[0]), ResultCode::Ok);
        assert_eq!(sink.reuse_buffer(INPUT_PORT, 99), ResultCode::InvalidBufferId);
    }
}
