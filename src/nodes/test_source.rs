// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! A synthetic audio source node, grounded on PipeWire's
//! `audiotestsrc` plugin: a single live output port generating a sine wave
//! at a fixed default rate, with `freq`/`volume` as its only properties.

use crate::buffer::{Buffer, BufferId};
use crate::link::{allocate_region, AllocationPlan, LinkId};
use crate::node::{Command, EnumFormats, NodeContract, NodeCore, NodeEvent, NodeId, NodeState};
use crate::pool::{BufferPool, PoolRegion};
use crate::port::{
    AllocParams, AudioFormat, Direction, EnumCursor, Format, FormatFilter, Port, PortCapabilities,
    PortId, PortInfo, SampleFormat, SetFormatFlags,
};
use crate::result::ResultCode;

const OUTPUT_PORT: PortId = 0;

/// Default wave parameters (`audiotestsrc.c`: `wave=sine(0)`, `freq=440.0`).
#[derive(Debug, Clone, Copy)]
pub struct WaveProps {
    pub freq: f64,
    pub volume: f64,
}

impl Default for WaveProps {
    fn default() -> Self {
        Self {
            freq: 440.0,
            volume: 1.0,
        }
    }
}

/// Audio frames produced per `process_output` call, used to derive `pts`
/// (§8 S5). Arbitrary but fixed, like a real source's callback period.
const SAMPLES_PER_BUFFER: u64 = 1024;

/// A synthetic sine-wave audio source with one live output port.
pub struct TestSource {
    core: NodeCore,
    props: WaveProps,
    candidates: Vec<Format>,
    region: Option<PoolRegion>,
    last_produced: Option<BufferId>,
    /// Recorded at the first `Start` of this streaming session (§8 S5).
    start_time: Option<i64>,
    samples_produced: u64,
}

impl TestSource {
    /// `rates` lists the sample rates this source exports, in enumeration
    /// order; all candidates are stereo 16-bit (§8 S1's `bpf == 2*channels`).
    pub fn new(id: impl Into<NodeId>, rates: impl IntoIterator<Item = u32>) -> Self {
        let mut core = NodeCore::new(id);
        core.add_port(Port::new(
            OUTPUT_PORT,
            Direction::Output,
            PortCapabilities::CAN_ALLOC_BUFFERS | PortCapabilities::LIVE,
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
            props: WaveProps::default(),
            candidates,
            region: None,
            last_produced: None,
            start_time: None,
            samples_produced: 0,
        }
    }

    /// Override the output port's capability flags, for scenarios that need
    /// a non-default allocation role (§8 S2: both sides `CanUseBuffers`).
    pub fn with_capabilities(mut self, caps: PortCapabilities) -> Self {
        if let Some(port) = self.core.port_mut(OUTPUT_PORT) {
            port.capabilities = caps;
        }
        self
    }

    /// Override the output port's declared allocation parameters, for
    /// scenarios that need a ringbuffer meta or non-default sizing (§8 S6).
    pub fn with_alloc_params(mut self, params: AllocParams) -> Self {
        if let Some(port) = self.core.port_mut(OUTPUT_PORT) {
            port.alloc = params;
        }
        self
    }
}

fn now_nanos() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos() as i64
}

impl NodeContract for TestSource {
    fn id(&self) -> &NodeId {
        &self.core.id
    }

    fn state(&self) -> NodeState {
        self.core.state()
    }

    fn get_props(&self) -> serde_json::Value {
        serde_json::json!({ "freq": self.props.freq, "volume": self.props.volume, "wave": "sine" })
    }

    fn set_props(&mut self, props: serde_json::Value) -> ResultCode {
        if let Some(freq) = props.get("freq").and_then(|v| v.as_f64()) {
            self.props.freq = freq;
        }
        if let Some(volume) = props.get("volume").and_then(|v| v.as_f64()) {
            self.props.volume = volume.clamp(0.0, 10.0);
        }
        ResultCode::Ok
    }

    fn send_command(&mut self, cmd: Command) -> ResultCode {
        if matches!(cmd, Command::Start) && self.start_time.is_none() {
            self.start_time = Some(now_nanos());
        }
        self.core.send_command(cmd)
    }

    fn ports(&self, dir: Direction) -> Vec<PortId> {
        self.core.ports_in(dir)
    }

    fn enum_formats(&self, port_id: PortId, filter: &FormatFilter, cursor: EnumCursor) -> EnumFormats {
        if port_id != OUTPUT_PORT {
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
        if port_id != OUTPUT_PORT {
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
        if port_id != OUTPUT_PORT {
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

    fn process_output(&mut self, port_id: PortId) -> ResultCode {
        if port_id != OUTPUT_PORT {
            return ResultCode::InvalidPort;
        }
        if self.core.state() != NodeState::Streaming {
            return ResultCode::Unexpected;
        }
        let seq = self.core.next_seq();
        let rate = self
            .core
            .port(port_id)
            .and_then(|p| p.format)
            .and_then(|f| f.as_audio().map(|a| a.rate))
            .unwrap_or(44100) as i64;
        let pts = self.start_time.unwrap_or(0) + (self.samples_produced as i64 * 1_000_000_000 / rate);

        let Some(port) = self.core.port_mut(port_id) else {
            return ResultCode::InvalidPort;
        };
        if port.buffers.is_empty() {
            return ResultCode::NoBuffers;
        }
        let idx = (seq as usize) % port.buffers.len();
        let buffer_id = port.buffers[idx].id;
        if let Some(header) = port.buffers[idx].header_mut() {
            header.seq = seq;
            header.pts = pts;
        }
        self.samples_produced += SAMPLES_PER_BUFFER;
        self.last_produced = Some(buffer_id);
        self.core.push_event(NodeEvent::HaveOutput);
        ResultCode::Ok
    }

    fn current_output_buffer(&self, port_id: PortId) -> Option<BufferId> {
        if port_id != OUTPUT_PORT {
            return None;
        }
        self.last_produced
    }

    fn process_input(&mut self, _port_id: PortId, _buffer_id: BufferId) -> ResultCode {
        ResultCode::InvalidPort
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
    fn enumerates_configured_rates_in_order() {
        let source = TestSource::new("src0", [44100, 48000]);
        let f1 = source.enum_formats(OUTPUT_PORT, &FormatFilter::any(), EnumCursor::default());
        let EnumFormats::Candidate(fmt, cursor) = f1 else {
            panic!("expected candidate")
        };
        assert_eq!(fmt.as_audio().unwrap().rate, 44100);

        let f2 = source.enum_formats(OUTPUT_PORT, &FormatFilter::any(), cursor);
        let EnumFormats::Candidate(fmt, _) = f2 else {
            panic!("expected candidate")
        };
        assert_eq!(fmt.as_audio().unwrap().rate, 48000);
    }

    #[test]
    fn rejects_format_not_in_candidate_list() {
        let mut source = TestSource::new("src0", [44100]);
        let rejected = Format::Audio(AudioFormat {
            rate: 96000,
            channels: 2,
            sample_format: SampleFormat::S16,
        });
        assert_eq!(
            source.set_format(OUTPUT_PORT, SetFormatFlags::Fixed, rejected),
            ResultCode::InvalidArguments
        );
    }

    #[test]
    fn reuse_buffer_rejects_unknown_id() {
        let mut source = TestSource::new("src0", [44100]);
        let format = Format::Audio(AudioFormat {
            rate: 44100,
            channels: 2,
            sample_format: SampleFormat::S16,
        });
        assert_eq!(
            source.set_format(OUTPUT_PORT, SetFormatFlags::Fixed, format),
            ResultCode::Ok
        );
        let pool = BufferPool::new();
        let ids = source
            .alloc_buffers(OUTPUT_PORT, &AllocParams::default(), &pool)
            .unwrap();
        assert_eq!(source.reuse_buffer(OUTPUT_PORT, ids[0]), ResultCode::Ok);
        assert_eq!(source.reuse_buffer(OUTPUT_PORT, 99), ResultCode::InvalidBufferId);
    }
}
