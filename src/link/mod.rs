// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Link (component E, §3, §4.3): the object that negotiates a format,
//! allocates buffers, and starts streaming between one output port and one
//! input port.

mod allocate;
mod error;
mod id;
mod negotiate;
mod state;

pub use allocate::{allocate_region, choose_allocator, AllocationPlan, Allocator, MAX_BUFFERS};
pub use error::LinkError;
pub use id::LinkId;
pub use negotiate::negotiate;
pub use state::LinkState;

use crate::node::{Command, NodeContract, NodeId, NodeState};
use crate::pool::BufferPool;
use crate::port::{Format, FormatFilter, PortId, SetFormatFlags};

/// A link between one output port and one input port.
///
/// A `Link` stores only ids, never node references: the control loop looks
/// nodes up in the registry and passes them in for each [`Link::check`]
/// call, since nodes are owned there, not by the link (§9 observer
/// registration note — the link's only durable state is its own).
pub struct Link {
    pub id: LinkId,
    pub output_node: NodeId,
    pub output_port: PortId,
    pub input_node: NodeId,
    pub input_port: PortId,
    pub filter: Option<FormatFilter>,
    state: LinkState,
    error: Option<LinkError>,
    region: Option<crate::pool::PoolRegion>,
}

impl Link {
    pub fn new(
        output_node: NodeId,
        output_port: PortId,
        input_node: NodeId,
        input_port: PortId,
        filter: Option<FormatFilter>,
    ) -> Self {
        Self {
            id: LinkId::new(),
            output_node,
            output_port,
            input_node,
            input_port,
            filter,
            state: LinkState::Init,
            error: None,
            region: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn error(&self) -> Option<&LinkError> {
        self.error.as_ref()
    }

    /// The pool region the link itself allocated, if it was the allocator
    /// for this link (`Allocator::Link`, §4.3).
    pub fn region(&self) -> Option<&crate::pool::PoolRegion> {
        self.region.as_ref()
    }

    fn fail(&mut self, err: LinkError) {
        tracing::warn!(link = %self.id, error = %err, "link entering error state");
        self.error = Some(err);
        self.state = LinkState::Error;
    }

    /// Drive the link as far forward through negotiate → allocate → start as
    /// the current node states allow (§4.3).
    ///
    /// Re-entrant: the control loop calls this again whenever either node's
    /// state changes (a port losing its format, a node erroring), and each
    /// call re-reads that state rather than trusting what a previous call
    /// observed.
    pub fn check(&mut self, output: &mut dyn NodeContract, input: &mut dyn NodeContract, pool: &BufferPool) {
        if matches!(self.state, LinkState::Error | LinkState::Unlinked) {
            return;
        }

        if output.state() == NodeState::Error || input.state() == NodeState::Error {
            self.fail(LinkError::set_format_rejected(crate::result::ResultCode::Error));
            return;
        }

        if self.state == LinkState::Init {
            self.state = LinkState::Negotiating;
        }

        if self.state == LinkState::Negotiating {
            match self.do_negotiate(output, input) {
                Ok(()) => self.state = LinkState::Allocating,
                Err(e) => return self.fail(e),
            }
        }

        if self.state == LinkState::Allocating {
            match self.do_allocate(output, input, pool) {
                Ok(()) => self.state = LinkState::Paused,
                Err(e) => return self.fail(e),
            }
        }

        if self.state == LinkState::Paused {
            self.try_start(output, input);
        }
    }

    fn do_negotiate(&mut self, output: &mut dyn NodeContract, input: &mut dyn NodeContract) -> Result<(), LinkError> {
        let format = negotiate(output, self.output_port, input, self.input_port, self.filter.as_ref())?;
        self.apply_format(output, self.output_port, format)?;
        self.apply_format(input, self.input_port, format)?;
        Ok(())
    }

    fn apply_format(&self, node: &mut dyn NodeContract, port: PortId, format: Format) -> Result<(), LinkError> {
        let code = node.set_format(port, SetFormatFlags::Nearest, format);
        if code.is_ok() {
            Ok(())
        } else {
            Err(LinkError::set_format_rejected(code))
        }
    }

    fn do_allocate(
        &mut self,
        output: &mut dyn NodeContract,
        input: &mut dyn NodeContract,
        pool: &BufferPool,
    ) -> Result<(), LinkError> {
        let output_info = output
            .get_info(self.output_port)
            .ok_or_else(|| LinkError::no_common_buffer_alloc("output port has no info"))?;
        let input_info = input
            .get_info(self.input_port)
            .ok_or_else(|| LinkError::no_common_buffer_alloc("input port has no info"))?;

        // The output already owns buffers from a previous link (e.g. it
        // fans out to more than one input): adopt them as-is rather than
        // reallocating, and tell the input to use the same set (§4.3
        // Allocate, reused-output path).
        if output_info.allocated {
            self.hand_off(input, self.input_port, output_info.buffers.clone())?;
            output.link_attached(self.output_port, self.id.clone());
            input.link_attached(self.input_port, self.id.clone());
            tracing::debug!(link = %self.id, buffers = output_info.buffers.len(), "reused output buffers");
            return Ok(());
        }

        let allocator = choose_allocator(output_info.capabilities, input_info.capabilities)?;
        let plan = AllocationPlan::compute(&output_info.alloc, &input_info.alloc);

        match allocator {
            Allocator::Output => {
                let params = plan.to_alloc_params();
                let ids = output
                    .alloc_buffers(self.output_port, &params, pool)
                    .map_err(LinkError::set_format_rejected)?;
                let buffers = ids
                    .into_iter()
                    .filter_map(|id| output.peek_buffer(self.output_port, id))
                    .collect::<Vec<_>>();
                self.hand_off(input, self.input_port, buffers)?;
            }
            Allocator::Input => {
                let params = plan.to_alloc_params();
                let ids = input
                    .alloc_buffers(self.input_port, &params, pool)
                    .map_err(LinkError::set_format_rejected)?;
                let buffers = ids
                    .into_iter()
                    .filter_map(|id| input.peek_buffer(self.input_port, id))
                    .collect::<Vec<_>>();
                self.hand_off(output, self.output_port, buffers)?;
            }
            Allocator::Link => {
                let (region, buffers) = allocate::allocate_region(pool, &plan)?;
                self.hand_off(output, self.output_port, buffers.clone())?;
                self.hand_off(input, self.input_port, buffers)?;
                self.region = Some(region);
            }
        }

        output.link_attached(self.output_port, self.id.clone());
        input.link_attached(self.input_port, self.id.clone());
        tracing::debug!(
            link = %self.id,
            buffers = plan.n_buffers,
            ringbuffer = allocate::is_ringbuffer_plan(&plan),
            "buffers allocated"
        );
        Ok(())
    }

    fn hand_off(
        &self,
        node: &mut dyn NodeContract,
        port: PortId,
        buffers: Vec<crate::buffer::Buffer>,
    ) -> Result<(), LinkError> {
        let code = node.use_buffers(port, Some(buffers));
        if code.is_ok() {
            Ok(())
        } else {
            Err(LinkError::set_format_rejected(code))
        }
    }

    /// Start step (§4.3): once both nodes are streaming, the link runs.
    fn try_start(&mut self, output: &mut dyn NodeContract, input: &mut dyn NodeContract) {
        if output.state() == NodeState::Paused {
            output.send_command(Command::Start);
        }
        if input.state() == NodeState::Paused {
            input.send_command(Command::Start);
        }
        if output.state() == NodeState::Streaming && input.state() == NodeState::Streaming {
            self.state = LinkState::Running;
            tracing::debug!(link = %self.id, "link running");
        }
    }

    /// Two-phase destruction (§4.4): detach both ports, release the link's
    /// own pool region ownership if it held one, and mark `Unlinked`.
    pub fn unlink(&mut self, output: &mut dyn NodeContract, input: &mut dyn NodeContract) {
        output.link_detached(self.output_port);
        input.link_detached(self.input_port);
        self.mark_unlinked();
        tracing::debug!(link = %self.id, "link unlinked");
    }

    /// Release the link's own pool region ownership (if any) and mark it
    /// `Unlinked`, without touching its endpoint nodes. Used when a node is
    /// already gone by the time its link is torn down (§4.4).
    pub fn mark_unlinked(&mut self) {
        if let Some(region) = self.region.take() {
            region.remove_owner();
        }
        self.state = LinkState::Unlinked;
    }
}
