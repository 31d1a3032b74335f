// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shared node state-machine bookkeeping.
//!
//! Concrete node implementations embed a `NodeCore` and delegate the common
//! parts of the contract (port storage, state transitions, sequencing,
//! event queueing) to it, rather than each reimplementing the state
//! machine. This is composition, not the source's pointer-arithmetic
//! "object-owns-implementation" idiom (§9) — `NodeCore` is a plain field.

use std::collections::HashMap;

use crate::error::{GraphError, Result};
use crate::port::{Direction, Port, PortId};
use crate::result::ResultCode;

use super::state::{Command, NodeEvent, NodeState, SeqAllocator};

pub type NodeId = String;

pub struct NodeCore {
    pub id: NodeId,
    state: NodeState,
    ports: HashMap<PortId, Port>,
    seq: SeqAllocator,
    events: Vec<NodeEvent>,
}

impl NodeCore {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            state: NodeState::Init,
            ports: HashMap::new(),
            seq: SeqAllocator::default(),
            events: Vec::new(),
        }
    }

    pub fn add_port(&mut self, port: Port) {
        self.ports.insert(port.id, port);
        if self.state == NodeState::Init {
            self.state = NodeState::Configure;
        }
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn port(&self, id: PortId) -> Option<&Port> {
        self.ports.get(&id)
    }

    pub fn port_mut(&mut self, id: PortId) -> Option<&mut Port> {
        self.ports.get_mut(&id)
    }

    pub fn ports_in(&self, dir: Direction) -> Vec<PortId> {
        let mut ids: Vec<PortId> = self
            .ports
            .values()
            .filter(|p| p.direction == dir)
            .map(|p| p.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn push_event(&mut self, event: NodeEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<NodeEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn next_seq(&mut self) -> u64 {
        self.seq.allocate()
    }

    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.state = NodeState::Error;
        tracing::warn!(node = %self.id, error = %msg.into(), "node entered error state");
        self.push_event(NodeEvent::Error);
    }

    /// Called after a `set_format` succeeds: `Configure -> Ready` (§3).
    pub fn on_format_set(&mut self, port_id: PortId) {
        if self.state == NodeState::Configure {
            self.state = NodeState::Ready;
        }
        tracing::debug!(node = %self.id, port = port_id, "format set");
    }

    /// Called after `clear_format`: drops back to `Configure` if currently
    /// `Ready` (no other port still holds a format).
    pub fn on_format_cleared(&mut self, port_id: PortId) {
        if self.state == NodeState::Ready && self.all_ports_formatless() {
            self.state = NodeState::Configure;
        }
        tracing::debug!(node = %self.id, port = port_id, "format cleared");
    }

    fn all_ports_formatless(&self) -> bool {
        self.ports.values().all(|p| p.format.is_none())
    }

    /// Called after `use_buffers`/`alloc_buffers` succeeds while `Ready`:
    /// `Ready -> Paused` (§3 invariant: a port can only `use` buffers while
    /// its node is `Ready`; once used, the node advances to `Paused`).
    pub fn on_buffers_set(&mut self, port_id: PortId) -> Result<()> {
        if self.state != NodeState::Ready {
            return Err(GraphError::InvalidArguments(format!(
                "node {} is {:?}, buffers can only be set while Ready",
                self.id, self.state
            )));
        }
        self.state = NodeState::Paused;
        tracing::debug!(node = %self.id, port = port_id, "buffers set, node paused");
        Ok(())
    }

    /// Called after `use_buffers(null)`: buffers-set -> format-set (§4.2),
    /// node returns to `Ready` if it has no remaining buffer-holding ports.
    pub fn on_buffers_cleared(&mut self) {
        if self.state == NodeState::Paused && self.all_ports_bufferless() {
            self.state = NodeState::Ready;
        }
    }

    fn all_ports_bufferless(&self) -> bool {
        self.ports.values().all(|p| p.buffers.is_empty())
    }

    /// Whether any port still has a link attached, used to decide whether a
    /// node should drop to idle after one of its links is torn down (§4.4).
    pub fn any_port_linked(&self) -> bool {
        self.ports.values().any(|p| p.link.is_some())
    }

    pub fn send_command(&mut self, cmd: Command) -> ResultCode {
        match cmd {
            Command::Start => {
                if self.state != NodeState::Paused && self.state != NodeState::Streaming {
                    return match self.state {
                        NodeState::Configure | NodeState::Init => ResultCode::NoFormat,
                        _ => ResultCode::NoBuffers,
                    };
                }
                self.state = NodeState::Streaming;
                ResultCode::Ok
            }
            Command::Pause => {
                if self.state == NodeState::Streaming || self.state == NodeState::Paused {
                    self.state = NodeState::Paused;
                    ResultCode::Ok
                } else {
                    ResultCode::Unexpected
                }
            }
            Command::Flush | Command::Drain | Command::Marker | Command::ClockUpdate => {
                ResultCode::Ok
            }
        }
    }

    /// Drop to `Init`/idle when a node has no remaining links (§4.4).
    pub fn drop_idle(&mut self) {
        self.state = NodeState::Init;
    }
}
