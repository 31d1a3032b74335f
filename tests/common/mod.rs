// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Deterministic test harness: ticks the control loop and data loop by hand,
//! with no real threads or timers, so the end-to-end scenarios reproduce
//! exactly every run.

use mediagraphd::control::ControlLoop;
use mediagraphd::data::{DataLoop, ExecutionMode};
use mediagraphd::link::LinkId;
use mediagraphd::node::{NodeContract, NodeId};
use mediagraphd::port::{FormatFilter, PortId};
use mediagraphd::Link;

pub struct Harness {
    pub control: ControlLoop,
    pub data: DataLoop,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            control: ControlLoop::new(),
            data: DataLoop::new(ExecutionMode::Manual),
        }
    }

    pub fn add_node(&mut self, node: Box<dyn NodeContract>) -> NodeId {
        self.control.registry.add_node(node)
    }

    pub fn link(
        &mut self,
        output_node: NodeId,
        output_port: PortId,
        input_node: NodeId,
        input_port: PortId,
        filter: Option<FormatFilter>,
    ) -> LinkId {
        self.control
            .registry
            .add_link(Link::new(output_node, output_port, input_node, input_port, filter))
    }

    /// One control-loop tick (link state machines, deferred completions)
    /// followed by one data-loop tick (buffer handoff on running links).
    pub fn tick(&mut self) {
        self.control.tick();
        self.data.tick(&mut self.control.registry);
    }

    #[allow(dead_code)]
    pub fn pump(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }
}
