// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Data loop (component G, §5): the real-time loop that hands buffer ids
//! from a link's output node to its input node.
//!
//! Three execution modes, mirroring how a node's own clock drives it:
//! `Continuous` ticks on a fixed schedule, `Reactive` ticks only in
//! response to a `HaveOutput`/`NeedInput` event, `Manual` ticks only when
//! explicitly driven — the mode this crate's test harness uses, since tests
//! must be deterministic rather than timer-driven.

use crate::link::LinkState;
use crate::registry::Registry;
use crate::result::ResultCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Continuous,
    Reactive,
    Manual,
}

/// Drives every `Running` link one frame per `tick`.
pub struct DataLoop {
    mode: ExecutionMode,
}

impl DataLoop {
    pub fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Advance every running link by one frame: `process_output` on the
    /// output node, then hand the produced buffer id to `process_input` on
    /// the input node, finally releasing it back with `reuse_buffer` (§5).
    /// Only the buffer id crosses the loop boundary — never the buffer's
    /// backing memory itself, which both nodes already share via the pool.
    pub fn tick(&self, registry: &mut Registry) {
        let running = registry.link_ids_in_state(LinkState::Running);
        for id in running {
            let Some(link) = registry.link(&id) else { continue };
            let (output_port, input_port) = (link.output_port, link.input_port);

            registry.with_link_endpoints(&id, |output, input| {
                if !output.process_output(output_port).is_ok() {
                    return;
                }
                let Some(buffer_id) = output.current_output_buffer(output_port) else {
                    return;
                };
                if input.process_input(input_port, buffer_id) == ResultCode::Ok {
                    output.reuse_buffer(output_port, buffer_id);
                }
            });
        }
    }
}
