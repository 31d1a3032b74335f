// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Node state machine, commands, and event callback types (§3, §4.1).

use crate::buffer::BufferId;
use crate::result::ResultCode;

/// Node state `S` (§3). Stable string names per §6 for logs/signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Init,
    Configure,
    Ready,
    Paused,
    Streaming,
    Error,
}

impl NodeState {
    /// Stable string name for logs and registry signals (§6).
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Init => "init",
            NodeState::Configure => "configure",
            NodeState::Ready => "ready",
            NodeState::Paused => "paused",
            NodeState::Streaming => "streaming",
            NodeState::Error => "error",
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands accepted by `send_command` (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Flush,
    Drain,
    Marker,
    ClockUpdate,
}

/// Events a node raises back to the control loop (§4.1).
#[derive(Debug, Clone, Copy)]
pub enum NodeEvent {
    HaveOutput,
    NeedInput,
    AsyncComplete { seq: u64, result: ResultCode },
    ReuseBuffer { port_id: u32, buffer_id: BufferId },
    Error,
}

/// Allocates strictly increasing sequence numbers for async completions,
/// per node (§3 invariant, §8 property 4).
#[derive(Debug, Default)]
pub struct SeqAllocator {
    next: u64,
}

impl SeqAllocator {
    pub fn allocate(&mut self) -> u64 {
        let seq = self.next;
        self.next += 1;
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_allocator_is_monotone() {
        let mut alloc = SeqAllocator::default();
        let seqs: Vec<u64> = (0..5).map(|_| alloc.allocate()).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn state_names_match_spec() {
        assert_eq!(NodeState::Init.as_str(), "init");
        assert_eq!(NodeState::Configure.as_str(), "configure");
        assert_eq!(NodeState::Ready.as_str(), "ready");
        assert_eq!(NodeState::Paused.as_str(), "paused");
        assert_eq!(NodeState::Streaming.as_str(), "streaming");
        assert_eq!(NodeState::Error.as_str(), "error");
    }
}
