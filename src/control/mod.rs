// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Control loop (component F, §3, §5): owns the registry and pool, drives
//! every link's state machine, and dispatches asynchronous completions.
//!
//! `defer`/`async_complete` implement the cross-loop suspension mechanism
//! (§3): any node operation may return `ResultCode::AsyncPending(seq)`; the
//! caller registers a continuation for `seq` via `defer`, and whichever
//! loop eventually finishes the work calls `async_complete(seq, result)` to
//! resume it. Completions fire in the order `async_complete` was called,
//! not the order `defer` registered them, since that is the order in which
//! the underlying work actually finished.

use std::collections::{HashMap, VecDeque};

use crate::pool::BufferPool;
use crate::registry::Registry;
use crate::result::ResultCode;

type Continuation = Box<dyn FnOnce(&mut Registry, ResultCode) + Send>;

/// The control loop: single-threaded, owns the graph's registry and the
/// shared buffer pool, never blocks (§5).
#[derive(Default)]
pub struct ControlLoop {
    pub registry: Registry,
    pub pool: BufferPool,
    pending: HashMap<u64, Continuation>,
    ready: VecDeque<(u64, ResultCode)>,
}

impl ControlLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a continuation to run when `seq` completes (§3).
    pub fn defer(&mut self, seq: u64, continuation: Continuation) {
        self.pending.insert(seq, continuation);
    }

    /// Cancel a previously deferred continuation. Returns `true` if one was
    /// pending.
    pub fn cancel(&mut self, seq: u64) -> bool {
        self.pending.remove(&seq).is_some()
    }

    /// Record that `seq` has completed with `result`. The continuation runs
    /// on the next `tick`, preserving call order across multiple pending
    /// completions (§8 property 4).
    pub fn async_complete(&mut self, seq: u64, result: ResultCode) {
        self.ready.push_back((seq, result));
    }

    /// Run one control-loop step: drain completed continuations in FIFO
    /// order, then re-check every link's state machine.
    pub fn tick(&mut self) {
        while let Some((seq, result)) = self.ready.pop_front() {
            if let Some(continuation) = self.pending.remove(&seq) {
                continuation(&mut self.registry, result);
            }
        }
        self.registry.check_links(&self.pool);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
