// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! S5: a live source's first buffer `pts` is the time it started streaming,
//! and each subsequent buffer advances `pts` by exactly one buffer's worth
//! of samples at the negotiated rate.

mod common;

use std::time::{SystemTime, UNIX_EPOCH};

use mediagraphd::link::LinkState;
use mediagraphd::nodes::{TestSink, TestSource};

use common::Harness;

fn now_nanos() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as i64
}

#[test]
fn first_pts_is_start_time_and_advances_by_samples_over_rate() {
    let mut h = Harness::new();

    let before = now_nanos();
    let source = h.add_node(Box::new(TestSource::new("source", [44100])));
    let sink = h.add_node(Box::new(TestSink::new("sink", [44100])));
    let link_id = h.link(source.clone(), 0, sink.clone(), 0, None);

    for _ in 0..8 {
        h.tick();
        if h.control.registry.link(&link_id).unwrap().state() == LinkState::Running {
            break;
        }
    }
    let after = now_nanos();
    assert_eq!(h.control.registry.link(&link_id).unwrap().state(), LinkState::Running);

    let read_pts = |h: &Harness| -> i64 {
        let node = h.control.registry.node(&source).unwrap();
        let buffer_id = node.current_output_buffer(0).unwrap();
        node.peek_buffer(0, buffer_id).unwrap().header().unwrap().pts
    };

    let first_pts = read_pts(&h);
    assert!(
        first_pts >= before && first_pts <= after,
        "first pts {first_pts} should fall within [{before}, {after}], the window start_time was captured in"
    );

    // pts = start_time + samples_produced * 1e9 / rate, each term computed
    // fresh from the cumulative sample count rather than summed per-step
    // deltas, so truncation remainder doesn't drift the expectation.
    let rate = 44100i64;
    for step in 1..=5i64 {
        h.tick();
        let pts = read_pts(&h);
        let samples_produced = step * 1024;
        assert_eq!(pts, first_pts + samples_produced * 1_000_000_000 / rate);
    }
}
