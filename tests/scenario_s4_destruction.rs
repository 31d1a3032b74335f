// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! S4: destroying the sink while the link is running tears the link down
//! and drops the source back to idle once the link is detached.

mod common;

use mediagraphd::link::LinkState;
use mediagraphd::node::NodeState;
use mediagraphd::nodes::{TestSink, TestSource};

use common::Harness;

#[test]
fn destroying_sink_unlinks_and_idles_source() {
    let mut h = Harness::new();

    let source = h.add_node(Box::new(TestSource::new("source", [44100])));
    let sink = h.add_node(Box::new(TestSink::new("sink", [44100])));
    let link_id = h.link(source.clone(), 0, sink.clone(), 0, None);

    for _ in 0..8 {
        h.tick();
        if h.control.registry.link(&link_id).unwrap().state() == LinkState::Running {
            break;
        }
    }
    assert_eq!(h.control.registry.link(&link_id).unwrap().state(), LinkState::Running);
    h.pump(3);

    // Destroying N2's input port means destroying N2 itself, since the test
    // node model has no sub-node port-removal API.
    h.control.registry.remove_node(&sink);

    // The link is fully torn down, not merely left in `Unlinked`.
    assert!(h.control.registry.link_for_port(&source, 0).is_none());
    assert_eq!(h.control.registry.node(&source).unwrap().state(), NodeState::Init);

    // Further ticks must not dequeue anything: the link no longer exists so
    // the data loop has nothing running to drive.
    h.pump(3);
    assert_eq!(h.control.registry.node(&source).unwrap().state(), NodeState::Init);
}
