// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! S2: neither side can allocate, both can use buffers, so the link
//! allocates a single pool region for both; the region is released once
//! both endpoints are destroyed.

mod common;

use mediagraphd::link::LinkState;
use mediagraphd::nodes::{TestSink, TestSource};
use mediagraphd::port::PortCapabilities;

use common::Harness;

#[test]
fn link_allocates_single_region_and_frees_it() {
    let mut h = Harness::new();

    let source = h.add_node(Box::new(
        TestSource::new("source", [44100]).with_capabilities(PortCapabilities::CAN_USE_BUFFERS | PortCapabilities::LIVE),
    ));
    let sink = h.add_node(Box::new(
        TestSink::new("sink", [44100]).with_capabilities(PortCapabilities::CAN_USE_BUFFERS),
    ));
    let link_id = h.link(source.clone(), 0, sink.clone(), 0, None);

    for _ in 0..8 {
        h.tick();
        if h.control.registry.link(&link_id).unwrap().state() == LinkState::Running {
            break;
        }
    }
    assert_eq!(h.control.registry.link(&link_id).unwrap().state(), LinkState::Running);

    let region = h
        .control
        .registry
        .link(&link_id)
        .unwrap()
        .region()
        .cloned()
        .expect("link should own the allocated region");
    assert_eq!(
        region.size(),
        4096,
        "header-only stereo buffers at the default max_buffers=0 (16) still round up to one page"
    );
    assert_eq!(region.owner_count(), 1);

    h.control.registry.remove_node(&source);
    h.control.registry.remove_node(&sink);

    assert_eq!(region.owner_count(), 0, "region should be released once the link is torn down");
}
