// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! S3: a link-level filter that accepts only 48000 Hz against a source that
//! only exports 44100 Hz fails negotiation; both nodes stay in `Configure`.

mod common;

use mediagraphd::link::LinkState;
use mediagraphd::node::NodeState;
use mediagraphd::nodes::{TestSink, TestSource};
use mediagraphd::port::FormatFilter;

use common::Harness;

#[test]
fn mismatched_filter_fails_negotiation() {
    let mut h = Harness::new();

    let source = h.add_node(Box::new(TestSource::new("source", [44100])));
    let sink = h.add_node(Box::new(TestSink::new("sink", [44100])));
    let filter = FormatFilter {
        rate: Some(48000),
        ..FormatFilter::any()
    };
    let link_id = h.link(source.clone(), 0, sink.clone(), 0, Some(filter));

    h.pump(4);

    let link = h.control.registry.link(&link_id).unwrap();
    assert_eq!(link.state(), LinkState::Error);
    assert!(link.error().unwrap().message().contains("no common format"));

    assert_eq!(h.control.registry.node(&source).unwrap().state(), NodeState::Configure);
    assert_eq!(h.control.registry.node(&sink).unwrap().state(), NodeState::Configure);
}
