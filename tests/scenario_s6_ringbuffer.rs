// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! S6: enabling the ringbuffer meta on both sides forces a single shared
//! buffer, initialised with the declared capacity and zeroed indices.

mod common;

use mediagraphd::buffer::{Meta, MetaEnable, MetaType};
use mediagraphd::link::LinkState;
use mediagraphd::nodes::{TestSink, TestSource};
use mediagraphd::port::{AllocParams, PortCapabilities};

use common::Harness;

fn ringbuffer_params() -> AllocParams {
    AllocParams {
        minsize: 0,
        stride: 1,
        min_buffers: 4,
        max_buffers: 8,
        align: 16,
        enabled_metas: vec![MetaEnable::Ringbuffer {
            minsize: 4096,
            stride: 1,
            blocks: 1,
        }],
    }
}

#[test]
fn ringbuffer_meta_forces_single_buffer() {
    let mut h = Harness::new();

    let source = h.add_node(Box::new(
        TestSource::new("source", [44100])
            .with_capabilities(PortCapabilities::CAN_USE_BUFFERS)
            .with_alloc_params(ringbuffer_params()),
    ));
    let sink = h.add_node(Box::new(
        TestSink::new("sink", [44100])
            .with_capabilities(PortCapabilities::CAN_USE_BUFFERS)
            .with_alloc_params(ringbuffer_params()),
    ));
    let link_id = h.link(source.clone(), 0, sink.clone(), 0, None);

    for _ in 0..8 {
        h.tick();
        if h.control.registry.link(&link_id).unwrap().state() == LinkState::Running {
            break;
        }
    }
    assert_eq!(h.control.registry.link(&link_id).unwrap().state(), LinkState::Running);

    let node = h.control.registry.node(&source).unwrap();
    assert!(node.peek_buffer(0, 0).is_some());
    assert!(node.peek_buffer(0, 1).is_none(), "ringbuffer allocation must produce exactly one buffer");

    let buffer = node.peek_buffer(0, 0).unwrap();
    let Some(Meta::Ringbuffer(rb)) = buffer.find_meta(MetaType::Ringbuffer) else {
        panic!("expected a ringbuffer meta on the shared buffer");
    };
    assert_eq!(rb.capacity, 4096);
    assert_eq!(rb.read_index(), 0);
    assert_eq!(rb.write_index(), 0);
}
