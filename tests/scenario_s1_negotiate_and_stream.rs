// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! S1: a source and sink with no filter negotiate, allocate, and stream;
//! header `seq` counts up from zero and `bpf == 2*channels`.

mod common;

use mediagraphd::link::LinkState;
use mediagraphd::nodes::{TestSink, TestSource};
use mediagraphd::port::SampleFormat;

use common::Harness;

#[test]
fn source_and_sink_negotiate_and_stream() {
    let mut h = Harness::new();

    let source = h.add_node(Box::new(TestSource::new("source", [44100])));
    let sink = h.add_node(Box::new(TestSink::new("sink", [44100])));
    h.link(source.clone(), 0, sink.clone(), 0, None);

    for _ in 0..8 {
        h.tick();
        let link_id = h.control.registry.link_for_port(&source, 0).cloned();
        if let Some(id) = link_id {
            if h.control.registry.link(&id).unwrap().state() == LinkState::Running {
                break;
            }
        }
    }

    let link_id = h.control.registry.link_for_port(&source, 0).cloned().unwrap();
    assert_eq!(h.control.registry.link(&link_id).unwrap().state(), LinkState::Running);

    let format = h.control.registry.node(&source).unwrap().get_format(0).unwrap();
    let audio = format.as_audio().unwrap();
    assert_eq!(audio.bytes_per_frame(), audio.channels as u32 * SampleFormat::S16.bytes_per_sample());

    let read_seq = |h: &Harness| -> u64 {
        let node = h.control.registry.node(&source).unwrap();
        let buffer_id = node.current_output_buffer(0).unwrap();
        node.peek_buffer(0, buffer_id).unwrap().header().unwrap().seq
    };

    // The tick that drove the link to `Running` already produced buffer 0.
    let mut seqs = vec![read_seq(&h)];
    for _ in 0..9 {
        h.tick();
        seqs.push(read_seq(&h));
    }
    assert_eq!(seqs, (0u64..10).collect::<Vec<_>>());

    assert!(h.control.registry.node(&sink).unwrap().get_format(0).is_some());
}
