// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Registry (component H, §6): the process-wide id → object map, and the
//! `port_links` index the control loop uses to notify a link when one of
//! its ports is destroyed.
//!
//! Concretizes the "observer registration" design note (§9): rather than
//! links holding weak tokens on ports and ports holding back-references to
//! links, the registry holds the one index that maps a `(node, port)` to
//! its link, and mediates the notification itself. Neither side needs to
//! know about the other directly.

use std::collections::HashMap;

use crate::link::{Link, LinkId, LinkState};
use crate::node::{NodeContract, NodeId};
use crate::port::{Direction, PortId};

/// Registry-level events emitted as nodes, ports, and links come and go
/// (§6 `added`, `info_changed`, `removed`, `link_state_changed`).
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    LinkAdded(LinkId),
    LinkStateChanged(LinkId, LinkState),
    LinkRemoved(LinkId),
}

/// Owns every node and link in the graph.
///
/// Nodes are boxed trait objects; ownership never leaves the registry, so
/// the control loop borrows nodes mutably for the duration of one
/// operation rather than cloning handles around.
#[derive(Default)]
pub struct Registry {
    nodes: HashMap<NodeId, Box<dyn NodeContract>>,
    links: HashMap<LinkId, Link>,
    port_links: HashMap<(NodeId, PortId), LinkId>,
    events: Vec<RegistryEvent>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Box<dyn NodeContract>) -> NodeId {
        let id = node.id().clone();
        tracing::info!(node = %id, "node added");
        self.nodes.insert(id.clone(), node);
        self.events.push(RegistryEvent::NodeAdded(id.clone()));
        id
    }

    pub fn node(&self, id: &str) -> Option<&dyn NodeContract> {
        self.nodes.get(id).map(|b| b.as_ref())
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut (dyn NodeContract + 'static)> {
        self.nodes.get_mut(id).map(|b| b.as_mut())
    }

    /// Remove a node, tearing down any link attached to one of its ports
    /// first (§4.4 destruction).
    pub fn remove_node(&mut self, id: &str) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        let mut link_ids = Vec::new();
        for dir in [Direction::Input, Direction::Output] {
            for port in node.ports(dir) {
                if let Some(link_id) = self.port_links.remove(&(id.to_string(), port)) {
                    link_ids.push(link_id);
                }
            }
        }
        for link_id in link_ids {
            self.teardown_link(&link_id, Some(id));
        }
        tracing::info!(node = %id, "node removed");
        self.events.push(RegistryEvent::NodeRemoved(id.to_string()));
    }

    pub fn add_link(&mut self, link: Link) -> LinkId {
        let id = link.id.clone();
        self.port_links
            .insert((link.output_node.clone(), link.output_port), id.clone());
        self.port_links
            .insert((link.input_node.clone(), link.input_port), id.clone());
        tracing::info!(link = %id, "link added");
        self.links.insert(id.clone(), link);
        self.events.push(RegistryEvent::LinkAdded(id.clone()));
        id
    }

    pub fn link(&self, id: &LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    pub fn link_for_port(&self, node: &str, port: PortId) -> Option<&LinkId> {
        self.port_links.get(&(node.to_string(), port))
    }

    /// Drive every live link's state machine one step, borrowing both of
    /// its endpoint nodes at once (§4.3 `check`, control loop driver).
    pub fn check_links(&mut self, pool: &crate::pool::BufferPool) {
        let ids: Vec<LinkId> = self.links.keys().cloned().collect();
        for id in ids {
            self.check_link(&id, pool);
        }
    }

    fn check_link(&mut self, id: &LinkId, pool: &crate::pool::BufferPool) {
        let Some(link) = self.links.get(id) else {
            return;
        };
        let (output_node, input_node) = (link.output_node.clone(), link.input_node.clone());
        if output_node == input_node {
            // Self-links cannot be borrowed twice mutably; not a
            // configuration the graph supports.
            return;
        }
        let before = link.state();

        let Some(mut output) = self.nodes.remove(&output_node) else {
            return;
        };
        let Some(mut input) = self.nodes.remove(&input_node) else {
            self.nodes.insert(output_node, output);
            return;
        };

        if let Some(link) = self.links.get_mut(id) {
            link.check(output.as_mut(), input.as_mut(), pool);
        }

        self.nodes.insert(output_node, output);
        self.nodes.insert(input_node, input);

        if let Some(link) = self.links.get(id) {
            if link.state() != before {
                self.events
                    .push(RegistryEvent::LinkStateChanged(id.clone(), link.state()));
            }
        }
    }

    /// Borrow a link's two endpoint nodes mutably at once, for the duration
    /// of `f`. Returns `None` if the link, either endpoint, or a self-link
    /// configuration makes that impossible (§5 ownership: a node is only
    /// ever borrowed by one loop step at a time).
    pub fn with_link_endpoints<R>(
        &mut self,
        id: &LinkId,
        f: impl FnOnce(&mut dyn NodeContract, &mut dyn NodeContract) -> R,
    ) -> Option<R> {
        let link = self.links.get(id)?;
        let (output_node, input_node) = (link.output_node.clone(), link.input_node.clone());
        if output_node == input_node {
            return None;
        }
        let mut output = self.nodes.remove(&output_node)?;
        let mut input = match self.nodes.remove(&input_node) {
            Some(n) => n,
            None => {
                self.nodes.insert(output_node, output);
                return None;
            }
        };
        let result = f(output.as_mut(), input.as_mut());
        self.nodes.insert(output_node, output);
        self.nodes.insert(input_node, input);
        Some(result)
    }

    /// Ids of links currently in `state`, snapshotted (§5: the data loop
    /// iterates running links each tick without holding a registry borrow
    /// across node calls).
    pub fn link_ids_in_state(&self, state: LinkState) -> Vec<LinkId> {
        self.links
            .iter()
            .filter(|(_, l)| l.state() == state)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn remove_link(&mut self, id: &LinkId) {
        self.teardown_link(id, None);
    }

    /// Tear down a link: detach it from whichever endpoint node wasn't the
    /// one already being removed (`skip_node`, when called from
    /// [`Registry::remove_node`]), release its pool region, and drop it.
    fn teardown_link(&mut self, id: &LinkId, skip_node: Option<&str>) {
        let Some(mut link) = self.links.remove(id) else {
            return;
        };
        self.port_links.retain(|_, v| v != id);

        if skip_node != Some(link.output_node.as_str()) {
            if let Some(node) = self.nodes.get_mut(&link.output_node) {
                node.link_detached(link.output_port);
            }
        }
        if skip_node != Some(link.input_node.as_str()) {
            if let Some(node) = self.nodes.get_mut(&link.input_node) {
                node.link_detached(link.input_port);
            }
        }

        link.mark_unlinked();
        tracing::info!(link = %id, "link removed");
        self.events.push(RegistryEvent::LinkRemoved(id.clone()));
    }

    pub fn take_events(&mut self) -> Vec<RegistryEvent> {
        std::mem::take(&mut self.events)
    }
}
