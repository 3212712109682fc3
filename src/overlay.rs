//! Overlay channel table and graph maintenance.
//!
//! [`ChannelTable`] and [`ChannelGraph`] key everything by [`NodeId`] rather
//! than holding references to channels or to each other, resolving the
//! cyclic dependency by making [`crate::node::Node`] the only thing that
//! ever looks a `NodeId` up in more than one of these structures at once.

use crate::channel::{ChannelState, NodeId};
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelTableEntry {
    pub peer: NodeId,
    pub status: ChannelState,
    /// Logical tick (not wall-clock time) at which this entry was last used.
    pub last_used_tick: u64,
}

/// Per-peer channel bookkeeping: status, last-used tick. The invariant is
/// that every `active` entry's referenced KeyChannel is itself active —
/// [`crate::node::Node`] is responsible for keeping the two in sync since
/// this table holds no channel reference at all.
#[derive(Default)]
pub struct ChannelTable {
    entries: HashMap<u64, ChannelTableEntry>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_channel(&mut self, peer: NodeId, tick: u64) {
        self.entries.insert(
            peer.value(),
            ChannelTableEntry {
                peer,
                status: ChannelState::Active,
                last_used_tick: tick,
            },
        );
    }

    pub fn close_channel(&mut self, peer: NodeId) {
        if let Some(entry) = self.entries.get_mut(&peer.value()) {
            entry.status = ChannelState::Closed;
        }
    }

    pub fn touch(&mut self, peer: NodeId, tick: u64) {
        if let Some(entry) = self.entries.get_mut(&peer.value()) {
            entry.last_used_tick = tick;
        }
    }

    pub fn entry(&self, peer: NodeId) -> Option<&ChannelTableEntry> {
        self.entries.get(&peer.value())
    }

    pub fn entries(&self) -> impl Iterator<Item = &ChannelTableEntry> {
        self.entries.values()
    }

    pub fn active_peers(&self) -> Vec<NodeId> {
        self.entries
            .values()
            .filter(|e| e.status == ChannelState::Active)
            .map(|e| e.peer)
            .collect()
    }
}

/// An undirected, node-id-keyed adjacency view of the overlay, assembled
/// from gossip over channels. No specific gossip protocol is mandated: this
/// crate exposes the graph structure and leaves edge propagation to the
/// caller via [`ChannelGraph::add_edge`].
#[derive(Default, Clone)]
pub struct ChannelGraph {
    adjacency: HashMap<u64, HashMap<u64, f64>>,
}

impl ChannelGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, a: NodeId, b: NodeId, weight: f64) {
        self.adjacency.entry(a.value()).or_default().insert(b.value(), weight);
        self.adjacency.entry(b.value()).or_default().insert(a.value(), weight);
    }

    pub fn remove_edge(&mut self, a: NodeId, b: NodeId) {
        if let Some(row) = self.adjacency.get_mut(&a.value()) {
            row.remove(&b.value());
        }
        if let Some(row) = self.adjacency.get_mut(&b.value()) {
            row.remove(&a.value());
        }
    }

    pub fn neighbors(&self, node: NodeId) -> Vec<NodeId> {
        self.adjacency
            .get(&node.value())
            .map(|row| row.keys().map(|&v| liun_field::FieldElement::new(v)).collect())
            .unwrap_or_default()
    }

    pub fn edge_weight(&self, a: NodeId, b: NodeId) -> Option<f64> {
        self.adjacency.get(&a.value()).and_then(|row| row.get(&b.value())).copied()
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.adjacency.keys().map(|&v| liun_field::FieldElement::new(v)).collect()
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.adjacency.get(&node.value()).map(|row| row.len()).unwrap_or(0)
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(|row| row.len()).sum::<usize>() / 2
    }

    /// An immutable snapshot so trust computation never observes graph
    /// mutations in progress. A plain clone suffices since adjacency is flat
    /// owned data, not shared references.
    pub fn snapshot(&self) -> ChannelGraph {
        self.clone()
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("need at least {min} mutual contacts, found {found}")]
pub struct InsufficientMutualContacts {
    pub found: usize,
    pub min: usize,
}

/// Returns peers in the intersection of `self_id`'s and `target`'s
/// neighborhoods, sorted by descending channel age (oldest-opened first, per
/// `table`'s `last_used_tick` as the age proxy — an older last-use tick
/// means the channel was not recently renegotiated, i.e. it's been stable
/// longer).
pub fn find_mutual_contacts(
    graph: &ChannelGraph,
    table: &ChannelTable,
    self_id: NodeId,
    target: NodeId,
    min_count: usize,
) -> Result<Vec<NodeId>, InsufficientMutualContacts> {
    let self_neighbors: HashSet<u64> = graph.neighbors(self_id).into_iter().map(|n| n.value()).collect();
    let target_neighbors: HashSet<u64> = graph.neighbors(target).into_iter().map(|n| n.value()).collect();

    let mut mutual: Vec<NodeId> = self_neighbors
        .intersection(&target_neighbors)
        .map(|&v| liun_field::FieldElement::new(v))
        .collect();

    mutual.sort_by_key(|&peer| table.entry(peer).map(|e| e.last_used_tick).unwrap_or(u64::MAX));

    if mutual.len() < min_count {
        return Err(InsufficientMutualContacts {
            found: mutual.len(),
            min: min_count,
        });
    }
    Ok(mutual)
}

/// The per-peer minimum degree target: `⌈log2(n)⌉ + 1` for a
/// general overlay, or `⌈2n/3⌉` for a DKG-dense overlay that needs the
/// connectivity DKG cross-verification relies on.
pub fn target_degree(n: usize, dkg_dense: bool) -> usize {
    if n <= 1 {
        return 0;
    }
    if dkg_dense {
        (2 * n + 2) / 3
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as usize + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphHealth {
    pub disconnected: bool,
    pub below_target_degree: Vec<NodeId>,
    pub edges_removed_since_last_check: usize,
}

/// Tracks edge-count deltas across checks to report churn, and recomputes
/// connectivity/degree health on demand.
pub struct GraphMonitor {
    last_edge_count: usize,
}

impl GraphMonitor {
    pub fn new() -> Self {
        GraphMonitor { last_edge_count: 0 }
    }

    pub fn check(&mut self, graph: &ChannelGraph, dkg_dense: bool) -> GraphHealth {
        let snapshot = graph.snapshot();
        let nodes = snapshot.nodes();
        let n = nodes.len();
        let target = target_degree(n, dkg_dense);

        let below_target_degree: Vec<NodeId> = nodes.iter().copied().filter(|&node| snapshot.degree(node) < target).collect();

        let disconnected = !is_connected(&snapshot, &nodes);

        let current_edge_count = snapshot.edge_count();
        let edges_removed_since_last_check = self.last_edge_count.saturating_sub(current_edge_count);
        self.last_edge_count = current_edge_count;

        GraphHealth {
            disconnected,
            below_target_degree,
            edges_removed_since_last_check,
        }
    }
}

impl Default for GraphMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// A single gossiped edge fact, as carried by the `GOSSIP_EDGE` wire message.
/// `origin` is the node that directly observed the edge (one of its own
/// endpoints), so a receiver can tell firsthand reports from relayed ones if
/// it ever wants to weight them differently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GossipEdge {
    pub origin: NodeId,
    pub a: NodeId,
    pub b: NodeId,
    pub weight: f64,
}

/// Binds [`ChannelTable`], [`ChannelGraph`], and [`GraphMonitor`] into a
/// single component, plus the thin `open_channel` / `close_channel`
/// wrappers over [`crate::channel::KeyChannel`] and a minimal epidemic
/// gossip ingestion for `ChannelGraph` edges — a deliberately small push
/// model, not a claim to production anti-entropy.
pub struct Overlay {
    table: ChannelTable,
    graph: ChannelGraph,
    monitor: GraphMonitor,
    self_id: NodeId,
}

impl Overlay {
    pub fn new(self_id: NodeId) -> Self {
        Overlay {
            table: ChannelTable::new(),
            graph: ChannelGraph::new(),
            monitor: GraphMonitor::new(),
            self_id,
        }
    }

    pub fn table(&self) -> &ChannelTable {
        &self.table
    }

    pub fn graph(&self) -> &ChannelGraph {
        &self.graph
    }

    /// Records a freshly opened channel to `peer` in both the table and the
    /// local edge of the graph.
    pub fn open_channel(&mut self, peer: NodeId, tick: u64) {
        self.table.open_channel(peer, tick);
        self.graph.add_edge(self.self_id, peer, 1.0);
    }

    /// Closes the channel to `peer` in the table and drops the local edge
    /// from the graph; the peer's own edges (learned via gossip) are left
    /// untouched until gossip reports their removal too.
    pub fn close_channel(&mut self, peer: NodeId) {
        self.table.close_channel(peer);
        self.graph.remove_edge(self.self_id, peer);
    }

    pub fn find_mutual_contacts(&self, target: NodeId, min_count: usize) -> Result<Vec<NodeId>, InsufficientMutualContacts> {
        find_mutual_contacts(&self.graph, &self.table, self.self_id, target, min_count)
    }

    pub fn check_health(&mut self, dkg_dense: bool) -> GraphHealth {
        self.monitor.check(&self.graph, dkg_dense)
    }

    /// Emits a gossip fact about one of this node's own edges, for a caller
    /// to push out over channels (transport itself is out of scope here).
    pub fn gossip_edge(&self, peer: NodeId) -> Option<GossipEdge> {
        self.graph.edge_weight(self.self_id, peer).map(|weight| GossipEdge {
            origin: self.self_id,
            a: self.self_id,
            b: peer,
            weight,
        })
    }

    /// Ingests a gossiped edge fact about two (possibly distant) peers; this
    /// graph only mirrors facts about external peers, weakly and view-only.
    /// Never overwrites this node's own direct edges, which are
    /// authoritative locally.
    pub fn ingest_gossip(&mut self, edge: GossipEdge) {
        if (edge.a == self.self_id || edge.b == self.self_id) && edge.origin != self.self_id {
            // A peer reporting on an edge touching us; trust our own
            // local view over a relayed report of it.
            return;
        }
        self.graph.add_edge(edge.a, edge.b, edge.weight);
    }
}

fn is_connected(graph: &ChannelGraph, nodes: &[NodeId]) -> bool {
    let Some(&start) = nodes.first() else {
        return true;
    };
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(start);
    visited.insert(start.value());
    while let Some(node) = queue.pop_front() {
        for neighbor in graph.neighbors(node) {
            if visited.insert(neighbor.value()) {
                queue.push_back(neighbor);
            }
        }
    }
    visited.len() == nodes.len()
}
