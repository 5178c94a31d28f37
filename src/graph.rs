// Generic weighted directed graph.
//
// Both graph flavors in this crate are instantiations of `Digraph`: the
// reference graph keys nodes by (group index, value), the parse graph by
// (position, reference node). Nodes live in a `Vec` addressed by dense
// `NodeId`s assigned in insertion order; a hash index maps keys back to
// ids. Removal marks a slot dead and unlinks it from both adjacency sides,
// so surviving ids stay stable. Every iteration order here follows
// insertion order — downstream path enumeration and tie-breaking depend on
// that being reproducible.
//
// `all_shortest_paths` enumerates every fewest-hop path between two nodes;
// the parse builder stitches those into its layered graph (see `parse.rs`).
//
// See also: `reference.rs` and `parse.rs` for the two instantiations.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::hash::Hash;

/// Dense node handle. Ids are scoped to the graph that issued them and are
/// never reused, even after removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where an edge came from. Reference edges are step/loop/bridge (group
/// construction), mutation (rule tables), or manual (added by name); parse
/// graphs copy the originating kind onto stitched edges and use `Boundary`
/// for the zero-weight START/END connectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    /// Adjacent ranks within a group.
    Step,
    /// Self-loop; traversed by repeated observations.
    Loop,
    /// The optional override between a group's last two ranks.
    Bridge,
    /// Cross-group edge derived from a mutation rule.
    Mutation,
    /// Explicit override added by display name.
    Manual,
    /// START/END connector in a parse graph.
    Boundary,
}

/// A directed edge. Weights are non-negative.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub to: NodeId,
    pub weight: f64,
    pub kind: EdgeKind,
}

#[derive(Clone, Debug)]
struct Slot<K> {
    key: K,
    alive: bool,
    out: SmallVec<[Edge; 4]>,
    preds: SmallVec<[NodeId; 4]>,
}

/// Weighted digraph with interned keys and stable dense ids.
#[derive(Clone, Debug)]
pub struct Digraph<K> {
    slots: Vec<Slot<K>>,
    index: FxHashMap<K, NodeId>,
    live_nodes: usize,
    live_edges: usize,
}

impl<K> Default for Digraph<K> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: FxHashMap::default(),
            live_nodes: 0,
            live_edges: 0,
        }
    }
}

impl<K: Clone + Eq + Hash> Digraph<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `key`, returning the existing id if it is already present.
    pub fn insert_node(&mut self, key: K) -> NodeId {
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = NodeId(self.slots.len() as u32);
        self.index.insert(key.clone(), id);
        self.slots.push(Slot {
            key,
            alive: true,
            out: SmallVec::new(),
            preds: SmallVec::new(),
        });
        self.live_nodes += 1;
        id
    }

    /// Look up the id of a live node by key.
    pub fn id(&self, key: &K) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// The key a node was interned under. The id must be live.
    pub fn key(&self, id: NodeId) -> &K {
        debug_assert!(self.slots[id.index()].alive);
        &self.slots[id.index()].key
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.slots
            .get(id.index())
            .is_some_and(|slot| slot.alive)
    }

    /// Insert or update the edge `from -> to`. A second insertion for the
    /// same node pair overwrites the weight and kind rather than creating a
    /// parallel edge.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, weight: f64, kind: EdgeKind) {
        debug_assert!(self.is_live(from) && self.is_live(to));
        debug_assert!(weight >= 0.0, "edge weights are non-negative");
        if let Some(edge) = self.slots[from.index()]
            .out
            .iter_mut()
            .find(|e| e.to == to)
        {
            edge.weight = weight;
            edge.kind = kind;
            return;
        }
        self.slots[from.index()].out.push(Edge { to, weight, kind });
        self.slots[to.index()].preds.push(from);
        self.live_edges += 1;
    }

    /// The edge `from -> to`, if present.
    pub fn edge(&self, from: NodeId, to: NodeId) -> Option<&Edge> {
        self.slots[from.index()].out.iter().find(|e| e.to == to)
    }

    pub fn edge_weight(&self, from: NodeId, to: NodeId) -> Option<f64> {
        self.edge(from, to).map(|e| e.weight)
    }

    /// Add `delta` to an existing edge's weight. Returns false if the edge
    /// does not exist.
    pub fn adjust_edge_weight(&mut self, from: NodeId, to: NodeId, delta: f64) -> bool {
        match self.slots[from.index()]
            .out
            .iter_mut()
            .find(|e| e.to == to)
        {
            Some(edge) => {
                edge.weight += delta;
                true
            }
            None => false,
        }
    }

    /// Outgoing edges of a node, in insertion order.
    pub fn out_edges(&self, id: NodeId) -> &[Edge] {
        &self.slots[id.index()].out
    }

    pub fn out_degree(&self, id: NodeId) -> usize {
        self.slots[id.index()].out.len()
    }

    /// Nodes with an edge into `id`, in insertion order.
    pub fn predecessors(&self, id: NodeId) -> &[NodeId] {
        &self.slots[id.index()].preds
    }

    /// Remove a node and unlink every edge touching it. Ids of other nodes
    /// are unaffected; removing an already-dead id is a no-op.
    pub fn remove_node(&mut self, id: NodeId) {
        let Some(slot) = self.slots.get_mut(id.index()) else {
            return;
        };
        if !slot.alive {
            return;
        }
        slot.alive = false;
        let key = slot.key.clone();
        let out = std::mem::take(&mut slot.out);
        let preds = std::mem::take(&mut slot.preds);
        self.index.remove(&key);
        self.live_edges -= out.len();
        for edge in &out {
            if edge.to != id {
                self.slots[edge.to.index()].preds.retain(|p| *p != id);
            }
        }
        for &pred in &preds {
            if pred != id {
                let before = self.slots[pred.index()].out.len();
                self.slots[pred.index()].out.retain(|e| e.to != id);
                self.live_edges -= before - self.slots[pred.index()].out.len();
            }
        }
        self.live_nodes -= 1;
    }

    /// Live node ids in ascending (insertion) order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive)
            .map(|(i, _)| NodeId(i as u32))
    }

    pub fn node_count(&self) -> usize {
        self.live_nodes
    }

    pub fn edge_count(&self) -> usize {
        self.live_edges
    }

    pub fn is_empty(&self) -> bool {
        self.live_nodes == 0
    }

    /// Total slots ever allocated, live or dead. Upper bound for id-indexed
    /// scratch arrays.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Drop every node and edge, keeping allocations where possible.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.live_nodes = 0;
        self.live_edges = 0;
    }
}

/// Every fewest-hop path `source -> target`, each inclusive of both ends.
///
/// Edge weights play no role here: "shortest" is hop count, matching how the
/// parse builder keeps its layering uniform (see `parse.rs`); weights ride
/// along on the stitched edges and are optimized later, at ranking. Returns
/// `[[source]]` when `source == target` and an empty set when `target` is
/// unreachable. Output order is deterministic: depth-first over parent
/// lists sorted by id.
pub fn all_shortest_paths<K: Clone + Eq + Hash>(
    graph: &Digraph<K>,
    source: NodeId,
    target: NodeId,
) -> Vec<Vec<NodeId>> {
    if !graph.is_live(source) || !graph.is_live(target) {
        return Vec::new();
    }
    if source == target {
        return vec![vec![source]];
    }

    // BFS level by level, collecting every geodesic predecessor.
    let unseen = u32::MAX;
    let mut dist = vec![unseen; graph.capacity()];
    let mut parents: Vec<SmallVec<[NodeId; 2]>> = vec![SmallVec::new(); graph.capacity()];
    let mut queue = VecDeque::new();
    dist[source.index()] = 0;
    queue.push_back(source);
    let mut target_dist = unseen;

    while let Some(node) = queue.pop_front() {
        let d = dist[node.index()];
        if d + 1 > target_dist {
            break;
        }
        for edge in graph.out_edges(node) {
            let next = edge.to;
            let nd = d + 1;
            if dist[next.index()] == unseen {
                dist[next.index()] = nd;
                parents[next.index()].push(node);
                if next == target {
                    target_dist = nd;
                } else {
                    queue.push_back(next);
                }
            } else if dist[next.index()] == nd {
                parents[next.index()].push(node);
            }
        }
    }

    if dist[target.index()] == unseen {
        return Vec::new();
    }
    for list in &mut parents {
        list.sort_unstable();
    }

    let mut paths = Vec::new();
    let mut trail = vec![target];
    collect_paths(source, target, &parents, &mut trail, &mut paths);
    paths
}

/// Walk the geodesic-parent DAG from `node` back to `source`, emitting each
/// completed trail in forward order. Depth is bounded by the geodesic
/// length, so recursion is safe here.
fn collect_paths(
    source: NodeId,
    node: NodeId,
    parents: &[SmallVec<[NodeId; 2]>],
    trail: &mut Vec<NodeId>,
    paths: &mut Vec<Vec<NodeId>>,
) {
    if node == source {
        let mut path = trail.clone();
        path.reverse();
        paths.push(path);
        return;
    }
    for &parent in &parents[node.index()] {
        trail.push(parent);
        collect_paths(source, parent, parents, trail, paths);
        trail.pop();
    }
}
