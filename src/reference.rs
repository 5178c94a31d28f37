// Reference graph assembly.
//
// The reference graph is the static matching target: every registered
// group's nodes, keyed by (group index, value), plus the edges that group
// construction implies (step/loop/bridge), mutation edges derived from a
// rule table, and manual overrides added by display name. Assembly is the
// only phase that mutates it — the parse builder borrows it immutably for
// its whole lifetime, so the borrow checker enforces the "immutable once
// assembled" contract and the parse-side memo can never go stale.
//
// Node attributes (degree, display name, rank stem) live in a side table
// indexed by `NodeId`, parallel to the graph's slots. Groups are kept in a
// `BTreeMap` so every assembly pass iterates them in index order.
//
// See also: `group.rs` for what a group is, `rules.rs` for the mutation
// table shape, `parse.rs` for the consumer.

use crate::error::{Error, Result};
use crate::graph::{Digraph, Edge, EdgeKind, NodeId};
use crate::group::Group;
use crate::rules::{Direction, MutationRules};
use crate::value::{Matcher, Value};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use tracing::debug;

/// Attributes of one reference node, stored beside the graph slot.
#[derive(Clone, Debug)]
struct NodeAttrs {
    degree: usize,
    name: String,
    stem: String,
}

/// Borrowed view of everything known about one reference node. This is the
/// record formatters receive (see `output.rs`).
#[derive(Clone, Copy, Debug)]
pub struct NodeContext<'a, V> {
    /// 1-based rank within the node's group.
    pub degree: usize,
    /// Display name, `{stem}{group_index}`.
    pub name: &'a str,
    /// The rank stem alone.
    pub stem: &'a str,
    pub group_index: i32,
    pub group_kind: &'a str,
    pub value: &'a V,
}

/// The assembled union of groups, mutation edges, and manual overrides.
#[derive(Debug, Default)]
pub struct ReferenceGraph<V> {
    graph: Digraph<(i32, V)>,
    attrs: Vec<NodeAttrs>,
    groups: BTreeMap<i32, Group<V>>,
    // Lazily built display-name index; dropped whenever a group is added.
    names: Option<FxHashMap<String, NodeId>>,
}

impl<V: Value> ReferenceGraph<V> {
    pub fn new() -> Self {
        ReferenceGraph {
            graph: Digraph::new(),
            attrs: Vec::new(),
            groups: BTreeMap::new(),
            names: None,
        }
    }

    /// Register a group: intern its nodes and materialize its step, loop,
    /// and (when enabled) bridge edges. Rejects a duplicate group index.
    pub fn add_group(&mut self, group: Group<V>) -> Result<()> {
        if self.groups.contains_key(&group.index()) {
            return Err(Error::Configuration(format!(
                "group {} is already registered",
                group.index()
            )));
        }
        let index = group.index();
        let weights = group.weights();
        let mut ids = Vec::with_capacity(group.len());
        for (rank, (value, stem)) in group.values().iter().zip(group.stems()).enumerate() {
            let id = self.graph.insert_node((index, value.clone()));
            debug_assert_eq!(id.0 as usize, self.attrs.len());
            self.attrs.push(NodeAttrs {
                degree: rank + 1,
                name: format!("{stem}{index}"),
                stem: stem.clone(),
            });
            ids.push(id);
        }
        for (i, pair) in ids.windows(2).enumerate() {
            // The bridge overrides the step edge between the last two ranks.
            let last_pair = i + 2 == ids.len();
            let (weight, kind) = if weights.bridge_enabled && last_pair {
                (weights.bridge, EdgeKind::Bridge)
            } else {
                (weights.step, EdgeKind::Step)
            };
            self.graph.add_edge(pair[0], pair[1], weight, kind);
            self.graph.add_edge(pair[1], pair[0], weight, kind);
        }
        for &id in &ids {
            self.graph.add_edge(id, id, weights.self_loop, EdgeKind::Loop);
        }
        debug!(
            group = index,
            kind = group.kind(),
            nodes = ids.len(),
            "registered group"
        );
        self.groups.insert(index, group);
        self.names = None;
        Ok(())
    }

    /// Apply a mutation rule table to every ordered pair of distinct groups
    /// whose value sets overlap. Direction is `Up` when the target group's
    /// index is higher than the source's. Moves without a weight use
    /// `default_weight`; a rank outside its group is a configuration error.
    pub fn add_mutation_rules(&mut self, rules: &MutationRules, default_weight: f64) -> Result<()> {
        if default_weight < 0.0 {
            return Err(Error::Configuration(
                "mutation default weight must be non-negative".to_string(),
            ));
        }
        let mut added = 0usize;
        let indices: Vec<i32> = self.groups.keys().copied().collect();
        for &source_index in &indices {
            for &target_index in &indices {
                if source_index == target_index {
                    continue;
                }
                let source = &self.groups[&source_index];
                let target = &self.groups[&target_index];
                if !source.overlaps(target) {
                    continue;
                }
                let direction = if target_index > source_index {
                    Direction::Up
                } else {
                    Direction::Down
                };
                for mv in rules.moves(source.kind(), direction, target.kind()) {
                    let from = self.rank_node(source, mv.source_rank)?;
                    let to = self.rank_node(target, mv.target_rank)?;
                    let weight = mv.weight.unwrap_or(default_weight);
                    if weight < 0.0 {
                        return Err(Error::Configuration(format!(
                            "mutation move ({}, {}) has a negative weight",
                            mv.source_rank, mv.target_rank
                        )));
                    }
                    self.graph.add_edge(from, to, weight, EdgeKind::Mutation);
                    added += 1;
                }
            }
        }
        debug!(edges = added, "applied mutation rules");
        Ok(())
    }

    /// Add one explicit override edge, addressing nodes by display name.
    pub fn add_edge_by_name(&mut self, source: &str, target: &str, weight: f64) -> Result<()> {
        if weight < 0.0 {
            return Err(Error::Configuration(format!(
                "edge {source} -> {target} has a negative weight"
            )));
        }
        let from = self.node_by_name(source)?;
        let to = self.node_by_name(target)?;
        self.graph.add_edge(from, to, weight, EdgeKind::Manual);
        Ok(())
    }

    /// Add several override edges sharing one weight.
    pub fn add_edges_by_name(&mut self, pairs: &[(&str, &str)], weight: f64) -> Result<()> {
        for &(source, target) in pairs {
            self.add_edge_by_name(source, target, weight)?;
        }
        Ok(())
    }

    fn rank_node(&self, group: &Group<V>, rank: usize) -> Result<NodeId> {
        let value = group.values().get(rank.wrapping_sub(1)).ok_or_else(|| {
            Error::Configuration(format!(
                "rank {rank} is out of range for group {} ({} ranks)",
                group.index(),
                group.len()
            ))
        })?;
        // Registration interned every group value, so the lookup holds.
        Ok(self
            .graph
            .id(&(group.index(), value.clone()))
            .unwrap_or_else(|| unreachable!("registered group value not interned")))
    }

    fn node_by_name(&mut self, name: &str) -> Result<NodeId> {
        if self.names.is_none() {
            let mut built = FxHashMap::default();
            for id in self.graph.node_ids() {
                built.insert(self.attrs[id.0 as usize].name.clone(), id);
            }
            self.names = Some(built);
        }
        // Filled just above.
        let index = match &self.names {
            Some(index) => index,
            None => unreachable!(),
        };
        index
            .get(name)
            .copied()
            .ok_or_else(|| Error::Configuration(format!("no node is named {name:?}")))
    }

    /// All node ids whose value may stand in for `observed` under `matcher`,
    /// in ascending id order.
    pub fn matching_nodes(&self, matcher: &Matcher<V>, observed: &V) -> Vec<NodeId> {
        self.graph
            .node_ids()
            .filter(|&id| matcher.matches(&self.graph.key(id).1, observed))
            .collect()
    }

    /// The value a node carries.
    pub fn value(&self, id: NodeId) -> &V {
        &self.graph.key(id).1
    }

    /// The full attribute view of a node.
    pub fn context(&self, id: NodeId) -> NodeContext<'_, V> {
        let (group_index, value) = self.graph.key(id);
        let attrs = &self.attrs[id.0 as usize];
        let kind = self.groups[group_index].kind();
        NodeContext {
            degree: attrs.degree,
            name: &attrs.name,
            stem: &attrs.stem,
            group_index: *group_index,
            group_kind: kind,
            value,
        }
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.attrs[id.0 as usize].name
    }

    pub fn group(&self, index: i32) -> Option<&Group<V>> {
        self.groups.get(&index)
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group<V>> {
        self.groups.values()
    }

    /// The underlying digraph, for search and stitching.
    pub fn graph(&self) -> &Digraph<(i32, V)> {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// The edge between two reference nodes, if any.
    pub fn edge(&self, from: NodeId, to: NodeId) -> Option<&Edge> {
        self.graph.edge(from, to)
    }
}
