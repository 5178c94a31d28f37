// Layered parse graph construction — the core of the engine.
//
// Given a reference graph and an observation sequence, `build` grows a
// layered DAG of every interpretation the reference graph supports: each
// observation's matching nodes are stitched onto the previous frontier via
// all fewest-hop reference paths between the two observed values, with the
// original edge weights carried along. Positions advance uniformly because
// every retained path has the same node count (the global minimum across
// all matching node pairs), so one observation may span several positions
// when the stitch needs intermediate hops.
//
// The path sets are memoized per (previous value, next value). The memo key
// deliberately ignores which matching nodes are currently reachable: the
// matcher and the reference graph are fixed for the builder's lifetime (the
// reference is borrowed immutably), so the match sets — and therefore the
// cached path set — are a function of the value pair alone. The cache is a
// superset of what any frontier can need; reachability is filtered per
// step, after the memo lookup. For that reason the memo survives `clear`
// and is reused across rebuilds.
//
// With pruning enabled (the default), frontier nodes that acquired no
// successors are removed as soon as they die, walking predecessors with a
// worklist so long sequences cannot overflow the stack: a node is removed
// exactly when all of its out-edges funnel into removed nodes.
//
// Derived state — nodes per position, widths, segments — is computed on
// demand and cached until the next build or clear.
//
// See also: `segment.rs` for the partition rule, `align.rs` for selection.

use crate::error::{Error, Result};
use crate::graph::{all_shortest_paths, Digraph, EdgeKind, NodeId};
use crate::reference::ReferenceGraph;
use crate::segment::{segment_spans, Segment};
use crate::value::{Matcher, Value};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Identity of a parse-graph node. `State` positions start at 1; `Start`
/// sits at position 0 and `End` one past the last frontier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParseKey {
    Start,
    /// A reference node observed (or hopped through) at a layer position.
    State { position: usize, node: NodeId },
    End,
}

/// Tunables for one build. `mismatch_penalty` only has an effect with a
/// matcher coarser than equality; `max_segment_paths` bounds per-segment
/// path enumeration (see `segment.rs`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Extra weight added to every edge into an inexactly matched node.
    /// Must be non-negative; `build` rejects a negative penalty.
    pub mismatch_penalty: f64,
    /// Remove dead branches as soon as they stop being extendable.
    pub prune: bool,
    /// Ceiling on candidate paths per segment.
    pub max_segment_paths: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            mismatch_penalty: 0.0,
            prune: true,
            max_segment_paths: 10_000,
        }
    }
}

/// Lazily derived view of a built graph, dropped on rebuild.
#[derive(Debug)]
struct Derived {
    /// Parse node ids per position, in creation (= id) order.
    positions: Vec<Vec<NodeId>>,
    widths: Vec<usize>,
    segments: Vec<Segment>,
    /// Position -> index into `segments`.
    position_segment: Vec<usize>,
}

/// The per-sequence layered graph and its caches. One instance serves many
/// sequences against the same reference graph through build/clear cycles.
#[derive(Debug)]
pub struct ParseGraph<'g, V> {
    reference: &'g ReferenceGraph<V>,
    matcher: Matcher<V>,
    options: BuildOptions,
    graph: Digraph<ParseKey>,
    // Keyed by value pair, not node pair; see the module comment.
    memo: FxHashMap<(V, V), Vec<Vec<NodeId>>>,
    input_positions: Vec<usize>,
    end_position: usize,
    built: bool,
    derived: Option<Derived>,
}

impl<'g, V: Value> ParseGraph<'g, V> {
    pub fn new(reference: &'g ReferenceGraph<V>) -> Self {
        ParseGraph {
            reference,
            matcher: Matcher::Exact,
            options: BuildOptions::default(),
            graph: Digraph::new(),
            memo: FxHashMap::default(),
            input_positions: Vec::new(),
            end_position: 0,
            built: false,
            derived: None,
        }
    }

    /// Replace the matcher. Clears the memo: cached paths are only valid
    /// for the matcher they were computed under.
    pub fn with_matcher(mut self, matcher: Matcher<V>) -> Self {
        self.matcher = matcher;
        self.memo.clear();
        self
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn reference(&self) -> &'g ReferenceGraph<V> {
        self.reference
    }

    /// True after a successful `build`, until the next `clear`.
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Drop the built graph and every derived cache. The shortest-path memo
    /// is kept: it depends only on the reference graph and matcher, both
    /// fixed for this instance's lifetime.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.input_positions.clear();
        self.end_position = 0;
        self.built = false;
        self.derived = None;
    }

    /// Build the layered graph for `sequence`. All-or-nothing: on error the
    /// instance is left cleared, as if `build` had never been called.
    pub fn build(&mut self, sequence: &[V]) -> Result<()> {
        self.clear();
        if sequence.is_empty() {
            return Err(Error::Configuration(
                "cannot parse an empty sequence".to_string(),
            ));
        }
        if self.options.mismatch_penalty < 0.0 {
            return Err(Error::Configuration(
                "mismatch penalty must be non-negative".to_string(),
            ));
        }
        match self.try_build(sequence) {
            Ok(()) => {
                self.built = true;
                debug!(
                    observations = sequence.len(),
                    nodes = self.graph.node_count(),
                    edges = self.graph.edge_count(),
                    positions = self.end_position + 1,
                    "parse graph built"
                );
                Ok(())
            }
            Err(err) => {
                self.clear();
                Err(err)
            }
        }
    }

    fn try_build(&mut self, sequence: &[V]) -> Result<()> {
        let start = self.graph.insert_node(ParseKey::Start);
        let first = self.reference.matching_nodes(&self.matcher, &sequence[0]);
        if first.is_empty() {
            return Err(Error::NoMatch { index: 0 });
        }
        for &m in &first {
            let node = self.graph.insert_node(ParseKey::State { position: 1, node: m });
            self.graph.add_edge(start, node, 0.0, EdgeKind::Boundary);
        }

        let mut pos = 1usize;
        // Reference node ids currently extendable, ascending.
        let mut frontier = first;
        self.input_positions.push(1);

        for (step, pair) in sequence.windows(2).enumerate() {
            let index = step + 1;
            let retained: Vec<Vec<NodeId>> = self
                .value_pair_paths(&pair[0], &pair[1])
                .iter()
                .filter(|path| frontier.contains(&path[0]))
                .cloned()
                .collect();
            if retained.is_empty() {
                return Err(Error::NoPath { index });
            }
            debug_assert!(
                retained.windows(2).all(|w| w[0].len() == w[1].len()),
                "retained paths must share one length"
            );

            let advance = retained[0].len().saturating_sub(1).max(1);
            let mut next_frontier = Vec::new();
            for path in &retained {
                match self.stitch(pos, path)? {
                    Some(terminal) => next_frontier.push(terminal),
                    None => continue,
                }
            }
            if next_frontier.is_empty() {
                // Every retained path was a loopless single node.
                return Err(Error::NoPath { index });
            }

            if self.options.prune {
                for &prev in &frontier {
                    let key = ParseKey::State { position: pos, node: prev };
                    if let Some(id) = self.graph.id(&key) {
                        if self.graph.out_degree(id) == 0 {
                            self.prune_branch(id);
                        }
                    }
                }
            }

            next_frontier.sort_unstable();
            next_frontier.dedup();
            trace!(
                index,
                paths = retained.len(),
                advance,
                frontier = next_frontier.len(),
                "stitched observation"
            );
            frontier = next_frontier;
            pos += advance;
            self.input_positions.push(pos);
        }

        let end = self.graph.insert_node(ParseKey::End);
        for &node in &frontier {
            let key = ParseKey::State { position: pos, node };
            let Some(id) = self.graph.id(&key) else {
                return Err(Error::Validation(format!(
                    "frontier node {node:?} missing at position {pos}"
                )));
            };
            self.graph.add_edge(id, end, 0.0, EdgeKind::Boundary);
        }
        self.end_position = pos + 1;

        if self.options.mismatch_penalty > 0.0 {
            self.apply_mismatch_penalty(sequence);
        }
        Ok(())
    }

    /// Append one retained reference path starting at the frontier node
    /// `path[0]` (position `pos`). Returns the terminal reference node, or
    /// `None` for a single-node path whose node has no self-loop.
    ///
    /// A single-node path arises when both observed values match the same
    /// node (equal values, or a coarse matcher); it is treated as the
    /// self-loop traversal `[a, a]`, re-adding the node one position on.
    fn stitch(&mut self, pos: usize, path: &[NodeId]) -> Result<Option<NodeId>> {
        let (hops, terminal): (&[NodeId], NodeId) = match path {
            [] => return Ok(None),
            &[single] => {
                if self.reference.edge(single, single).is_none() {
                    return Ok(None);
                }
                (&path[..1], single)
            }
            [rest @ .., last] => {
                debug_assert!(!rest.is_empty());
                (&path[1..], *last)
            }
        };
        let mut prev_ref = path[0];
        let mut prev_parse = self
            .graph
            .insert_node(ParseKey::State { position: pos, node: prev_ref });
        for (i, &node) in hops.iter().enumerate() {
            let edge = self.reference.edge(prev_ref, node).copied().ok_or_else(|| {
                Error::Validation(format!(
                    "reference edge {prev_ref:?} -> {node:?} vanished mid-stitch"
                ))
            })?;
            let parse = self.graph.insert_node(ParseKey::State {
                position: pos + 1 + i,
                node,
            });
            self.graph.add_edge(prev_parse, parse, edge.weight, edge.kind);
            prev_ref = node;
            prev_parse = parse;
        }
        Ok(Some(terminal))
    }

    /// All fewest-hop reference paths between nodes matching `prev` and
    /// nodes matching `next`, filtered to the global minimum node count,
    /// memoized by the value pair. Unreachable node pairs contribute
    /// nothing; the cached set may be empty.
    fn value_pair_paths(&mut self, prev: &V, next: &V) -> &[Vec<NodeId>] {
        let key = (prev.clone(), next.clone());
        if !self.memo.contains_key(&key) {
            let sources = self.reference.matching_nodes(&self.matcher, prev);
            let targets = self.reference.matching_nodes(&self.matcher, next);
            let mut all = Vec::new();
            for &a in &sources {
                for &b in &targets {
                    all.extend(all_shortest_paths(self.reference.graph(), a, b));
                }
            }
            if let Some(min) = all.iter().map(Vec::len).min() {
                all.retain(|path| path.len() == min);
            }
            trace!(?prev, ?next, paths = all.len(), "memoized value pair");
            self.memo.insert(key.clone(), all);
        }
        &self.memo[&key]
    }

    /// Remove `dead` and, transitively, every predecessor whose out-degree
    /// drops to zero. Iterative: the predecessor chain can be as long as
    /// the sequence itself.
    fn prune_branch(&mut self, dead: NodeId) {
        let mut worklist = vec![dead];
        while let Some(id) = worklist.pop() {
            if !self.graph.is_live(id) || self.graph.out_degree(id) != 0 {
                continue;
            }
            // START stays: some branch always survives a successful step.
            if matches!(self.graph.key(id), ParseKey::Start) {
                continue;
            }
            let preds = self.graph.predecessors(id).to_vec();
            self.graph.remove_node(id);
            worklist.extend(preds);
        }
    }

    /// Add the mismatch penalty to every edge into an input-position node
    /// whose value is not exactly the observed one. Runs after construction
    /// so the penalty lands on all incoming edges at once.
    fn apply_mismatch_penalty(&mut self, sequence: &[V]) {
        let penalty = self.options.mismatch_penalty;
        let mut penalized = 0usize;
        for (i, &position) in self.input_positions.iter().enumerate() {
            let inexact: Vec<NodeId> = self
                .graph
                .node_ids()
                .filter(|&id| match self.graph.key(id) {
                    ParseKey::State { position: p, node } => {
                        *p == position && *self.reference.value(*node) != sequence[i]
                    }
                    _ => false,
                })
                .collect();
            for id in inexact {
                let preds = self.graph.predecessors(id).to_vec();
                for pred in preds {
                    self.graph.adjust_edge_weight(pred, id, penalty);
                    penalized += 1;
                }
            }
        }
        if penalized > 0 {
            debug!(edges = penalized, penalty, "applied mismatch penalty");
        }
    }

    /// The underlying layered digraph.
    pub fn graph(&self) -> &Digraph<ParseKey> {
        &self.graph
    }

    /// Position of the layer where observation `i` was matched.
    pub fn input_positions(&self) -> &[usize] {
        &self.input_positions
    }

    /// Position of the END node; the graph spans `0..=end_position()`.
    pub fn end_position(&self) -> usize {
        self.end_position
    }

    /// The reference node a parse node stands for; `None` for START/END.
    pub fn reference_node(&self, id: NodeId) -> Option<NodeId> {
        match self.graph.key(id) {
            ParseKey::State { node, .. } => Some(*node),
            _ => None,
        }
    }

    /// Widths (node counts) per position.
    pub fn widths(&mut self) -> Result<&[usize]> {
        Ok(&self.derived()?.widths)
    }

    /// Parse node ids per position, creation order.
    pub fn positions(&mut self) -> Result<&[Vec<NodeId>]> {
        Ok(&self.derived()?.positions)
    }

    /// The ranked segments covering the whole graph.
    pub fn segments(&mut self) -> Result<&[Segment]> {
        Ok(&self.derived()?.segments)
    }

    /// Index into `segments()` of the segment covering `position`.
    pub fn segment_index_at(&mut self, position: usize) -> Result<usize> {
        let derived = self.derived()?;
        derived
            .position_segment
            .get(position)
            .copied()
            .ok_or_else(|| {
                Error::Validation(format!("position {position} is outside the parse graph"))
            })
    }

    fn derived(&mut self) -> Result<&Derived> {
        if !self.built {
            return Err(Error::Validation(
                "parse graph has not been built".to_string(),
            ));
        }
        if self.derived.is_none() {
            let mut positions = vec![Vec::new(); self.end_position + 1];
            for id in self.graph.node_ids() {
                let position = match self.graph.key(id) {
                    ParseKey::Start => 0,
                    ParseKey::State { position, .. } => *position,
                    ParseKey::End => self.end_position,
                };
                positions[position].push(id);
            }
            let widths: Vec<usize> = positions.iter().map(Vec::len).collect();
            let spans = segment_spans(&widths);
            let mut segments = Vec::with_capacity(spans.len());
            let mut position_segment = vec![0usize; widths.len()];
            for (i, &(start, end)) in spans.iter().enumerate() {
                segments.push(Segment::between(
                    &self.graph,
                    &positions,
                    start,
                    end,
                    self.options.max_segment_paths,
                )?);
                for slot in &mut position_segment[start..=end] {
                    *slot = i;
                }
            }
            debug!(segments = segments.len(), "segmented parse graph");
            self.derived = Some(Derived {
                positions,
                widths,
                segments,
                position_segment,
            });
        }
        // Filled just above.
        match &self.derived {
            Some(derived) => Ok(derived),
            None => unreachable!(),
        }
    }
}
