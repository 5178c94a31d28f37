// Segmentation and per-segment path ranking.
//
// A built parse graph is partitioned into segments: maximal position ranges
// bounded by unambiguous (width-1) positions. Inside a segment every simple
// path between the two boundary nodes is a candidate reading; the paths are
// weighed and ranked, and selection picks one rank per segment.
//
// The partition rule is exact and a little subtle: scan for the first
// position whose width deviates from 1, back up two positions, then scan
// for the first "repeat" (two consecutive width-1 positions). The segment
// closes at the repeat's first position. Neither scan ever examines the
// last position of the remaining suffix, so a trailing deviation folds into
// the final segment. `segment_spans` reproduces this rule verbatim.
//
// Path enumeration is an iterative DFS. Parse-graph edges always advance
// the position by one, so the walk needs no cycle check and can never leave
// the segment: reaching the segment's end position means reaching its
// unique boundary node. Ties in total weight keep enumeration order, which
// is lexicographic by node id because successors are visited in id order.
//
// See also: `parse.rs`, which computes widths and owns the segment cache.

use crate::error::{Error, Result};
use crate::graph::{Digraph, Edge, NodeId};
use smallvec::SmallVec;
use std::hash::Hash;
use tracing::trace;

/// One candidate reading of a segment: the nodes from boundary to boundary
/// and their total edge weight.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentPath {
    pub nodes: Vec<NodeId>,
    pub weight: f64,
}

/// A contiguous position range with width-1 boundaries and its ranked
/// candidate paths (rank 0 = minimum weight; equal weights tie-break
/// lexicographically by node-id sequence).
#[derive(Clone, Debug)]
pub struct Segment {
    start: usize,
    end: usize,
    paths: Vec<SegmentPath>,
}

impl Segment {
    /// Enumerate and rank the paths between the unique nodes at `start` and
    /// `end`. `positions` maps each position to its nodes. A boundary with
    /// width ≠ 1 and a path count beyond `max_paths` are both validation
    /// errors: the first is an internal invariant breach, the second the
    /// guard against pathologically dense reference graphs.
    pub fn between<K: Clone + Eq + Hash>(
        graph: &Digraph<K>,
        positions: &[Vec<NodeId>],
        start: usize,
        end: usize,
        max_paths: usize,
    ) -> Result<Self> {
        let start_node = unique_node(positions, start)?;
        let end_node = unique_node(positions, end)?;

        let mut paths = Vec::new();
        if start_node == end_node {
            paths.push(SegmentPath {
                nodes: vec![start_node],
                weight: 0.0,
            });
        } else {
            enumerate_paths(graph, start_node, end_node, max_paths, &mut paths)
                .map_err(|_| {
                    Error::Validation(format!(
                        "segment {start}..={end} exceeds {max_paths} candidate paths"
                    ))
                })?;
        }
        paths.sort_by(|a, b| a.weight.total_cmp(&b.weight));
        trace!(start, end, paths = paths.len(), "segment ranked");
        Ok(Segment { start, end, paths })
    }

    /// First position of the segment.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last position of the segment, inclusive.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Position span, zero for a single-position segment.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ranked candidate paths, ascending by weight.
    pub fn paths(&self) -> &[SegmentPath] {
        &self.paths
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    /// Total weights in rank order.
    pub fn weights(&self) -> Vec<f64> {
        self.paths.iter().map(|p| p.weight).collect()
    }

    /// Clamp a requested rank to the last available one. Selection never
    /// fails on an out-of-range rank.
    pub fn clip_rank(&self, rank: usize) -> usize {
        rank.min(self.paths.len().saturating_sub(1))
    }

    /// The node the rank-`rank` path visits at absolute `position`.
    pub fn node_at(&self, rank: usize, position: usize) -> NodeId {
        debug_assert!((self.start..=self.end).contains(&position));
        self.paths[self.clip_rank(rank)].nodes[position - self.start]
    }

    /// The node each ranked path visits at absolute `position`, rank order.
    pub fn nodes_at(&self, position: usize) -> Vec<NodeId> {
        debug_assert!((self.start..=self.end).contains(&position));
        self.paths
            .iter()
            .map(|p| p.nodes[position - self.start])
            .collect()
    }
}

fn unique_node(positions: &[Vec<NodeId>], position: usize) -> Result<NodeId> {
    match positions.get(position).map(Vec::as_slice) {
        Some(&[node]) => Ok(node),
        Some(nodes) => Err(Error::Validation(format!(
            "segment boundary at position {position} has {} nodes, expected 1",
            nodes.len()
        ))),
        None => Err(Error::Validation(format!(
            "segment boundary at position {position} is out of range"
        ))),
    }
}

struct Ceiling;

/// Iterative all-simple-paths DFS from `source` to `target`. Successors are
/// visited in ascending node-id order so that equal-weight paths come out
/// lexicographically. Errs (with no detail; the caller names the segment)
/// once more than `max_paths` paths accumulate.
fn enumerate_paths<K: Clone + Eq + Hash>(
    graph: &Digraph<K>,
    source: NodeId,
    target: NodeId,
    max_paths: usize,
    paths: &mut Vec<SegmentPath>,
) -> std::result::Result<(), Ceiling> {
    struct Frame {
        edges: SmallVec<[Edge; 4]>,
        next: usize,
    }
    let sorted_edges = |id: NodeId| {
        let mut edges: SmallVec<[Edge; 4]> = SmallVec::from_slice(graph.out_edges(id));
        edges.sort_unstable_by_key(|e| e.to);
        edges
    };

    let mut trail = vec![source];
    let mut weights = vec![0.0f64];
    let mut frames = vec![Frame {
        edges: sorted_edges(source),
        next: 0,
    }];

    while let Some(frame) = frames.last_mut() {
        if frame.next >= frame.edges.len() {
            frames.pop();
            trail.pop();
            weights.pop();
            continue;
        }
        let edge = frame.edges[frame.next];
        frame.next += 1;
        let weight = weights[weights.len() - 1] + edge.weight;
        if edge.to == target {
            let mut nodes = trail.clone();
            nodes.push(edge.to);
            paths.push(SegmentPath { nodes, weight });
            if paths.len() > max_paths {
                return Err(Ceiling);
            }
        } else {
            trail.push(edge.to);
            weights.push(weight);
            frames.push(Frame {
                edges: sorted_edges(edge.to),
                next: 0,
            });
        }
    }
    Ok(())
}

/// Partition a width array into segment spans `(start, end)`, inclusive.
///
/// Spans are contiguous, non-overlapping, and cover every position exactly
/// once, for any input. A span's boundaries are width 1 whenever the array
/// allows it; when a deviation runs into the end of the array the final
/// span absorbs it (and `Segment::between` will report the broken boundary).
pub fn segment_spans(widths: &[usize]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    while start < widths.len() {
        let suffix = &widths[start..];
        let Some(deviation) = first_deviation(suffix, 0) else {
            spans.push((start, widths.len() - 1));
            break;
        };
        let Some(repeat) = first_repeat(suffix, deviation.saturating_sub(2)) else {
            spans.push((start, widths.len() - 1));
            break;
        };
        spans.push((start, start + repeat));
        start += repeat + 1;
    }
    spans
}

/// First index at or after `offset` where the width deviates from 1. The
/// last element is never examined.
fn first_deviation(widths: &[usize], offset: usize) -> Option<usize> {
    (offset..widths.len().saturating_sub(1)).find(|&i| widths[i] != 1)
}

/// First index at or after `offset` where two consecutive widths are 1.
/// The last element is never examined as the start of a pair.
fn first_repeat(widths: &[usize], offset: usize) -> Option<usize> {
    (offset..widths.len().saturating_sub(1)).find(|&i| widths[i] == 1 && widths[i + 1] == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeKind;
    use proptest::prelude::*;

    #[test]
    fn spans_of_a_constant_array_form_one_segment() {
        assert_eq!(segment_spans(&[1, 1, 1, 1]), vec![(0, 3)]);
    }

    #[test]
    fn deviation_bounded_by_repeats_splits_the_array() {
        // The worked example from the partition rule: [1, 2, 1, 1, 1, 1]
        // splits into [1, 2, 1] and [1, 1, 1].
        assert_eq!(segment_spans(&[1, 2, 1, 1, 1, 1]), vec![(0, 2), (3, 5)]);
    }

    #[test]
    fn trailing_deviation_folds_into_the_final_span() {
        // The leading repeat closes the first span immediately; the
        // deviation then runs into the end of the array and is absorbed.
        assert_eq!(segment_spans(&[1, 1, 3, 2]), vec![(0, 0), (1, 3)]);
    }

    #[test]
    fn deviation_without_a_repeat_yields_one_span() {
        assert_eq!(segment_spans(&[1, 2, 2, 2, 1]), vec![(0, 4)]);
    }

    #[test]
    fn consecutive_deviations_share_a_span_until_a_repeat() {
        assert_eq!(
            segment_spans(&[1, 2, 1, 2, 1, 1, 1]),
            vec![(0, 4), (5, 6)]
        );
    }

    #[test]
    fn empty_and_single_arrays() {
        assert!(segment_spans(&[]).is_empty());
        assert_eq!(segment_spans(&[1]), vec![(0, 0)]);
        assert_eq!(segment_spans(&[5]), vec![(0, 0)]);
    }

    proptest! {
        // The partition must be total and exact for any width array.
        #[test]
        fn spans_partition_any_width_array(widths in prop::collection::vec(0usize..5, 0..40)) {
            let spans = segment_spans(&widths);
            let mut expected_start = 0;
            for &(start, end) in &spans {
                prop_assert_eq!(start, expected_start);
                prop_assert!(end >= start);
                prop_assert!(end < widths.len());
                expected_start = end + 1;
            }
            if widths.is_empty() {
                prop_assert!(spans.is_empty());
            } else {
                prop_assert_eq!(expected_start, widths.len());
            }
        }
    }

    /// A layered diamond: a at position 0, {b, c} at 1, d at 2, with a
    /// cheaper route through b.
    fn diamond() -> (Digraph<(usize, u32)>, Vec<Vec<NodeId>>) {
        let mut graph = Digraph::new();
        let a = graph.insert_node((0, 0));
        let b = graph.insert_node((1, 1));
        let c = graph.insert_node((1, 2));
        let d = graph.insert_node((2, 3));
        graph.add_edge(a, b, 1.0, EdgeKind::Step);
        graph.add_edge(a, c, 2.0, EdgeKind::Step);
        graph.add_edge(b, d, 1.0, EdgeKind::Step);
        graph.add_edge(c, d, 1.0, EdgeKind::Step);
        let positions = vec![vec![a], vec![b, c], vec![d]];
        (graph, positions)
    }

    #[test]
    fn paths_are_ranked_by_total_weight() {
        let (graph, positions) = diamond();
        let segment = Segment::between(&graph, &positions, 0, 2, 100).unwrap();
        assert_eq!(segment.path_count(), 2);
        assert_eq!(segment.weights(), vec![2.0, 3.0]);
        assert_eq!(segment.paths()[0].nodes[1], positions[1][0]);
    }

    #[test]
    fn equal_weights_tie_break_lexicographically() {
        let (mut graph, positions) = diamond();
        let a = positions[0][0];
        let c = positions[1][1];
        // Make both routes cost 2; the path through b (lower id) wins.
        graph.add_edge(a, c, 1.0, EdgeKind::Step);
        let segment = Segment::between(&graph, &positions, 0, 2, 100).unwrap();
        assert_eq!(segment.weights(), vec![2.0, 2.0]);
        assert!(segment.paths()[0].nodes[1] < segment.paths()[1].nodes[1]);
    }

    #[test]
    fn zero_width_segment_has_one_weightless_path() {
        let (graph, positions) = diamond();
        let segment = Segment::between(&graph, &positions, 0, 0, 100).unwrap();
        assert_eq!(segment.path_count(), 1);
        assert_eq!(segment.weights(), vec![0.0]);
        assert_eq!(segment.len(), 0);
    }

    #[test]
    fn ambiguous_boundary_is_a_validation_error() {
        let (graph, positions) = diamond();
        let err = Segment::between(&graph, &positions, 0, 1, 100).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn path_ceiling_is_enforced() {
        let (graph, positions) = diamond();
        let err = Segment::between(&graph, &positions, 0, 2, 1).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn rank_clipping_never_overruns() {
        let (graph, positions) = diamond();
        let segment = Segment::between(&graph, &positions, 0, 2, 100).unwrap();
        assert_eq!(segment.clip_rank(0), 0);
        assert_eq!(segment.clip_rank(99), 1);
        // node_at with a wild rank resolves to the last path.
        assert_eq!(segment.node_at(99, 1), segment.paths()[1].nodes[1]);
    }

    #[test]
    fn nodes_at_lists_candidates_in_rank_order() {
        let (graph, positions) = diamond();
        let segment = Segment::between(&graph, &positions, 0, 2, 100).unwrap();
        let b = positions[1][0];
        let c = positions[1][1];
        assert_eq!(segment.nodes_at(1), vec![b, c]);
        // Boundary positions repeat the unique node once per rank.
        assert_eq!(segment.nodes_at(0), vec![positions[0][0]; 2]);
    }
}
