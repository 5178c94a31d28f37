// Selection policies and the alignment façade.
//
// `Alignment` ties one observation sequence to one reference graph: it
// builds the parse graph eagerly, picks a path per segment under a
// `SelectPolicy`, and renders or evaluates the result. The chosen path is
// cached between calls, so `output` and `evaluate` after a `select` reuse
// the same reading; `path` falls back to `Best` when nothing was selected.
//
// Selection resolves one rank per segment and reads off the node that
// segment's ranked path visits at each input position. Requested ranks are
// always clipped to the segment's last available rank — a caller asking
// for the 99th reading of a two-reading segment gets the 2nd, never an
// error.
//
// See also: `parse.rs` for the graph being selected over, `output.rs` for
// formatting and evaluation.

use crate::error::{Error, Result};
use crate::graph::NodeId;
use crate::output::{
    default_evaluator, evaluate_with, format_nodes, EvalCounts, OutputStyle, Verdict,
};
use crate::parse::{BuildOptions, ParseGraph};
use crate::reference::ReferenceGraph;
use crate::segment::Segment;
use crate::value::{Matcher, Value};
use std::fmt;

/// How to choose a rank for each segment.
pub enum SelectPolicy {
    /// Rank 0 (minimum weight) everywhere.
    Best,
    /// The maximum available rank per segment.
    Worst,
    /// An explicit rank per segment; missing entries select rank 0.
    Ranks(Vec<usize>),
    /// A callable `(segment index, segment) -> rank`.
    Custom(Box<dyn Fn(usize, &Segment) -> usize>),
}

impl SelectPolicy {
    /// The clipped rank this policy picks for one segment.
    pub fn rank(&self, index: usize, segment: &Segment) -> usize {
        let requested = match self {
            SelectPolicy::Best => 0,
            SelectPolicy::Worst => usize::MAX,
            SelectPolicy::Ranks(ranks) => ranks.get(index).copied().unwrap_or(0),
            SelectPolicy::Custom(f) => f(index, segment),
        };
        segment.clip_rank(requested)
    }
}

impl fmt::Debug for SelectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectPolicy::Best => f.write_str("SelectPolicy::Best"),
            SelectPolicy::Worst => f.write_str("SelectPolicy::Worst"),
            SelectPolicy::Ranks(ranks) => f.debug_tuple("SelectPolicy::Ranks").field(ranks).finish(),
            SelectPolicy::Custom(_) => f.write_str("SelectPolicy::Custom(..)"),
        }
    }
}

/// One record per input position: the candidate reference nodes in rank
/// order, the surrounding segment's ranked weights, and where in the
/// segment the position falls.
#[derive(Clone, Debug)]
pub struct StepRecord {
    /// The reference node each ranked path visits here.
    pub candidates: Vec<NodeId>,
    /// Total weights of the segment's paths, rank order.
    pub weights: Vec<f64>,
    /// Offset of this position from the segment's start.
    pub position_in_segment: usize,
    /// True for the first input position inside its segment.
    pub is_first_in_segment: bool,
}

/// One sequence aligned against one reference graph.
#[derive(Debug)]
pub struct Alignment<'g, V> {
    parse: ParseGraph<'g, V>,
    selected: Option<Vec<NodeId>>,
}

impl<'g, V: Value> Alignment<'g, V> {
    /// Build the parse graph for `sequence` with exact matching.
    pub fn new(
        reference: &'g ReferenceGraph<V>,
        sequence: &[V],
        options: BuildOptions,
    ) -> Result<Self> {
        Self::with_matcher(reference, sequence, Matcher::Exact, options)
    }

    /// Build with a caller-supplied matcher (see `Matcher::Custom`).
    pub fn with_matcher(
        reference: &'g ReferenceGraph<V>,
        sequence: &[V],
        matcher: Matcher<V>,
        options: BuildOptions,
    ) -> Result<Self> {
        let mut parse = ParseGraph::new(reference)
            .with_matcher(matcher)
            .with_options(options);
        parse.build(sequence)?;
        Ok(Alignment {
            parse,
            selected: None,
        })
    }

    /// Rebuild for a new sequence, dropping the cached selection. The
    /// shortest-path memo carries over.
    pub fn realign(&mut self, sequence: &[V]) -> Result<()> {
        self.selected = None;
        self.parse.build(sequence)
    }

    pub fn parse(&self) -> &ParseGraph<'g, V> {
        &self.parse
    }

    pub fn parse_mut(&mut self) -> &mut ParseGraph<'g, V> {
        &mut self.parse
    }

    pub fn reference(&self) -> &'g ReferenceGraph<V> {
        self.parse.reference()
    }

    /// Choose one path per segment and cache the reference nodes it visits
    /// at each input position.
    pub fn select(&mut self, policy: &SelectPolicy) -> Result<&[NodeId]> {
        let nodes = selected_nodes(&mut self.parse, policy)?;
        Ok(self.selected.insert(nodes))
    }

    /// The currently selected path, selecting `Best` if nothing is.
    pub fn path(&mut self) -> Result<&[NodeId]> {
        if self.selected.is_none() {
            let nodes = selected_nodes(&mut self.parse, &SelectPolicy::Best)?;
            self.selected = Some(nodes);
        }
        // Filled just above.
        match &self.selected {
            Some(nodes) => Ok(nodes),
            None => unreachable!(),
        }
    }

    /// One `StepRecord` per input position. Each call takes a fresh pass
    /// over the cached segments.
    pub fn steps(&mut self) -> Result<Vec<StepRecord>> {
        step_records(&mut self.parse)
    }

    /// Render the selected path (selecting `Best` on demand).
    pub fn output(&mut self, style: &OutputStyle<V>) -> Result<Vec<String>> {
        let nodes = self.path()?.to_vec();
        format_nodes(self.parse.reference(), &nodes, style)
    }

    /// Render explicit nodes without touching the cached selection.
    pub fn output_nodes(&self, nodes: &[NodeId], style: &OutputStyle<V>) -> Result<Vec<String>> {
        format_nodes(self.parse.reference(), nodes, style)
    }

    /// Render the selected path and classify it against `targets` with the
    /// stock evaluator.
    pub fn evaluate(
        &mut self,
        targets: &[Option<&str>],
        style: &OutputStyle<V>,
    ) -> Result<EvalCounts> {
        self.evaluate_with(targets, style, default_evaluator)
    }

    /// As `evaluate`, with a caller-supplied evaluator.
    pub fn evaluate_with<F>(
        &mut self,
        targets: &[Option<&str>],
        style: &OutputStyle<V>,
        evaluator: F,
    ) -> Result<EvalCounts>
    where
        F: Fn(&str, Option<&str>) -> Verdict,
    {
        let predictions = self.output(style)?;
        Ok(evaluate_with(
            targets.iter().copied(),
            predictions.iter().map(String::as_str),
            evaluator,
        ))
    }
}

/// Resolve a policy to the reference node at each input position.
fn selected_nodes<V: Value>(
    parse: &mut ParseGraph<'_, V>,
    policy: &SelectPolicy,
) -> Result<Vec<NodeId>> {
    let input_positions = parse.input_positions().to_vec();
    let mut picked: Vec<Option<NodeId>> = vec![None; input_positions.len()];
    {
        let segments = parse.segments()?;
        for (index, segment) in segments.iter().enumerate() {
            let rank = policy.rank(index, segment);
            for (slot, &position) in picked.iter_mut().zip(&input_positions) {
                if (segment.start()..=segment.end()).contains(&position) {
                    *slot = Some(segment.node_at(rank, position));
                }
            }
        }
    }
    picked
        .into_iter()
        .zip(&input_positions)
        .map(|(slot, &position)| {
            let parse_id = slot.ok_or_else(|| {
                Error::Validation(format!("input position {position} is in no segment"))
            })?;
            parse.reference_node(parse_id).ok_or_else(|| {
                Error::Validation(format!(
                    "input position {position} resolved to a boundary node"
                ))
            })
        })
        .collect()
}

fn step_records<V: Value>(parse: &mut ParseGraph<'_, V>) -> Result<Vec<StepRecord>> {
    let input_positions = parse.input_positions().to_vec();
    let indices = input_positions
        .iter()
        .map(|&position| parse.segment_index_at(position))
        .collect::<Result<Vec<usize>>>()?;
    let mut raw: Vec<(usize, Vec<NodeId>, Vec<f64>, usize)> = Vec::new();
    {
        let segments = parse.segments()?;
        for (&position, &index) in input_positions.iter().zip(&indices) {
            let segment = &segments[index];
            raw.push((
                index,
                segment.nodes_at(position),
                segment.weights(),
                position - segment.start(),
            ));
        }
    }
    let mut records = Vec::with_capacity(raw.len());
    let mut last_segment = None;
    for (index, parse_nodes, weights, position_in_segment) in raw {
        let candidates = parse_nodes
            .into_iter()
            .map(|id| {
                parse.reference_node(id).ok_or_else(|| {
                    Error::Validation("step candidate resolved to a boundary node".to_string())
                })
            })
            .collect::<Result<Vec<NodeId>>>()?;
        records.push(StepRecord {
            candidates,
            weights,
            position_in_segment,
            is_first_in_segment: last_segment != Some(index),
        });
        last_segment = Some(index);
    }
    Ok(records)
}
