// gamut — sequence alignment against grouped, weighted reference graphs.
//
// Given a static reference graph whose nodes form labeled, ordered groups,
// and a sequence of observation values, this crate finds the minimum-weight
// readings of the sequence through the graph and exposes them as ranked,
// labeled interpretations. The reference graph is assembled once (groups,
// rule-driven mutation edges, manual overrides) and reused across many
// sequences; each sequence gets a layered parse graph, segmented into
// unambiguous and ambiguous regions, with all candidate paths per region
// ranked by total weight.
//
// Module overview:
// - `graph.rs`:     Generic weighted digraph with interned keys — the one
//                   graph type both flavors instantiate.
// - `value.rs`:     Observation value and matcher traits (the only contract
//                   callers' value types must meet).
// - `group.rs`:     Group construction from anchors and interval ladders.
// - `rules.rs`:     Declarative mutation rule tables (JSON-loadable).
// - `reference.rs`: Reference graph assembly.
// - `parse.rs`:     Layered parse graph construction, memoized stitching,
//                   dead-branch pruning — the core algorithm.
// - `segment.rs`:   Ambiguity segmentation and per-segment path ranking.
// - `align.rs`:     Selection policies and the `Alignment` façade.
// - `output.rs`:    Label formatting and evaluation against ground truth.
// - `error.rs`:     The error taxonomy.
//
// Everything is single-threaded and synchronous; the reference graph is
// read-only once assembled and each `ParseGraph`/`Alignment` instance owns
// its caches exclusively. No subscriber is installed for the `tracing`
// diagnostics — that is the embedding application's call.

pub mod align;
pub mod error;
pub mod graph;
pub mod group;
pub mod output;
pub mod parse;
pub mod reference;
pub mod rules;
pub mod segment;
pub mod value;

pub use align::{Alignment, SelectPolicy, StepRecord};
pub use error::{Error, Result};
pub use graph::{Digraph, Edge, EdgeKind, NodeId};
pub use group::{Group, GroupTemplate, GroupWeights};
pub use output::{default_evaluator, evaluate, evaluate_with, EvalCounts, OutputStyle, Verdict};
pub use parse::{BuildOptions, ParseGraph, ParseKey};
pub use reference::{NodeContext, ReferenceGraph};
pub use rules::{Direction, Move, MutationRules};
pub use segment::{Segment, SegmentPath};
pub use value::{Matcher, Stepped, Value};
