// Label formatting and evaluation against ground truth.
//
// Selected reference nodes become strings through an `OutputStyle`: the two
// built-in styles print the rank stem alone or the full display name, a
// caller table can map ranks to arbitrary stems, and a closure gets the
// whole `NodeContext`. Evaluation classifies predictions against target
// labels into five categories; the default evaluator first normalizes the
// target the way annotated corpora write them (bracketed uncertain labels,
// `*`-prefixed corrections, `?` for a missing ground truth).
//
// See also: `align.rs`, which drives both from a selection.

use crate::error::{Error, Result};
use crate::graph::NodeId;
use crate::reference::{NodeContext, ReferenceGraph};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a selected node is rendered as a label.
pub enum OutputStyle<V> {
    /// The rank stem alone, e.g. `fa`.
    Syllable,
    /// The display name, stem plus group index, e.g. `fa3`.
    Name,
    /// A caller-supplied stem per rank, indexed by degree − 1. A degree
    /// beyond the table is a configuration error.
    ByRank(Vec<String>),
    /// Full custom formatting over the node's context.
    Custom(Box<dyn Fn(&NodeContext<'_, V>) -> String>),
}

impl<V> OutputStyle<V> {
    fn format(&self, ctx: &NodeContext<'_, V>) -> Result<String> {
        match self {
            OutputStyle::Syllable => Ok(ctx.stem.to_string()),
            OutputStyle::Name => Ok(ctx.name.to_string()),
            OutputStyle::ByRank(table) => {
                table.get(ctx.degree - 1).cloned().ok_or_else(|| {
                    Error::Configuration(format!(
                        "rank table has {} entries but degree {} was selected",
                        table.len(),
                        ctx.degree
                    ))
                })
            }
            OutputStyle::Custom(f) => Ok(f(ctx)),
        }
    }
}

impl<V> fmt::Debug for OutputStyle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStyle::Syllable => f.write_str("OutputStyle::Syllable"),
            OutputStyle::Name => f.write_str("OutputStyle::Name"),
            OutputStyle::ByRank(table) => f.debug_tuple("OutputStyle::ByRank").field(table).finish(),
            OutputStyle::Custom(_) => f.write_str("OutputStyle::Custom(..)"),
        }
    }
}

/// Render each node in order. Fails on the first node the style cannot
/// format.
pub fn format_nodes<V: Value>(
    reference: &ReferenceGraph<V>,
    nodes: &[NodeId],
    style: &OutputStyle<V>,
) -> Result<Vec<String>> {
    nodes
        .iter()
        .map(|&id| style.format(&reference.context(id)))
        .collect()
}

/// Classification of one prediction against its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Correct,
    Missing,
    Insertion,
    Deletion,
    Incorrect,
}

/// Per-category totals of one evaluation run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalCounts {
    pub correct: usize,
    pub missing: usize,
    pub insertion: usize,
    pub deletion: usize,
    pub incorrect: usize,
}

impl EvalCounts {
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Correct => self.correct += 1,
            Verdict::Missing => self.missing += 1,
            Verdict::Insertion => self.insertion += 1,
            Verdict::Deletion => self.deletion += 1,
            Verdict::Incorrect => self.incorrect += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.correct + self.missing + self.insertion + self.deletion + self.incorrect
    }

    /// Correct over total, zero when nothing was evaluated.
    pub fn accuracy(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.correct as f64 / self.total() as f64
        }
    }
}

/// The stock evaluator. The target is normalized before comparison: `[..]`
/// wrappers (else `(..)` wrappers) are stripped, and a `*` keeps only the
/// part between the first and second asterisk. An absent target counts as
/// a deletion when the prediction is empty, incorrect otherwise.
pub fn default_evaluator(prediction: &str, target: Option<&str>) -> Verdict {
    let normalized = target.map(|t| {
        let t = if t.starts_with('[') {
            t.replace(['[', ']'], "")
        } else if t.starts_with('(') {
            t.replace(['(', ')'], "")
        } else {
            t.to_string()
        };
        match t.split('*').nth(1) {
            Some(part) => part.to_string(),
            None => t,
        }
    });
    match normalized.as_deref() {
        Some(t) if t == prediction => Verdict::Correct,
        Some("?") => Verdict::Missing,
        Some("") if !prediction.is_empty() => Verdict::Insertion,
        Some(_) if prediction.is_empty() => Verdict::Deletion,
        None if prediction.is_empty() => Verdict::Deletion,
        _ => Verdict::Incorrect,
    }
}

/// Classify prediction/target pairs with a custom evaluator. Pairing stops
/// at the shorter sequence.
pub fn evaluate_with<'a, F>(
    targets: impl IntoIterator<Item = Option<&'a str>>,
    predictions: impl IntoIterator<Item = &'a str>,
    evaluator: F,
) -> EvalCounts
where
    F: Fn(&str, Option<&str>) -> Verdict,
{
    let mut counts = EvalCounts::default();
    for (target, prediction) in targets.into_iter().zip(predictions) {
        counts.record(evaluator(prediction, target));
    }
    counts
}

/// `evaluate_with` using the stock evaluator.
pub fn evaluate<'a>(
    targets: impl IntoIterator<Item = Option<&'a str>>,
    predictions: impl IntoIterator<Item = &'a str>,
) -> EvalCounts {
    evaluate_with(targets, predictions, default_evaluator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{Group, GroupWeights};

    fn reference() -> ReferenceGraph<i32> {
        let mut reference = ReferenceGraph::new();
        reference
            .add_group(
                Group::new(
                    3,
                    "line",
                    vec![0, 1, 2],
                    vec!["ut".into(), "re".into(), "mi".into()],
                    GroupWeights::default(),
                )
                .unwrap(),
            )
            .unwrap();
        reference
    }

    fn node(reference: &ReferenceGraph<i32>, value: i32) -> NodeId {
        reference.graph().id(&(3, value)).unwrap()
    }

    #[test]
    fn syllable_style_prints_the_stem() {
        let reference = reference();
        let nodes = vec![node(&reference, 0), node(&reference, 2)];
        let labels = format_nodes(&reference, &nodes, &OutputStyle::Syllable).unwrap();
        assert_eq!(labels, vec!["ut", "mi"]);
    }

    #[test]
    fn name_style_appends_the_group_index() {
        let reference = reference();
        let nodes = vec![node(&reference, 1)];
        let labels = format_nodes(&reference, &nodes, &OutputStyle::Name).unwrap();
        assert_eq!(labels, vec!["re3"]);
    }

    #[test]
    fn by_rank_style_uses_the_caller_table() {
        let reference = reference();
        let style = OutputStyle::ByRank(vec!["do".into(), "re".into(), "mi".into()]);
        let nodes = vec![node(&reference, 0), node(&reference, 1)];
        assert_eq!(format_nodes(&reference, &nodes, &style).unwrap(), vec!["do", "re"]);
    }

    #[test]
    fn short_rank_table_is_a_configuration_error() {
        let reference = reference();
        let style = OutputStyle::ByRank(vec!["do".into()]);
        let nodes = vec![node(&reference, 2)];
        let err = format_nodes(&reference, &nodes, &style).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn custom_style_sees_the_whole_context() {
        let reference = reference();
        let style: OutputStyle<i32> = OutputStyle::Custom(Box::new(|ctx| {
            format!("{}:{}@{}", ctx.group_kind, ctx.degree, ctx.value)
        }));
        let nodes = vec![node(&reference, 2)];
        assert_eq!(format_nodes(&reference, &nodes, &style).unwrap(), vec!["line:3@2"]);
    }

    #[test]
    fn evaluator_classifies_the_plain_cases() {
        assert_eq!(default_evaluator("fa", Some("fa")), Verdict::Correct);
        assert_eq!(default_evaluator("fa", Some("sol")), Verdict::Incorrect);
        assert_eq!(default_evaluator("fa", Some("?")), Verdict::Missing);
        assert_eq!(default_evaluator("fa", Some("")), Verdict::Insertion);
        assert_eq!(default_evaluator("", Some("fa")), Verdict::Deletion);
        assert_eq!(default_evaluator("", None), Verdict::Deletion);
        assert_eq!(default_evaluator("fa", None), Verdict::Incorrect);
    }

    #[test]
    fn evaluator_strips_bracket_wrappers() {
        assert_eq!(default_evaluator("fa", Some("[fa]")), Verdict::Correct);
        assert_eq!(default_evaluator("fa", Some("(fa)")), Verdict::Correct);
        // Only one wrapper family is stripped per target.
        assert_eq!(default_evaluator("(fa)", Some("[(fa)]")), Verdict::Correct);
    }

    #[test]
    fn evaluator_keeps_the_part_after_the_first_asterisk() {
        assert_eq!(default_evaluator("fa", Some("sol*fa")), Verdict::Correct);
        assert_eq!(default_evaluator("fa", Some("sol*fa*la")), Verdict::Correct);
        assert_eq!(default_evaluator("sol", Some("sol*fa")), Verdict::Incorrect);
    }

    #[test]
    fn counts_accumulate_per_category() {
        let targets = [Some("fa"), Some("?"), Some(""), Some("sol"), None];
        let predictions = ["fa", "x", "x", "", "x"];
        let counts = evaluate(targets, predictions);
        assert_eq!(counts.correct, 1);
        assert_eq!(counts.missing, 1);
        assert_eq!(counts.insertion, 1);
        assert_eq!(counts.deletion, 1);
        assert_eq!(counts.incorrect, 1);
        assert_eq!(counts.total(), 5);
        assert_eq!(counts.accuracy(), 0.2);
    }

    #[test]
    fn pairing_stops_at_the_shorter_side() {
        let counts = evaluate([Some("fa"), Some("fa")], ["fa"]);
        assert_eq!(counts.total(), 1);
    }
}
