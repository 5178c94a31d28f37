// Group construction.
//
// A group is one labeled, ordered cluster of reference values: an index
// (its place among the other groups), a kind label (which mutation rules
// apply to it), the values themselves, and a display-name stem per rank.
// `GroupTemplate` describes a whole family of groups at once — the anchor
// table says which start values are legal and what index/kind each one
// implies, and the interval ladder generates the remaining values — so a
// caller defines one template and stamps out every group of that family
// from it.
//
// Edge weights are carried here and materialized by the assembler: step
// edges between adjacent ranks (both directions), a self-loop per node,
// and, when enabled, a bridging override of the last step pair.
//
// See also: `reference.rs`, which registers groups and adds their edges.

use crate::error::{Error, Result};
use crate::value::{Stepped, Value};
use serde::{Deserialize, Serialize};

/// Edge weights for one group, with the conventional defaults: moving one
/// rank costs 1, re-sounding the same node costs 0.5, and the optional
/// bridge between the last two ranks costs 1.5.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupWeights {
    /// Weight of step edges between adjacent ranks.
    pub step: f64,
    /// Weight of each node's self-loop.
    pub self_loop: f64,
    /// Weight of the last-pair bridge when `bridge_enabled` is set.
    pub bridge: f64,
    /// When set, the edge between the last two ranks (both directions)
    /// uses `bridge` instead of `step`.
    pub bridge_enabled: bool,
}

impl Default for GroupWeights {
    fn default() -> Self {
        GroupWeights {
            step: 1.0,
            self_loop: 0.5,
            bridge: 1.5,
            bridge_enabled: true,
        }
    }
}

impl GroupWeights {
    fn validate(&self) -> Result<()> {
        if self.step < 0.0 || self.self_loop < 0.0 || self.bridge < 0.0 {
            return Err(Error::Configuration(
                "group edge weights must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// One ordered cluster of values, ready to register with a reference graph.
#[derive(Clone, Debug)]
pub struct Group<V> {
    index: i32,
    kind: String,
    values: Vec<V>,
    stems: Vec<String>,
    weights: GroupWeights,
}

impl<V: Value> Group<V> {
    /// Assemble a group directly. `values` and `stems` must be the same
    /// length, values must be distinct within the group, and weights must
    /// be non-negative.
    pub fn new(
        index: i32,
        kind: impl Into<String>,
        values: Vec<V>,
        stems: Vec<String>,
        weights: GroupWeights,
    ) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::Configuration(format!(
                "group {index} has no values"
            )));
        }
        if values.len() != stems.len() {
            return Err(Error::Configuration(format!(
                "group {index} has {} values but {} rank stems",
                values.len(),
                stems.len()
            )));
        }
        for (i, value) in values.iter().enumerate() {
            if values[..i].contains(value) {
                return Err(Error::Configuration(format!(
                    "group {index} repeats the value {value:?}"
                )));
            }
        }
        weights.validate()?;
        Ok(Group {
            index,
            kind: kind.into(),
            values,
            stems,
            weights,
        })
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Values in rank order; rank ("degree") is the 1-based position here.
    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn stems(&self) -> &[String] {
        &self.stems
    }

    pub fn weights(&self) -> GroupWeights {
        self.weights
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when the two groups share at least one value. Overlap is what
    /// makes a pair of groups eligible for mutation edges.
    pub fn overlaps(&self, other: &Group<V>) -> bool {
        self.values.iter().any(|v| other.values.contains(v))
    }
}

/// A family of groups: legal start values (anchors) with the index and kind
/// each implies, the interval ladder that generates the remaining values,
/// and shared rank stems and weights.
#[derive(Clone, Debug)]
pub struct GroupTemplate<V: Stepped> {
    anchors: Vec<(V, i32, String)>,
    intervals: Vec<V::Interval>,
    stems: Vec<String>,
    weights: GroupWeights,
}

impl<V: Value + Stepped> GroupTemplate<V> {
    /// `stems` must have one entry per rank, i.e. `intervals.len() + 1`.
    /// Anchor values must be distinct.
    pub fn new(
        anchors: Vec<(V, i32, String)>,
        intervals: Vec<V::Interval>,
        stems: Vec<String>,
    ) -> Result<Self> {
        if stems.len() != intervals.len() + 1 {
            return Err(Error::Configuration(format!(
                "{} intervals need {} rank stems, got {}",
                intervals.len(),
                intervals.len() + 1,
                stems.len()
            )));
        }
        for (i, (value, ..)) in anchors.iter().enumerate() {
            if anchors[..i].iter().any(|(v, ..)| v == value) {
                return Err(Error::Configuration(format!(
                    "duplicate anchor value {value:?}"
                )));
            }
        }
        Ok(GroupTemplate {
            anchors,
            intervals,
            stems,
            weights: GroupWeights::default(),
        })
    }

    /// Replace the default weights used by `build`.
    pub fn with_weights(mut self, weights: GroupWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Build the group anchored at `start`, with the template's weights.
    pub fn build(&self, start: &V) -> Result<Group<V>> {
        self.build_with(start, self.weights)
    }

    /// Build the group anchored at `start` with one-off weights.
    pub fn build_with(&self, start: &V, weights: GroupWeights) -> Result<Group<V>> {
        let Some((_, index, kind)) = self.anchors.iter().find(|(v, ..)| v == start) else {
            return Err(Error::Configuration(format!(
                "{start:?} is not a recognized anchor value"
            )));
        };
        let mut values = Vec::with_capacity(self.intervals.len() + 1);
        values.push(start.clone());
        let mut current = start.clone();
        for interval in &self.intervals {
            current = current.advance(interval);
            values.push(current.clone());
        }
        Group::new(*index, kind.clone(), values, self.stems.clone(), weights)
    }
}
