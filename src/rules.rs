// Declarative mutation rule tables.
//
// A rule table says how to jump between overlapping groups: for a source
// group kind, a direction (is the target group indexed above or below the
// source?), and a target kind, it lists which source rank connects to which
// target rank, optionally with a per-move weight. The assembler walks every
// overlapping group pair and applies whatever the table has for it; absent
// entries at any nesting level simply contribute no edges.
//
// Tables are plain data, keyed with `BTreeMap` for deterministic iteration,
// and load from JSON so callers can keep their transition conventions in
// files next to their other corpus data.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relative position of the target group: `Up` when its index is higher
/// than the source group's, `Down` when lower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// One rule entry: connect the source group's node at `source_rank` to the
/// target group's node at `target_rank`. Ranks are 1-based, matching how
/// group degrees are written in the transition literature this models.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Move {
    pub source_rank: usize,
    pub target_rank: usize,
    /// Overrides the assembler's default mutation weight when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl From<(usize, usize)> for Move {
    fn from((source_rank, target_rank): (usize, usize)) -> Self {
        Move {
            source_rank,
            target_rank,
            weight: None,
        }
    }
}

impl From<(usize, usize, f64)> for Move {
    fn from((source_rank, target_rank, weight): (usize, usize, f64)) -> Self {
        Move {
            source_rank,
            target_rank,
            weight: Some(weight),
        }
    }
}

/// Kind -> direction -> kind -> moves.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationRules {
    table: BTreeMap<String, BTreeMap<Direction, BTreeMap<String, Vec<Move>>>>,
}

impl MutationRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or extend) the move list for one (source kind, direction,
    /// target kind) cell. Chainable for table literals in code.
    pub fn with_rule<M>(mut self, source: &str, direction: Direction, target: &str, moves: &[M]) -> Self
    where
        M: Into<Move> + Copy,
    {
        self.table
            .entry(source.to_string())
            .or_default()
            .entry(direction)
            .or_default()
            .entry(target.to_string())
            .or_default()
            .extend(moves.iter().map(|&m| m.into()));
        self
    }

    /// The moves for one cell; empty when any level is absent.
    pub fn moves(&self, source: &str, direction: Direction, target: &str) -> &[Move] {
        self.table
            .get(source)
            .and_then(|dirs| dirs.get(&direction))
            .and_then(|targets| targets.get(target))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Parse a table from JSON, e.g.
    /// `{"lower": {"up": {"upper": [{"source_rank": 4, "target_rank": 2}]}}}`.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::Configuration(format!("invalid mutation rule table: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entries_yield_no_moves() {
        let rules = MutationRules::new().with_rule("a", Direction::Up, "b", &[(4, 2)]);
        assert_eq!(rules.moves("a", Direction::Up, "b").len(), 1);
        assert!(rules.moves("a", Direction::Down, "b").is_empty());
        assert!(rules.moves("b", Direction::Up, "a").is_empty());
        assert!(rules.moves("missing", Direction::Up, "b").is_empty());
    }

    #[test]
    fn moves_carry_optional_weights() {
        let rules = MutationRules::new().with_rule("a", Direction::Down, "a", &[(3, 6, 0.75)]);
        let moves = rules.moves("a", Direction::Down, "a");
        assert_eq!(moves[0].source_rank, 3);
        assert_eq!(moves[0].target_rank, 6);
        assert_eq!(moves[0].weight, Some(0.75));
    }

    #[test]
    fn loads_from_json() {
        let text = r#"
        {
            "natural": {
                "up":   { "hard": [{"source_rank": 5, "target_rank": 2}],
                          "soft": [{"source_rank": 4, "target_rank": 2}] },
                "down": { "hard": [{"source_rank": 4, "target_rank": 6}],
                          "soft": [{"source_rank": 3, "target_rank": 6,
                                    "weight": 0.75}] }
            }
        }"#;
        let rules = MutationRules::from_json(text).unwrap();
        assert_eq!(
            rules.moves("natural", Direction::Up, "hard"),
            &[Move::from((5, 2))]
        );
        assert_eq!(
            rules.moves("natural", Direction::Down, "soft")[0].weight,
            Some(0.75)
        );
    }

    #[test]
    fn bad_json_is_a_configuration_error() {
        let err = MutationRules::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn json_round_trips() {
        let rules = MutationRules::new()
            .with_rule("a", Direction::Up, "b", &[(4, 2)])
            .with_rule("b", Direction::Down, "a", &[(3, 6, 1.5)]);
        let text = serde_json::to_string(&rules).unwrap();
        assert_eq!(MutationRules::from_json(&text).unwrap(), rules);
    }
}
