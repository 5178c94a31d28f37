// Observation values and matching.
//
// The engine never inspects values beyond equality, hashing, and (during
// group construction only) interval stepping. Callers bring their own value
// type — a pitch, a token, an integer — and the two small traits here are
// the entire contract. `Matcher` is the seam for approximate matching: a
// coarser-than-equality matcher lets the parse accept near misses, which
// the builder then penalizes (see `parse.rs`).

use std::fmt;
use std::hash::Hash;

/// Bounds every observation value must satisfy. Blanket-implemented; do not
/// implement by hand.
pub trait Value: Clone + Eq + Hash + fmt::Debug {}

impl<T: Clone + Eq + Hash + fmt::Debug> Value for T {}

/// Values that can be advanced by a typed interval. Only group construction
/// steps values; parsing never does.
pub trait Stepped: Sized {
    type Interval;

    /// The value one `interval` above `self`.
    fn advance(&self, interval: &Self::Interval) -> Self;
}

impl Stepped for i32 {
    type Interval = i32;

    fn advance(&self, interval: &i32) -> i32 {
        self + interval
    }
}

/// Decides which reference values can stand in for an observed value.
///
/// `Exact` is plain equality. `Custom` wraps a caller-supplied equivalence,
/// typically coarser than equality (the source domain matches pitches by
/// scale step, letting B stand in for B-flat); inexact stand-ins draw the
/// mismatch penalty after the parse graph is built.
#[derive(Default)]
pub enum Matcher<V> {
    #[default]
    Exact,
    Custom(Box<dyn Fn(&V, &V) -> bool>),
}

impl<V: PartialEq> Matcher<V> {
    /// True when a node carrying `node_value` may represent `observed`.
    pub fn matches(&self, node_value: &V, observed: &V) -> bool {
        match self {
            Matcher::Exact => node_value == observed,
            Matcher::Custom(f) => f(node_value, observed),
        }
    }
}

impl<V> fmt::Debug for Matcher<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Exact => f.write_str("Matcher::Exact"),
            Matcher::Custom(_) => f.write_str("Matcher::Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_matcher_is_equality() {
        let m: Matcher<i32> = Matcher::Exact;
        assert!(m.matches(&3, &3));
        assert!(!m.matches(&3, &4));
    }

    #[test]
    fn custom_matcher_can_be_coarser() {
        // Match modulo 12, the usual octave-equivalence example.
        let m: Matcher<i32> = Matcher::Custom(Box::new(|a, b| a % 12 == b % 12));
        assert!(m.matches(&3, &15));
        assert!(!m.matches(&3, &16));
    }

    #[test]
    fn stepped_i32_advances_by_interval() {
        assert_eq!(5i32.advance(&2), 7);
        assert_eq!(5i32.advance(&-3), 2);
    }
}
