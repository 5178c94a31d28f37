// Error taxonomy for the alignment engine.
//
// Three failure families: `Configuration` for bad assembly input (duplicate
// group indices, unrecognized anchors, negative weights, unknown node
// names), the parse pair `NoMatch`/`NoPath` for sequences the reference
// graph cannot explain (both carry the offending sequence index), and
// `Validation` for internal invariant breaches that indicate a bug rather
// than bad input.
//
// Construction is deterministic given (graph, sequence, parameters), so no
// error here is retryable: a failed parse fails identically until the
// inputs change.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid assembly or formatting input. Fatal at assembly time.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No reference node matches the observation at `index`.
    #[error("no node matches the observation at index {index}")]
    NoMatch { index: usize },

    /// No retained path connects the matched frontiers at `index`.
    #[error("no path connects the matched nodes at index {index}")]
    NoPath { index: usize },

    /// An internal invariant failed; a bug signal, not a recoverable state.
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// The sequence index a parse failure points at, if this is one.
    pub fn sequence_index(&self) -> Option<usize> {
        match self {
            Error::NoMatch { index } | Error::NoPath { index } => Some(*index),
            _ => None,
        }
    }
}
