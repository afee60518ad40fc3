// error.rs
// Description: Crate error type shared by matrix algebra, layer graphs, blocks,
//              the sequence model and the config helpers.
// History:
// - 2026-09-29: Replace string errors with one enum so callers can match on
//               shape problems and divergence.
// Author: handgrad contributors

use std::fmt;

/// Errors produced while building, running or training a network.
///
/// Vocabulary overflow is not an error: tokens past capacity resolve to
/// index 0 instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub enum NetError {
    /// Binary matrix operation on incompatible shapes.
    ShapeMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    /// Explicit row data where a row length differs from the first row.
    RaggedRows {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// Forward called with an input vector whose length differs from the input layer.
    InputSizeMismatch { expected: usize, actual: usize },

    /// Backward called with a gradient whose length differs from the output layer.
    GradientSizeMismatch { expected: usize, actual: usize },

    /// Training cost became non-finite. Callers should halt training.
    Divergence { cost: f64 },

    /// Text produced fewer tokens than the operation needs.
    SequenceTooShort { tokens: usize, required: usize },

    /// Backward called on a block that has not run forward yet.
    MissingForward(&'static str),

    /// Configuration or builder values are out of range.
    InvalidConfig(String),

    /// Config file could not be read or written.
    Io(String),

    /// Config file could not be (de)serialized.
    Json(String),
}

impl NetError {
    /// True when training produced a non-finite cost.
    #[must_use]
    pub fn is_divergence(&self) -> bool {
        matches!(self, NetError::Divergence { .. })
    }

    pub(crate) fn shape(op: &'static str, left: (usize, usize), right: (usize, usize)) -> Self {
        NetError::ShapeMismatch { op, left, right }
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::ShapeMismatch { op, left, right } => write!(
                f,
                "shape mismatch in {op}: {}x{} vs {}x{}",
                left.0, left.1, right.0, right.1
            ),
            NetError::RaggedRows {
                row,
                expected,
                actual,
            } => write!(f, "row {row} has {actual} columns, expected {expected}"),
            NetError::InputSizeMismatch { expected, actual } => write!(
                f,
                "input size {actual} does not match input layer size {expected}"
            ),
            NetError::GradientSizeMismatch { expected, actual } => write!(
                f,
                "gradient size {actual} does not match output layer size {expected}"
            ),
            NetError::Divergence { cost } => write!(f, "training diverged (cost = {cost})"),
            NetError::SequenceTooShort { tokens, required } => write!(
                f,
                "sequence has {tokens} tokens, at least {required} required"
            ),
            NetError::MissingForward(s_block) => {
                write!(f, "{s_block}: backward called before forward")
            }
            NetError::InvalidConfig(m) => write!(f, "invalid config: {m}"),
            NetError::Io(m) => write!(f, "io: {m}"),
            NetError::Json(m) => write!(f, "json: {m}"),
        }
    }
}

impl std::error::Error for NetError {}
