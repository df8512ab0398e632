//! Internal failures of parsing and evaluation

use gridcalc_core::CellError;
use thiserror::Error;

pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// These never cross the public evaluation entry points; they are converted into the
/// nearest error sentinel with [`FormulaError::to_cell_error`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("cannot parse formula: {0}")]
    Parse(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// An argument of the wrong kind or outside its domain
    #[error("bad argument: {0}")]
    Argument(String),

    #[error("no function named {0}")]
    UnknownFunction(String),

    #[error("{function} takes {expected} arguments, {actual} given")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// A cell already being evaluated was reached again
    #[error("cycle through {0}")]
    CircularReference(String),

    /// Address off the grid or naming a missing sheet
    #[error("bad reference: {0}")]
    InvalidReference(String),

    /// Nested reference evaluation exceeded the configured ceiling
    #[error("more than {0} nested cell evaluations")]
    DepthLimit(usize),

    /// An error sentinel raised by a function argument; becomes the call's result
    #[error("{0}")]
    Sentinel(CellError),
}

impl FormulaError {
    /// The sentinel a caller sees for this failure
    pub fn to_cell_error(&self) -> CellError {
        match self {
            FormulaError::CircularReference(_) => CellError::Circular,
            FormulaError::InvalidReference(_) => CellError::Ref,
            FormulaError::Sentinel(e) => *e,
            FormulaError::Parse(_)
            | FormulaError::Evaluation(_)
            | FormulaError::Argument(_)
            | FormulaError::UnknownFunction(_)
            | FormulaError::ArgumentCount { .. }
            | FormulaError::DepthLimit(_) => CellError::Error,
        }
    }
}

impl From<gridcalc_core::Error> for FormulaError {
    fn from(e: gridcalc_core::Error) -> Self {
        FormulaError::InvalidReference(e.to_string())
    }
}
