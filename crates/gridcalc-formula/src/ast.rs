//! Parsed formula trees

use gridcalc_core::{CellAddress, CellError, CellRange};

/// One node of a parsed formula
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    /// Numeric literal, already stripped of currency and thousands separators
    Number(f64),
    /// Quoted text with `""` unescaped
    String(String),
    Boolean(bool),
    /// A literal such as `#N/A`
    Error(CellError),
    CellRef(CellReference),
    RangeRef(RangeReference),
    /// A bare word that is neither a reference nor a call; evaluates to its own text
    Name(String),
    /// `left op right`, grouped by operator precedence
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Leading `-` or trailing `%`
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },
    /// Call with its name upper-cased
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },
    /// `{1,2;3,4}`: rows split by `;`, columns by `,`
    Array(Vec<Vec<FormulaExpr>>),
}

impl FormulaExpr {
    /// Whether any function call in this tree has a name matching `pred`
    pub fn calls_any<F: Fn(&str) -> bool>(&self, pred: &F) -> bool {
        match self {
            FormulaExpr::Function { name, args } => {
                pred(name) || args.iter().any(|a| a.calls_any(pred))
            }
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.calls_any(pred) || right.calls_any(pred)
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.calls_any(pred),
            FormulaExpr::Array(rows) => rows.iter().flatten().any(|e| e.calls_any(pred)),
            _ => false,
        }
    }
}

/// `A1`, `$B$2`, `Data.C3` or `'My Sheet'!D4`
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub address: CellAddress,
}

/// `A1:B5`; the sheet prefix of the first corner applies to both
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub sheet: Option<String>,
    pub range: CellRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Percent,
}
