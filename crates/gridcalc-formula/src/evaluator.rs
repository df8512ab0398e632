//! Formula evaluator
//!
//! Evaluates formula ASTs against a [`WorkbookView`]. Referenced cells that hold formulas
//! are evaluated recursively through a [`CycleGuard`] shared by every nested call of one
//! top-level evaluation.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::coerce::{classify_number, coerce_number, compare_values};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{FunctionRegistry, Implementation};
use crate::parser::parse_formula;
use ahash::AHashSet;
use chrono::NaiveDateTime;
use gridcalc_core::{
    format_number, CellAddress, CellError, CellRange, CellValue, SheetId, SheetReference,
    WorkbookView,
};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, trace, warn};

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// The built-in function registry
pub fn function_registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Whether evaluating `expr` depends on something other than the grid (clock, text references)
pub fn is_volatile(expr: &FormulaExpr) -> bool {
    let registry = function_registry();
    expr.calls_any(&|name: &str| registry.get(name).map_or(false, |f| f.volatile))
}

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    /// A range or array literal, row-major
    Array(Vec<Vec<FormulaValue>>),
    Empty,
}

impl FormulaValue {
    /// Convert to number, if possible (text is parsed, empty is 0)
    pub fn as_number(&self) -> Option<f64> {
        coerce_number(self)
    }

    /// Convert to string for concatenation and text functions
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => format_number(*n),
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(_) => self.scalar().as_string(),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Non-empty in the COUNTA sense
    pub fn is_blank(&self) -> bool {
        match self {
            FormulaValue::Empty => true,
            FormulaValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Reduce an array to its top-left value; scalars are returned unchanged
    pub fn scalar(&self) -> FormulaValue {
        match self {
            FormulaValue::Array(rows) => rows
                .first()
                .and_then(|r| r.first())
                .map(FormulaValue::scalar)
                .unwrap_or(FormulaValue::Empty),
            other => other.clone(),
        }
    }
}

impl From<&CellValue> for FormulaValue {
    fn from(value: &CellValue) -> Self {
        if let Some(e) = value.error() {
            return FormulaValue::Error(e);
        }
        match value {
            CellValue::Empty => FormulaValue::Empty,
            CellValue::Number(n) => FormulaValue::Number(*n),
            CellValue::String(s) => FormulaValue::String(s.clone()),
            CellValue::Boolean(b) => FormulaValue::Boolean(*b),
            CellValue::Error(e) => FormulaValue::Error(*e),
        }
    }
}

impl From<FormulaValue> for CellValue {
    fn from(value: FormulaValue) -> Self {
        match value {
            FormulaValue::Empty => CellValue::Empty,
            FormulaValue::Number(n) => CellValue::Number(n),
            FormulaValue::String(s) => CellValue::String(s),
            FormulaValue::Boolean(b) => CellValue::Boolean(b),
            FormulaValue::Error(e) => CellValue::Error(e),
            array @ FormulaValue::Array(_) => array.scalar().into(),
        }
    }
}

/// Evaluation settings
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOptions {
    /// Maximum number of nested formula-cell evaluations
    pub max_depth: usize,
    /// Clock override for TODAY()/NOW()
    pub now: Option<NaiveDateTime>,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            max_depth: 128,
            now: None,
        }
    }
}

/// Identity of a cell across sheets
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub sheet: SheetId,
    pub row: u32,
    pub col: u16,
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sheet, CellAddress::new(self.row, self.col))
    }
}

/// The set of formula cells currently on the evaluation stack
///
/// One guard lives for one top-level evaluation and is shared by reference with every
/// nested evaluation. [`CycleGuard::enter`] hands out a token that releases the cell
/// when dropped, so the set is empty again whenever the top-level call returns.
#[derive(Debug, Default)]
pub struct CycleGuard {
    active: RefCell<AHashSet<CellKey>>,
    depth: Cell<usize>,
}

impl CycleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a cell as being evaluated
    ///
    /// Fails with `CircularReference` if it already is, or with `DepthLimit` when
    /// `max_depth` cells are already active.
    pub fn enter(&self, key: CellKey, max_depth: usize) -> FormulaResult<GuardToken<'_>> {
        if self.active.borrow().contains(&key) {
            debug!(cell = %key, "circular reference detected");
            return Err(FormulaError::CircularReference(key.to_string()));
        }
        if self.depth.get() >= max_depth {
            warn!(cell = %key, max_depth, "evaluation depth limit reached");
            return Err(FormulaError::DepthLimit(max_depth));
        }

        self.active.borrow_mut().insert(key.clone());
        self.depth.set(self.depth.get() + 1);
        Ok(GuardToken { guard: self, key })
    }

    /// Whether a cell is currently being evaluated
    pub fn is_active(&self, key: &CellKey) -> bool {
        self.active.borrow().contains(key)
    }

    /// Number of cells currently being evaluated
    pub fn depth(&self) -> usize {
        self.depth.get()
    }
}

/// Releases its cell from the [`CycleGuard`] on drop
#[derive(Debug)]
pub struct GuardToken<'g> {
    guard: &'g CycleGuard,
    key: CellKey,
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.guard.active.borrow_mut().remove(&self.key);
        self.guard.depth.set(self.guard.depth.get().saturating_sub(1));
    }
}

/// Context for formula evaluation
pub struct EvaluationContext<'a> {
    /// Workbook the formula reads from
    pub workbook: &'a dyn WorkbookView,
    /// Sheet that unqualified references resolve against
    pub sheet_id: SheetId,
    /// The cell holding the formula, when known (row, col)
    pub current_cell: Option<(u32, u16)>,
    /// Evaluation settings
    pub options: &'a EvaluationOptions,
    guard: &'a CycleGuard,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(
        workbook: &'a dyn WorkbookView,
        sheet_id: SheetId,
        options: &'a EvaluationOptions,
        guard: &'a CycleGuard,
    ) -> Self {
        Self {
            workbook,
            sheet_id,
            current_cell: None,
            options,
            guard,
        }
    }

    /// Set the calling cell (used by ROW()/COLUMN() without arguments)
    pub fn with_current_cell(mut self, row: u32, col: u16) -> Self {
        self.current_cell = Some((row, col));
        self
    }

    /// The cycle guard shared by this evaluation
    pub fn guard(&self) -> &CycleGuard {
        self.guard
    }

    /// Current time, honouring the configured override
    pub fn now(&self) -> NaiveDateTime {
        self.options
            .now
            .unwrap_or_else(|| chrono::Local::now().naive_local())
    }

    /// Resolve an optional sheet name to an id; `None` means no such sheet
    pub fn resolve_sheet(&self, name: Option<&str>) -> Option<SheetId> {
        match name {
            None if self.workbook.contains_sheet(&self.sheet_id) => Some(self.sheet_id.clone()),
            None => None,
            Some(name) => self.workbook.sheet_id_by_name(name).cloned(),
        }
    }

    /// Value of one cell, evaluating its formula if it has one
    pub fn cell_value(&self, sheet: &SheetId, row: u32, col: u16) -> FormulaValue {
        let cell = match self.workbook.cell(sheet, row, col) {
            Some(cell) => cell,
            None => return FormulaValue::Empty,
        };

        let formula = match cell.formula_text() {
            Some(formula) => formula,
            None => return cell.literal().into(),
        };

        let key = CellKey {
            sheet: sheet.clone(),
            row,
            col,
        };
        let _token = match self.guard.enter(key, self.options.max_depth) {
            Ok(token) => token,
            Err(e) => return FormulaValue::Error(e.to_cell_error()),
        };

        trace!(sheet = %sheet, row, col, formula, "evaluating referenced cell");
        let nested = EvaluationContext {
            workbook: self.workbook,
            sheet_id: sheet.clone(),
            current_cell: Some((row, col)),
            options: self.options,
            guard: self.guard,
        };
        nested.evaluate_formula_text(formula)
    }

    /// Values of a rectangular range, row-major
    ///
    /// A range of more than [`MAX_MATERIALISED_CELLS`] positions is clipped to the sheet's
    /// used area first; the cut-off part is empty, so aggregates are unchanged.
    pub fn range_values(&self, sheet: &SheetId, range: &CellRange) -> FormulaValue {
        let size = range.row_count() as u64 * range.col_count() as u64;
        let range = if size > MAX_MATERIALISED_CELLS {
            let clipped = clip_to_used(range, self.workbook.used_extent(sheet));
            debug!(sheet = %sheet, %range, clipped = ?clipped, "clipping oversized range");
            match clipped {
                Some(clipped) => clipped,
                None => return FormulaValue::Array(vec![vec![FormulaValue::Empty]]),
            }
        } else {
            *range
        };

        let rows = (range.start.row..=range.end.row)
            .map(|row| {
                (range.start.col..=range.end.col)
                    .map(|col| self.cell_value(sheet, row, col))
                    .collect()
            })
            .collect();
        FormulaValue::Array(rows)
    }

    /// Value of a parsed reference; a single cell yields a scalar, a range an array
    pub fn reference_value(&self, reference: &SheetReference) -> FormulaValue {
        let sheet = match self.resolve_sheet(reference.sheet_name.as_deref()) {
            Some(sheet) => sheet,
            None => return FormulaValue::Error(CellError::Ref),
        };

        if reference.range.is_single_cell() {
            let addr = reference.range.start;
            self.cell_value(&sheet, addr.row, addr.col)
        } else {
            self.range_values(&sheet, &reference.range)
        }
    }

    /// Evaluate formula text to a scalar; failures become error sentinels
    ///
    /// A body that does not parse and holds no operator, bracket, comma or quote is
    /// surfaced as literal text.
    pub fn evaluate_formula_text(&self, formula: &str) -> FormulaValue {
        let expr = match parse_formula(formula) {
            Ok(expr) => expr,
            Err(e) => {
                let body = formula.trim().strip_prefix('=').unwrap_or(formula).trim();
                if !body.is_empty() && !body.contains(OPERATOR_CHARS) {
                    return FormulaValue::String(body.to_string());
                }
                debug!(formula, error = %e, "formula failed to parse");
                return FormulaValue::Error(CellError::Error);
            }
        };

        match evaluate(&expr, self) {
            Ok(value) => value.scalar(),
            Err(e) => {
                debug!(formula, error = %e, "formula evaluation failed");
                FormulaValue::Error(e.to_cell_error())
            }
        }
    }
}

/// Largest range, in cells, that is materialised as written
pub const MAX_MATERIALISED_CELLS: u64 = 1 << 20;

/// The part of `range` inside a used area of `(rows, cols)`; `None` when they do not meet
fn clip_to_used(range: &CellRange, (rows, cols): (u32, u16)) -> Option<CellRange> {
    if rows == 0 || cols == 0 || range.start.row >= rows || range.start.col >= cols {
        return None;
    }
    Some(CellRange::from_indices(
        range.start.row,
        range.start.col,
        range.end.row.min(rows - 1),
        range.end.col.min(cols - 1),
    ))
}

const OPERATOR_CHARS: &[char] = &[
    '+', '-', '*', '/', '^', '&', '=', '<', '>', '!', '%', ':', '(', ')', ',', '"', '{', '}',
];

/// Evaluate a formula against a sheet of a workbook
///
/// Never fails: every problem is reported as an error sentinel. Text that does not start
/// with `=` is returned unchanged as a string.
///
/// ```
/// use gridcalc_core::{CellValue, SheetId, Workbook};
/// use gridcalc_formula::evaluate_formula;
///
/// let mut wb = Workbook::new();
/// let sheet = SheetId::new("sheet1");
/// wb.sheet_mut(&sheet).unwrap().set_input("A1", "10").unwrap();
///
/// assert_eq!(evaluate_formula("=A1*2", &wb, &sheet), CellValue::Number(20.0));
/// assert_eq!(evaluate_formula("plain", &wb, &sheet), CellValue::string("plain"));
/// ```
pub fn evaluate_formula(formula: &str, workbook: &dyn WorkbookView, sheet_id: &SheetId) -> CellValue {
    evaluate_formula_with(formula, workbook, sheet_id, &EvaluationOptions::default())
}

/// [`evaluate_formula`] with explicit options
pub fn evaluate_formula_with(
    formula: &str,
    workbook: &dyn WorkbookView,
    sheet_id: &SheetId,
    options: &EvaluationOptions,
) -> CellValue {
    if !formula.trim_start().starts_with('=') {
        return CellValue::String(formula.to_string());
    }

    let guard = CycleGuard::new();
    let ctx = EvaluationContext::new(workbook, sheet_id.clone(), options, &guard);
    ctx.evaluate_formula_text(formula).into()
}

/// Evaluate the cell stored at (row, col), with that cell as the calling cell
///
/// The cell itself seeds the cycle guard, so a formula that refers back to its own cell
/// yields `#CIRCULAR!`. Literal cells return their value.
pub fn evaluate_cell(
    workbook: &dyn WorkbookView,
    sheet_id: &SheetId,
    row: u32,
    col: u16,
    options: &EvaluationOptions,
) -> CellValue {
    let cell = match workbook.cell(sheet_id, row, col) {
        Some(cell) => cell,
        None => return CellValue::Empty,
    };
    let formula = match cell.formula_text() {
        Some(formula) => formula,
        None => return cell.literal().clone(),
    };

    evaluate_formula_at(formula, workbook, sheet_id, row, col, options)
}

/// Evaluate a formula as if it were stored at (row, col)
///
/// That position is the calling cell for ROW()/COLUMN() and seeds the cycle guard, so
/// a reference back to it yields `#CIRCULAR!`. Text that does not start with `=` is
/// returned unchanged as a string.
pub fn evaluate_formula_at(
    formula: &str,
    workbook: &dyn WorkbookView,
    sheet_id: &SheetId,
    row: u32,
    col: u16,
    options: &EvaluationOptions,
) -> CellValue {
    if !formula.trim_start().starts_with('=') {
        return CellValue::String(formula.to_string());
    }

    let guard = CycleGuard::new();
    let key = CellKey {
        sheet: sheet_id.clone(),
        row,
        col,
    };
    let _token = match guard.enter(key, options.max_depth) {
        Ok(token) => token,
        Err(e) => return CellValue::Error(e.to_cell_error()),
    };

    let ctx = EvaluationContext::new(workbook, sheet_id.clone(), options, &guard)
        .with_current_cell(row, col);
    ctx.evaluate_formula_text(formula).into()
}

/// Evaluate a formula expression
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaExpr::String(s) => Ok(FormulaValue::String(s.clone())),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Boolean(*b)),
        FormulaExpr::Error(e) => Ok(FormulaValue::Error(*e)),
        FormulaExpr::Name(name) => Ok(FormulaValue::String(name.clone())),

        // === References ===
        FormulaExpr::CellRef(cell_ref) => {
            Ok(match ctx.resolve_sheet(cell_ref.sheet.as_deref()) {
                Some(sheet) => ctx.cell_value(&sheet, cell_ref.address.row, cell_ref.address.col),
                None => FormulaValue::Error(CellError::Ref),
            })
        }

        FormulaExpr::RangeRef(range_ref) => {
            Ok(match ctx.resolve_sheet(range_ref.sheet.as_deref()) {
                Some(sheet) => ctx.range_values(&sheet, &range_ref.range),
                None => FormulaValue::Error(CellError::Ref),
            })
        }

        // === Operators ===
        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),

        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),

        // === Arrays ===
        FormulaExpr::Array(rows) => {
            let mut result_rows = Vec::with_capacity(rows.len());
            for row in rows {
                let mut result_row = Vec::with_capacity(row.len());
                for expr in row {
                    result_row.push(evaluate(expr, ctx)?.scalar());
                }
                result_rows.push(result_row);
            }
            Ok(FormulaValue::Array(result_rows))
        }
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let left_val = evaluate(left, ctx)?.scalar();
    let right_val = evaluate(right, ctx)?.scalar();

    // Errors propagate unchanged, left operand first
    if let Some(e) = left_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }
    if let Some(e) = right_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }

    let ordering = || compare_values(&left_val, &right_val);

    match op {
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Power => {
            let (l, r) = match (left_val.as_number(), right_val.as_number()) {
                (Some(l), Some(r)) => (l, r),
                _ => return Ok(FormulaValue::Error(CellError::Error)),
            };
            Ok(match op {
                BinaryOperator::Add => classify_number(l + r),
                BinaryOperator::Subtract => classify_number(l - r),
                BinaryOperator::Multiply => classify_number(l * r),
                BinaryOperator::Divide if r == 0.0 => FormulaValue::Error(CellError::Div0),
                BinaryOperator::Divide => classify_number(l / r),
                _ => classify_number(l.powf(r)),
            })
        }

        BinaryOperator::Equal => Ok(FormulaValue::Boolean(ordering() == Ordering::Equal)),
        BinaryOperator::NotEqual => Ok(FormulaValue::Boolean(ordering() != Ordering::Equal)),
        BinaryOperator::LessThan => Ok(FormulaValue::Boolean(ordering() == Ordering::Less)),
        BinaryOperator::LessEqual => Ok(FormulaValue::Boolean(ordering() != Ordering::Greater)),
        BinaryOperator::GreaterThan => {
            Ok(FormulaValue::Boolean(ordering() == Ordering::Greater))
        }
        BinaryOperator::GreaterEqual => Ok(FormulaValue::Boolean(ordering() != Ordering::Less)),

        BinaryOperator::Concat => Ok(FormulaValue::String(
            left_val.as_string() + &right_val.as_string(),
        )),
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let val = evaluate(operand, ctx)?.scalar();

    if let Some(e) = val.get_error() {
        return Ok(FormulaValue::Error(e));
    }

    let n = match val.as_number() {
        Some(n) => n,
        None => return Ok(FormulaValue::Error(CellError::Error)),
    };

    Ok(match op {
        UnaryOperator::Negate => FormulaValue::Number(-n),
        UnaryOperator::Percent => FormulaValue::Number(n / 100.0),
    })
}

/// Evaluate a function call
fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let func = function_registry()
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    if args.len() < func.min_args {
        return Err(FormulaError::ArgumentCount {
            function: name.to_string(),
            expected: format!("at least {}", func.min_args),
            actual: args.len(),
        });
    }

    if let Some(max) = func.max_args {
        if args.len() > max {
            return Err(FormulaError::ArgumentCount {
                function: name.to_string(),
                expected: format!("at most {}", max),
                actual: args.len(),
            });
        }
    }

    let result = match func.implementation {
        Implementation::Eager(f) => {
            let mut evaluated_args = Vec::with_capacity(args.len());
            for arg in args {
                evaluated_args.push(evaluate(arg, ctx)?);
            }
            f(&evaluated_args, ctx)
        }
        Implementation::Lazy(f) => f(args, ctx),
    };

    match result {
        Err(FormulaError::Sentinel(e)) => Ok(FormulaValue::Error(e)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;

    fn sheet1() -> SheetId {
        SheetId::new("sheet1")
    }

    fn workbook(cells: &[(&str, &str)]) -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.sheet_mut(&sheet1()).unwrap();
        for (addr, input) in cells {
            sheet.set_input(addr, input).unwrap();
        }
        wb
    }

    fn eval_in(wb: &Workbook, formula: &str) -> CellValue {
        evaluate_formula(formula, wb, &sheet1())
    }

    fn eval(formula: &str) -> CellValue {
        eval_in(&Workbook::new(), formula)
    }

    #[test]
    fn test_whole_sheet_range_is_clipped() {
        let wb = workbook(&[("A1", "1"), ("B2", "2"), ("C3", "=A1+B2")]);
        assert_eq!(eval_in(&wb, "=SUM(A1:XFD1048576)"), CellValue::Number(6.0));
        assert_eq!(eval_in(&wb, "=COUNT(B1:XFD1048576)"), CellValue::Number(2.0));
        assert_eq!(eval_in(&wb, "=SUM(Z100:XFD1048576)"), CellValue::Number(0.0));

        let range = CellRange::from_indices(1, 1, gridcalc_core::MAX_ROWS - 1, 16_383);
        assert_eq!(clip_to_used(&range, (3, 3)), Some(CellRange::from_indices(1, 1, 2, 2)));
        assert_eq!(clip_to_used(&range, (1, 3)), None);
        assert_eq!(clip_to_used(&range, (0, 0)), None);
    }

    #[test]
    fn test_evaluate_formula_at_seeds_calling_cell() {
        let wb = workbook(&[("A1", "5"), ("B2", "=A1")]);
        let options = EvaluationOptions::default();
        assert_eq!(
            evaluate_formula_at("=ROW()*10+COLUMN()", &wb, &sheet1(), 3, 1, &options),
            CellValue::Number(42.0)
        );
        assert_eq!(
            evaluate_formula_at("=B2+1", &wb, &sheet1(), 0, 0, &options),
            CellValue::Number(6.0)
        );
        // the formula stored at the calling cell B2 is already on the stack
        assert_eq!(
            evaluate_formula_at("=B2*2", &wb, &sheet1(), 1, 1, &options),
            CellValue::Error(CellError::Circular)
        );
        assert_eq!(
            evaluate_formula_at("text", &wb, &sheet1(), 0, 0, &options),
            CellValue::string("text")
        );
    }

    #[test]
    fn test_evaluate_literals() {
        assert_eq!(eval("=42"), CellValue::Number(42.0));
        assert_eq!(eval("=\"Hello\""), CellValue::string("Hello"));
        assert_eq!(eval("=TRUE"), CellValue::Boolean(true));
        assert_eq!(eval("=#N/A"), CellValue::Error(CellError::Na));
    }

    #[test]
    fn test_non_formula_passthrough() {
        assert_eq!(eval("123"), CellValue::string("123"));
        assert_eq!(eval("hello =world"), CellValue::string("hello =world"));
        assert_eq!(eval(""), CellValue::string(""));
    }

    #[test]
    fn test_evaluate_arithmetic() {
        assert_eq!(eval("=1+2"), CellValue::Number(3.0));
        assert_eq!(eval("=10-3"), CellValue::Number(7.0));
        assert_eq!(eval("=4*5"), CellValue::Number(20.0));
        assert_eq!(eval("=20/4"), CellValue::Number(5.0));
        assert_eq!(eval("=2^10"), CellValue::Number(1024.0));
        assert_eq!(eval("=1+2*3"), CellValue::Number(7.0));
        assert_eq!(eval("=(1+2)*3"), CellValue::Number(9.0));
        assert_eq!(eval("=2+3*4-5"), CellValue::Number(9.0));
        assert_eq!(eval("=10-4-3"), CellValue::Number(3.0));
        assert_eq!(eval("=-5"), CellValue::Number(-5.0));
        assert_eq!(eval("=--5"), CellValue::Number(5.0));
    }

    #[test]
    fn test_currency_and_percent_literals() {
        assert_eq!(eval("=20%"), CellValue::Number(0.2));
        assert_eq!(eval("=$1,234.56+1"), CellValue::Number(1235.56));
        assert_eq!(eval("=\"$5\"*2"), CellValue::Number(10.0));
    }

    #[test]
    fn test_numeric_faults() {
        assert_eq!(eval("=1/0"), CellValue::Error(CellError::Div0));
        assert_eq!(eval("=0^-1"), CellValue::Error(CellError::Div0));
        assert_eq!(eval("=(-8)^0.5"), CellValue::Error(CellError::Num));
        assert_eq!(eval("=\"abc\"+1"), CellValue::Error(CellError::Error));
    }

    #[test]
    fn test_malformed_formulas() {
        assert_eq!(eval("=(1+2"), CellValue::Error(CellError::Error));
        assert_eq!(eval("=NOPE(1)"), CellValue::Error(CellError::Error));
        assert_eq!(eval("=1+"), CellValue::Error(CellError::Error));
        // Unresolved text without operators is surfaced as-is
        assert_eq!(eval("=hello world"), CellValue::string("hello world"));
        assert_eq!(eval("=total"), CellValue::string("total"));
    }

    #[test]
    fn test_comparison_and_concatenation() {
        assert_eq!(eval("=1<2"), CellValue::Boolean(true));
        assert_eq!(eval("=5!=5"), CellValue::Boolean(false));
        assert_eq!(eval("=\"a\"=\"A\""), CellValue::Boolean(true));
        assert_eq!(eval("=\"Value: \"&42"), CellValue::string("Value: 42"));
        assert_eq!(eval("=\"x\"&TRUE"), CellValue::string("xTRUE"));
    }

    #[test]
    fn test_cell_references() {
        let wb = workbook(&[("A1", "10"), ("B1", "0"), ("C1", "=A1*2"), ("D1", "#REF!")]);
        assert_eq!(eval_in(&wb, "=A1/B1"), CellValue::Error(CellError::Div0));
        assert_eq!(eval_in(&wb, "=C1+1"), CellValue::Number(21.0));
        assert_eq!(eval_in(&wb, "=$A$1"), CellValue::Number(10.0));
        assert_eq!(eval_in(&wb, "=Z99"), CellValue::Empty);
        assert_eq!(eval_in(&wb, "=Z99+1"), CellValue::Number(1.0));
        assert_eq!(eval_in(&wb, "=D1+1"), CellValue::Error(CellError::Ref));
    }

    #[test]
    fn test_error_propagates_through_concatenation() {
        let wb = workbook(&[("A1", "='Missing'.B2")]);
        assert_eq!(
            eval_in(&wb, "=\"Total: \"&A1"),
            CellValue::Error(CellError::Ref)
        );
    }

    #[test]
    fn test_cross_sheet_reference() {
        let mut wb = workbook(&[]);
        let data = wb.add_sheet("Data").unwrap();
        wb.sheet_mut(&data).unwrap().set_input("B2", "42").unwrap();
        wb.sheet_mut(&data).unwrap().set_input("C2", "=B2+A1").unwrap();
        wb.sheet_mut(&data).unwrap().set_input("A1", "1").unwrap();

        assert_eq!(eval_in(&wb, "='Data'.B2"), CellValue::Number(42.0));
        assert_eq!(eval_in(&wb, "=Data!B2"), CellValue::Number(42.0));
        // C2's own A1 resolves on Data, not on the calling sheet
        assert_eq!(eval_in(&wb, "=Data.C2"), CellValue::Number(43.0));
        assert_eq!(eval_in(&wb, "='Nope'.B2"), CellValue::Error(CellError::Ref));
    }

    #[test]
    fn test_missing_current_sheet_is_ref_error() {
        let wb = Workbook::new();
        assert_eq!(
            evaluate_formula("=A1", &wb, &SheetId::new("gone")),
            CellValue::Error(CellError::Ref)
        );
    }

    #[test]
    fn test_circular_reference() {
        let wb = workbook(&[("A1", "=B1"), ("B1", "=A1")]);
        assert_eq!(eval_in(&wb, "=B1"), CellValue::Error(CellError::Circular));

        let wb = workbook(&[("A1", "=A1+1")]);
        assert_eq!(
            evaluate_cell(&wb, &sheet1(), 0, 0, &EvaluationOptions::default()),
            CellValue::Error(CellError::Circular)
        );
    }

    #[test]
    fn test_diamond_is_not_circular() {
        // B1 and C1 both read A1; siblings must not see each other as cycles
        let wb = workbook(&[("A1", "5"), ("B1", "=A1"), ("C1", "=A1"), ("D1", "=B1+C1")]);
        assert_eq!(eval_in(&wb, "=D1"), CellValue::Number(10.0));
    }

    #[test]
    fn test_guard_is_released() {
        let wb = workbook(&[("A1", "=B1"), ("B1", "=A1"), ("C1", "1")]);
        let options = EvaluationOptions::default();
        let guard = CycleGuard::new();
        let ctx = EvaluationContext::new(&wb, sheet1(), &options, &guard);

        assert_eq!(
            ctx.evaluate_formula_text("=A1"),
            FormulaValue::Error(CellError::Circular)
        );
        assert_eq!(guard.depth(), 0);
        assert!(!guard.is_active(&CellKey {
            sheet: sheet1(),
            row: 0,
            col: 0
        }));
    }

    #[test]
    fn test_depth_limit() {
        let mut cells = vec![("A1".to_string(), "1".to_string())];
        for row in 2..=20 {
            cells.push((format!("A{row}"), format!("=A{}+1", row - 1)));
        }
        let mut wb = Workbook::new();
        let sheet = wb.sheet_mut(&sheet1()).unwrap();
        for (addr, input) in &cells {
            sheet.set_input(addr, input).unwrap();
        }

        assert_eq!(eval_in(&wb, "=A20"), CellValue::Number(20.0));

        let shallow = EvaluationOptions {
            max_depth: 5,
            ..EvaluationOptions::default()
        };
        assert_eq!(
            evaluate_formula_with("=A20", &wb, &sheet1(), &shallow),
            CellValue::Error(CellError::Error)
        );
    }

    #[test]
    fn test_array_result_is_top_left() {
        assert_eq!(eval("={7,8;9,10}"), CellValue::Number(7.0));
        let wb = workbook(&[("A1", "3"), ("A2", "4")]);
        assert_eq!(eval_in(&wb, "=A1:A2"), CellValue::Number(3.0));
    }

    #[test]
    fn test_idempotent() {
        let wb = workbook(&[("A1", "1"), ("A2", "=A1*3"), ("A3", "=SUM(A1:A2)")]);
        let first = eval_in(&wb, "=A3&\"!\"");
        let second = eval_in(&wb, "=A3&\"!\"");
        assert_eq!(first, second);
        assert_eq!(first, CellValue::string("4!"));
    }

    #[test]
    fn test_is_volatile() {
        assert!(is_volatile(&parse_formula("=NOW()+1").unwrap()));
        assert!(is_volatile(&parse_formula("=IF(A1,INDIRECT(\"B1\"),0)").unwrap()));
        assert!(!is_volatile(&parse_formula("=SUM(A1:A3)").unwrap()));
    }
}
