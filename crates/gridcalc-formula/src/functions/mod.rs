//! Built-in spreadsheet functions

pub mod criteria;
pub mod date;
pub mod financial;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod reference;
pub mod statistical;
pub mod text;

use crate::ast::FormulaExpr;
use crate::coerce::{coerce_bool, parse_number};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{EvaluationContext, FormulaValue};
use gridcalc_core::CellError;
use std::collections::HashMap;

/// Signature of a function that receives evaluated arguments
pub type EagerFn = fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// Signature of a function that decides itself which arguments to evaluate
pub type LazyFn = fn(&[FormulaExpr], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// How a function consumes its arguments
#[derive(Clone, Copy)]
pub enum Implementation {
    /// Every argument is evaluated left to right before the call
    Eager(EagerFn),
    /// Arguments are passed unevaluated (IF, AND, OR, IFERROR, ROW, COLUMN)
    Lazy(LazyFn),
}

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: Implementation,
    /// Result depends on something other than the grid
    pub volatile: bool,
}

impl FunctionDef {
    fn eager(name: &'static str, min_args: usize, max_args: Option<usize>, f: EagerFn) -> Self {
        Self {
            name,
            min_args,
            max_args,
            implementation: Implementation::Eager(f),
            volatile: false,
        }
    }

    fn lazy(name: &'static str, min_args: usize, max_args: Option<usize>, f: LazyFn) -> Self {
        Self {
            name,
            min_args,
            max_args,
            implementation: Implementation::Lazy(f),
            volatile: false,
        }
    }

    fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        registry.register_statistical_functions();
        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_lookup_functions();
        registry.register_financial_functions();
        registry.register_date_functions();
        registry.register_text_functions();
        registry.register_conditional_functions();
        registry.register_reference_functions();

        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    /// Names of all registered functions, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.values().map(|f| f.name).collect();
        names.sort_unstable();
        names
    }

    fn register_statistical_functions(&mut self) {
        self.register(FunctionDef::eager("SUM", 1, None, statistical::fn_sum));
        self.register(FunctionDef::eager("AVERAGE", 1, None, statistical::fn_average));
        self.register(FunctionDef::eager("COUNT", 1, None, statistical::fn_count));
        self.register(FunctionDef::eager("COUNTA", 1, None, statistical::fn_counta));
        self.register(FunctionDef::eager("MAX", 1, None, statistical::fn_max));
        self.register(FunctionDef::eager("MIN", 1, None, statistical::fn_min));
        self.register(FunctionDef::eager("STDEV", 1, None, statistical::fn_stdev));
        self.register(FunctionDef::eager("VAR", 1, None, statistical::fn_var));
        self.register(FunctionDef::eager("MEDIAN", 1, None, statistical::fn_median));
    }

    fn register_math_functions(&mut self) {
        self.register(FunctionDef::eager("ROUND", 1, Some(2), math::fn_round));
        self.register(FunctionDef::eager("ROUNDUP", 1, Some(2), math::fn_roundup));
        self.register(FunctionDef::eager("ROUNDDOWN", 1, Some(2), math::fn_rounddown));
        self.register(FunctionDef::eager("ABS", 1, Some(1), math::fn_abs));
        self.register(FunctionDef::eager("SQRT", 1, Some(1), math::fn_sqrt));
        self.register(FunctionDef::eager("POWER", 2, Some(2), math::fn_power));
        self.register(FunctionDef::eager("MOD", 2, Some(2), math::fn_mod));
        self.register(FunctionDef::eager("INT", 1, Some(1), math::fn_int));
    }

    fn register_logical_functions(&mut self) {
        self.register(FunctionDef::lazy("IF", 2, Some(3), logical::fn_if));
        self.register(FunctionDef::lazy("AND", 1, None, logical::fn_and));
        self.register(FunctionDef::lazy("OR", 1, None, logical::fn_or));
        self.register(FunctionDef::eager("NOT", 1, Some(1), logical::fn_not));
        self.register(FunctionDef::lazy("IFERROR", 2, Some(2), logical::fn_iferror));
    }

    fn register_lookup_functions(&mut self) {
        self.register(FunctionDef::eager("VLOOKUP", 3, Some(4), lookup::fn_vlookup));
        self.register(FunctionDef::eager("HLOOKUP", 3, Some(4), lookup::fn_hlookup));
        self.register(FunctionDef::eager("INDEX", 2, Some(3), lookup::fn_index));
        self.register(FunctionDef::eager("MATCH", 2, Some(3), lookup::fn_match));
    }

    fn register_financial_functions(&mut self) {
        self.register(FunctionDef::eager("NPV", 2, None, financial::fn_npv));
        self.register(FunctionDef::eager("IRR", 1, Some(2), financial::fn_irr));
        self.register(FunctionDef::eager("PMT", 3, Some(5), financial::fn_pmt));
        self.register(FunctionDef::eager("PV", 3, Some(5), financial::fn_pv));
        self.register(FunctionDef::eager("FV", 3, Some(5), financial::fn_fv));
    }

    fn register_date_functions(&mut self) {
        self.register(FunctionDef::eager("TODAY", 0, Some(0), date::fn_today).volatile());
        self.register(FunctionDef::eager("NOW", 0, Some(0), date::fn_now).volatile());
        self.register(FunctionDef::eager("DATE", 3, Some(3), date::fn_date));
        self.register(FunctionDef::eager("YEAR", 1, Some(1), date::fn_year));
        self.register(FunctionDef::eager("MONTH", 1, Some(1), date::fn_month));
        self.register(FunctionDef::eager("DAY", 1, Some(1), date::fn_day));
    }

    fn register_text_functions(&mut self) {
        self.register(FunctionDef::eager("CONCATENATE", 1, None, text::fn_concatenate));
        self.register(FunctionDef::eager("LEFT", 1, Some(2), text::fn_left));
        self.register(FunctionDef::eager("RIGHT", 1, Some(2), text::fn_right));
        self.register(FunctionDef::eager("MID", 3, Some(3), text::fn_mid));
        self.register(FunctionDef::eager("LEN", 1, Some(1), text::fn_len));
        self.register(FunctionDef::eager("UPPER", 1, Some(1), text::fn_upper));
        self.register(FunctionDef::eager("LOWER", 1, Some(1), text::fn_lower));
        self.register(FunctionDef::eager("TRIM", 1, Some(1), text::fn_trim));
    }

    fn register_conditional_functions(&mut self) {
        self.register(FunctionDef::eager("SUMIF", 2, Some(3), criteria::fn_sumif));
        self.register(FunctionDef::eager("COUNTIF", 2, Some(2), criteria::fn_countif));
        self.register(FunctionDef::eager("AVERAGEIF", 2, Some(3), criteria::fn_averageif));
    }

    fn register_reference_functions(&mut self) {
        self.register(FunctionDef::lazy("ROW", 0, Some(1), reference::fn_row));
        self.register(FunctionDef::lazy("COLUMN", 0, Some(1), reference::fn_column));
        self.register(FunctionDef::eager("INDIRECT", 1, Some(1), reference::fn_indirect).volatile());
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// === Argument helpers ===
//
// An error value in an argument is raised as `FormulaError::Sentinel`, which the
// evaluator turns back into the call's result. `?` therefore propagates argument errors.

/// Raise an error sentinel as the result of the current call
pub(crate) fn raise<T>(error: CellError) -> FormulaResult<T> {
    Err(FormulaError::Sentinel(error))
}

/// The scalar at `index`, with errors raised
pub(crate) fn scalar_arg(args: &[FormulaValue], index: usize) -> FormulaResult<FormulaValue> {
    let value = args.get(index).map(FormulaValue::scalar).unwrap_or(FormulaValue::Empty);
    match value {
        FormulaValue::Error(e) => raise(e),
        other => Ok(other),
    }
}

/// A numeric argument; non-numeric text is `#ERROR!`
pub(crate) fn number_arg(args: &[FormulaValue], index: usize) -> FormulaResult<f64> {
    match scalar_arg(args, index)?.as_number() {
        Some(n) => Ok(n),
        None => raise(CellError::Error),
    }
}

/// An optional numeric argument; missing or blank yields `default`
pub(crate) fn opt_number_arg(args: &[FormulaValue], index: usize, default: f64) -> FormulaResult<f64> {
    match args.get(index) {
        None => Ok(default),
        Some(v) if v.scalar().is_blank() => Ok(default),
        Some(_) => number_arg(args, index),
    }
}

/// A text argument in its display form
pub(crate) fn text_arg(args: &[FormulaValue], index: usize) -> FormulaResult<String> {
    Ok(scalar_arg(args, index)?.as_string())
}

/// An optional boolean argument
pub(crate) fn opt_bool_arg(args: &[FormulaValue], index: usize, default: bool) -> FormulaResult<bool> {
    if index >= args.len() {
        return Ok(default);
    }
    match coerce_bool(&scalar_arg(args, index)?) {
        Some(b) => Ok(b),
        None => raise(CellError::Error),
    }
}

/// An argument as a 2-D grid; scalars become a 1x1 grid
pub(crate) fn grid_arg(args: &[FormulaValue], index: usize) -> Vec<Vec<FormulaValue>> {
    match args.get(index) {
        Some(FormulaValue::Array(rows)) => rows.clone(),
        Some(other) => vec![vec![other.clone()]],
        None => Vec::new(),
    }
}

/// All values of the arguments, ranges flattened row-major
pub(crate) fn flatten(args: &[FormulaValue]) -> impl Iterator<Item = &FormulaValue> {
    args.iter().flat_map(|arg| -> Box<dyn Iterator<Item = &FormulaValue> + '_> {
        match arg {
            FormulaValue::Array(rows) => Box::new(rows.iter().flatten()),
            scalar => Box::new(std::iter::once(scalar)),
        }
    })
}

/// The numbers an aggregate consumes
///
/// Numbers and numeric text count; other text, blanks and (inside ranges) booleans are
/// skipped. Booleans given directly count as 1/0. The first error is raised.
pub(crate) fn numbers(args: &[FormulaValue]) -> FormulaResult<Vec<f64>> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for value in rows.iter().flatten() {
                    match value {
                        FormulaValue::Number(n) => out.push(*n),
                        FormulaValue::String(s) => out.extend(parse_number(s)),
                        FormulaValue::Error(e) => return raise(*e),
                        _ => {}
                    }
                }
            }
            FormulaValue::Number(n) => out.push(*n),
            FormulaValue::Boolean(b) => out.push(if *b { 1.0 } else { 0.0 }),
            FormulaValue::String(s) => out.extend(parse_number(s)),
            FormulaValue::Error(e) => return raise(*e),
            FormulaValue::Empty => {}
        }
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::evaluator::{evaluate_formula_with, EvaluationOptions};
    use chrono::NaiveDate;
    use gridcalc_core::{CellValue, SheetId, Workbook};

    /// Evaluate `formula` on sheet1 of a workbook holding `cells`, with a fixed clock
    pub fn eval_with(cells: &[(&str, &str)], formula: &str) -> CellValue {
        let mut wb = Workbook::new();
        let sheet_id = SheetId::new("sheet1");
        if let Some(sheet) = wb.sheet_mut(&sheet_id) {
            for (addr, input) in cells {
                sheet.set_input(addr, input).unwrap();
            }
        }
        let options = EvaluationOptions {
            now: NaiveDate::from_ymd_opt(2024, 3, 15).and_then(|d| d.and_hms_opt(18, 0, 0)),
            ..EvaluationOptions::default()
        };
        evaluate_formula_with(formula, &wb, &sheet_id, &options)
    }

    pub fn eval(formula: &str) -> CellValue {
        eval_with(&[], formula)
    }

    pub fn number(value: CellValue) -> f64 {
        match value {
            CellValue::Number(n) => n,
            other => panic!("expected a number, got {other:?}"),
        }
    }
}
