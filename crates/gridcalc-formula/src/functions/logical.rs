//! Logical functions
//!
//! IF, AND, OR and IFERROR receive their arguments unevaluated so that only the
//! branches they select are computed.

use super::{raise, scalar_arg};
use crate::ast::FormulaExpr;
use crate::coerce::coerce_bool;
use crate::error::FormulaResult;
use crate::evaluator::{evaluate, EvaluationContext, FormulaValue};
use gridcalc_core::CellError;

/// Truthiness of a scalar; errors are raised, non-booleans are `#ERROR!`
fn truth(value: &FormulaValue) -> FormulaResult<bool> {
    if let Some(e) = value.get_error() {
        return raise(e);
    }
    match coerce_bool(value) {
        Some(b) => Ok(b),
        None => raise(CellError::Error),
    }
}

fn condition(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<bool> {
    truth(&evaluate(expr, ctx)?.scalar())
}

/// The truth values one AND/OR argument contributes
///
/// Inside a range, blanks and text are ignored.
fn arg_conditions(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<Vec<bool>> {
    match evaluate(expr, ctx)? {
        FormulaValue::Array(rows) => {
            let mut out = Vec::new();
            for value in rows.iter().flatten() {
                match value {
                    FormulaValue::Error(e) => return raise(*e),
                    FormulaValue::Boolean(b) => out.push(*b),
                    FormulaValue::Number(n) => out.push(*n != 0.0),
                    _ => {}
                }
            }
            Ok(out)
        }
        scalar => truth(&scalar).map(|b| vec![b]),
    }
}

/// IF(condition, value_if_true, [value_if_false])
///
/// Only the selected branch is evaluated. A missing false branch yields FALSE.
pub fn fn_if(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    if condition(&args[0], ctx)? {
        evaluate(&args[1], ctx)
    } else {
        match args.get(2) {
            Some(expr) => evaluate(expr, ctx),
            None => Ok(FormulaValue::Boolean(false)),
        }
    }
}

/// AND(logical1, [logical2], ...) - Stops at the first false argument
pub fn fn_and(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    for arg in args {
        if arg_conditions(arg, ctx)?.contains(&false) {
            return Ok(FormulaValue::Boolean(false));
        }
    }
    Ok(FormulaValue::Boolean(true))
}

/// OR(logical1, [logical2], ...) - Stops at the first true argument
pub fn fn_or(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    for arg in args {
        if arg_conditions(arg, ctx)?.contains(&true) {
            return Ok(FormulaValue::Boolean(true));
        }
    }
    Ok(FormulaValue::Boolean(false))
}

/// NOT(logical)
pub fn fn_not(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match coerce_bool(&scalar_arg(args, 0)?) {
        Some(b) => Ok(FormulaValue::Boolean(!b)),
        None => raise(CellError::Error),
    }
}

/// IFERROR(value, value_if_error)
///
/// Any failure while computing `value` (including an unknown function or a cycle)
/// selects the fallback.
pub fn fn_iferror(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let value = match evaluate(&args[0], ctx) {
        Ok(value) => value,
        Err(e) => FormulaValue::Error(e.to_cell_error()),
    };
    if value.scalar().is_error() {
        evaluate(&args[1], ctx)
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{eval, eval_with};
    use gridcalc_core::{CellError, CellValue};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_if() {
        let cells = &[("A1", "10")];
        assert_eq!(eval_with(cells, "=IF(A1>5,\"big\",\"small\")"), CellValue::string("big"));
        assert_eq!(eval_with(cells, "=IF(A1<>10,1,2)"), CellValue::Number(2.0));
        assert_eq!(eval_with(cells, "=IF(A1!=10,1,2)"), CellValue::Number(2.0));
        assert_eq!(eval_with(cells, "=IF(A1>=10,1)"), CellValue::Number(1.0));
        assert_eq!(eval_with(cells, "=IF(A1<=5,1)"), CellValue::Boolean(false));
        assert_eq!(eval("=IF(1/0,1,2)"), CellValue::Error(CellError::Div0));
        assert_eq!(eval("=IF(\"maybe\",1,2)"), CellValue::Error(CellError::Error));
    }

    #[test]
    fn test_if_is_lazy() {
        // The unselected branch would fail if it were evaluated
        assert_eq!(eval("=IF(TRUE,1,NOPE())"), CellValue::Number(1.0));
        assert_eq!(eval("=IF(FALSE,1/0,2)"), CellValue::Number(2.0));
        let cells = &[("A1", "=A1")];
        assert_eq!(eval_with(cells, "=IF(FALSE,A1,3)"), CellValue::Number(3.0));
    }

    #[test]
    fn test_and_or_short_circuit() {
        assert_eq!(eval("=AND(TRUE,1,2>1)"), CellValue::Boolean(true));
        assert_eq!(eval("=AND(TRUE,FALSE,1/0)"), CellValue::Boolean(false));
        assert_eq!(eval("=OR(FALSE,0)"), CellValue::Boolean(false));
        assert_eq!(eval("=OR(1=1,NOPE())"), CellValue::Boolean(true));
        assert_eq!(eval("=AND(1/0,TRUE)"), CellValue::Error(CellError::Div0));
    }

    #[test]
    fn test_and_or_over_ranges() {
        let cells = &[("A1", "TRUE"), ("A2", "1"), ("A3", "note")];
        assert_eq!(eval_with(cells, "=AND(A1:A3)"), CellValue::Boolean(true));
        let cells = &[("A1", "TRUE"), ("A2", "0")];
        assert_eq!(eval_with(cells, "=AND(A1:A2)"), CellValue::Boolean(false));
        assert_eq!(eval_with(cells, "=OR(A1:A2)"), CellValue::Boolean(true));
    }

    #[test]
    fn test_not() {
        assert_eq!(eval("=NOT(TRUE)"), CellValue::Boolean(false));
        assert_eq!(eval("=NOT(0)"), CellValue::Boolean(true));
        assert_eq!(eval("=NOT(#N/A)"), CellValue::Error(CellError::Na));
    }

    #[test]
    fn test_iferror() {
        assert_eq!(eval("=IFERROR(1/0,\"oops\")"), CellValue::string("oops"));
        assert_eq!(eval("=IFERROR(NOPE(),0)"), CellValue::Number(0.0));
        assert_eq!(eval("=IFERROR(5,0)"), CellValue::Number(5.0));
        let cells = &[("A1", "=B1"), ("B1", "=A1")];
        assert_eq!(eval_with(cells, "=IFERROR(A1,-1)"), CellValue::Number(-1.0));
    }
}
