//! Math functions

use super::{number_arg, opt_number_arg, raise};
use crate::coerce::classify_number;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use gridcalc_core::CellError;

/// Scale by `10^digits`, apply `op`, scale back
fn round_with(args: &[FormulaValue], op: fn(f64) -> f64) -> FormulaResult<FormulaValue> {
    let n = number_arg(args, 0)?;
    let digits = opt_number_arg(args, 1, 0.0)?.trunc();
    let factor = 10f64.powf(digits);
    Ok(classify_number(op(n * factor) / factor))
}

/// ROUND(number, [digits]) - Round half away from zero
pub fn fn_round(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    round_with(args, f64::round)
}

/// ROUNDUP(number, [digits]) - Round toward positive infinity
pub fn fn_roundup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    round_with(args, f64::ceil)
}

/// ROUNDDOWN(number, [digits]) - Round toward negative infinity
pub fn fn_rounddown(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    round_with(args, f64::floor)
}

/// ABS(number)
pub fn fn_abs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(number_arg(args, 0)?.abs()))
}

/// SQRT(number) - `#NUM!` for negative input
pub fn fn_sqrt(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let n = number_arg(args, 0)?;
    if n < 0.0 {
        return raise(CellError::Num);
    }
    Ok(FormulaValue::Number(n.sqrt()))
}

/// POWER(base, exponent)
pub fn fn_power(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let base = number_arg(args, 0)?;
    let exponent = number_arg(args, 1)?;
    Ok(classify_number(base.powf(exponent)))
}

/// MOD(number, divisor) - Remainder with the sign of the divisor
pub fn fn_mod(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let n = number_arg(args, 0)?;
    let d = number_arg(args, 1)?;
    if d == 0.0 {
        return raise(CellError::Div0);
    }
    Ok(FormulaValue::Number(n - d * (n / d).floor()))
}

/// INT(number) - Round down to the nearest integer
pub fn fn_int(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(number_arg(args, 0)?.floor()))
}
