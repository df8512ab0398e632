//! Text functions
//!
//! Positions and lengths count characters, not bytes.

use super::{flatten, number_arg, opt_number_arg, raise, text_arg};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use gridcalc_core::CellError;

/// A character count argument; negative counts are `#ERROR!`
fn count_arg(args: &[FormulaValue], index: usize, default: f64) -> FormulaResult<usize> {
    let n = opt_number_arg(args, index, default)?.trunc();
    if n < 0.0 {
        return raise(CellError::Error);
    }
    Ok(n as usize)
}

/// CONCATENATE(text1, [text2], ...) - Ranges contribute every cell in order
pub fn fn_concatenate(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let mut out = String::new();
    for value in flatten(args) {
        if let Some(e) = value.get_error() {
            return raise(e);
        }
        out.push_str(&value.as_string());
    }
    Ok(FormulaValue::String(out))
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = text_arg(args, 0)?;
    let n = count_arg(args, 1, 1.0)?;
    Ok(FormulaValue::String(text.chars().take(n).collect()))
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = text_arg(args, 0)?;
    let n = count_arg(args, 1, 1.0)?;
    let len = text.chars().count();
    Ok(FormulaValue::String(text.chars().skip(len.saturating_sub(n)).collect()))
}

/// MID(text, start_num, num_chars) - `start_num` is 1-based
pub fn fn_mid(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = text_arg(args, 0)?;
    let start = number_arg(args, 1)?.trunc();
    let n = count_arg(args, 2, 0.0)?;
    if start < 1.0 {
        return raise(CellError::Error);
    }
    Ok(FormulaValue::String(
        text.chars().skip(start as usize - 1).take(n).collect(),
    ))
}

/// LEN(text)
pub fn fn_len(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(text_arg(args, 0)?.chars().count() as f64))
}

/// UPPER(text)
pub fn fn_upper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::String(text_arg(args, 0)?.to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::String(text_arg(args, 0)?.to_lowercase()))
}

/// TRIM(text) - Strip leading and trailing whitespace
pub fn fn_trim(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::String(text_arg(args, 0)?.trim().to_string()))
}
