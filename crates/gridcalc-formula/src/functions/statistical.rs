//! Aggregate and statistical functions

use super::{flatten, numbers, raise};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use gridcalc_core::CellError;

/// SUM(value1, [value2], ...) - Adds numbers; text and blanks are skipped
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(numbers(args)?.iter().sum()))
}

/// AVERAGE(value1, [value2], ...) - Arithmetic mean, `#DIV/0!` without numbers
pub fn fn_average(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let values = numbers(args)?;
    if values.is_empty() {
        return raise(CellError::Div0);
    }
    Ok(FormulaValue::Number(mean(&values)))
}

/// COUNT(value1, [value2], ...) - Counts numeric-coercible values
pub fn fn_count(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = flatten(args)
        .filter(|v| match v {
            FormulaValue::Number(_) => true,
            FormulaValue::String(s) => crate::coerce::parse_number(s).is_some(),
            _ => false,
        })
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTA(value1, [value2], ...) - Counts non-empty values, errors included
pub fn fn_counta(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = flatten(args).filter(|v| !v.is_blank()).count();
    Ok(FormulaValue::Number(count as f64))
}

/// MAX(value1, [value2], ...) - Largest number, 0 when there is none
pub fn fn_max(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let max = numbers(args)?.into_iter().reduce(f64::max);
    Ok(FormulaValue::Number(max.unwrap_or(0.0)))
}

/// MIN(value1, [value2], ...) - Smallest number, 0 when there is none
pub fn fn_min(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let min = numbers(args)?.into_iter().reduce(f64::min);
    Ok(FormulaValue::Number(min.unwrap_or(0.0)))
}

/// VAR(value1, [value2], ...) - Sample variance
pub fn fn_var(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(sample_variance(&numbers(args)?)))
}

/// STDEV(value1, [value2], ...) - Sample standard deviation
pub fn fn_stdev(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(sample_variance(&numbers(args)?).sqrt()))
}

/// MEDIAN(value1, [value2], ...) - Middle value, `#NUM!` without numbers
pub fn fn_median(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut values = numbers(args)?;
    if values.is_empty() {
        return raise(CellError::Num);
    }

    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    let median = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };
    Ok(FormulaValue::Number(median))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// n-1 denominator; fewer than two values give 0
fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let squares: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    squares / (values.len() - 1) as f64
}
