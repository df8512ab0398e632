//! Financial functions
//!
//! Sign convention: money paid out is negative, money received is positive. `type` is
//! 0 for payments at the end of each period and 1 for payments at the beginning.

use super::{number_arg, numbers, opt_number_arg, raise};
use crate::coerce::classify_number;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use gridcalc_core::CellError;
use tracing::debug;

const IRR_MAX_ITERATIONS: usize = 100;
const IRR_TOLERANCE: f64 = 1e-6;

/// NPV(rate, value1, [value2], ...) - Net present value of end-of-period cash flows
pub fn fn_npv(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let rate = number_arg(args, 0)?;
    let flows = numbers(&args[1..])?;

    let npv: f64 = flows
        .iter()
        .enumerate()
        .map(|(i, v)| v / (1.0 + rate).powi(i as i32 + 1))
        .sum();
    Ok(classify_number(npv))
}

/// IRR(values, [guess]) - Internal rate of return by Newton-Raphson
///
/// `#NUM!` when the iteration does not converge within 100 steps.
pub fn fn_irr(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let flows = numbers(&args[..1])?;
    let mut rate = opt_number_arg(args, 1, 0.1)?;

    if flows.is_empty() {
        return raise(CellError::Num);
    }

    for _ in 0..IRR_MAX_ITERATIONS {
        let mut npv = 0.0;
        let mut derivative = 0.0;
        for (t, v) in flows.iter().enumerate() {
            let t = t as i32;
            npv += v / (1.0 + rate).powi(t);
            derivative -= t as f64 * v / (1.0 + rate).powi(t + 1);
        }

        if !npv.is_finite() || !derivative.is_finite() {
            break;
        }
        if npv.abs() < IRR_TOLERANCE {
            return Ok(FormulaValue::Number(rate));
        }
        if derivative == 0.0 {
            break;
        }
        rate -= npv / derivative;
    }

    debug!(?flows, "IRR did not converge");
    raise(CellError::Num)
}

/// (1 + rate)^nper
fn growth(rate: f64, nper: f64) -> f64 {
    (1.0 + rate).powf(nper)
}

/// PMT(rate, nper, pv, [fv], [type]) - Payment per period of an annuity
pub fn fn_pmt(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let rate = number_arg(args, 0)?;
    let nper = number_arg(args, 1)?;
    let pv = number_arg(args, 2)?;
    let fv = opt_number_arg(args, 3, 0.0)?;
    let when = opt_number_arg(args, 4, 0.0)?;

    if rate == 0.0 {
        return Ok(classify_number(-(pv + fv) / nper));
    }
    let g = growth(rate, nper);
    Ok(classify_number(
        -rate * (pv * g + fv) / ((1.0 + rate * when) * (g - 1.0)),
    ))
}

/// PV(rate, nper, pmt, [fv], [type]) - Present value of an annuity
pub fn fn_pv(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let rate = number_arg(args, 0)?;
    let nper = number_arg(args, 1)?;
    let pmt = number_arg(args, 2)?;
    let fv = opt_number_arg(args, 3, 0.0)?;
    let when = opt_number_arg(args, 4, 0.0)?;

    if rate == 0.0 {
        return Ok(classify_number(-(fv + pmt * nper)));
    }
    let g = growth(rate, nper);
    Ok(classify_number(
        -(fv + pmt * (1.0 + rate * when) * (g - 1.0) / rate) / g,
    ))
}

/// FV(rate, nper, pmt, [pv], [type]) - Future value of an annuity
pub fn fn_fv(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let rate = number_arg(args, 0)?;
    let nper = number_arg(args, 1)?;
    let pmt = number_arg(args, 2)?;
    let pv = opt_number_arg(args, 3, 0.0)?;
    let when = opt_number_arg(args, 4, 0.0)?;

    if rate == 0.0 {
        return Ok(classify_number(-(pv + pmt * nper)));
    }
    let g = growth(rate, nper);
    Ok(classify_number(
        -(pv * g + pmt * (1.0 + rate * when) * (g - 1.0) / rate),
    ))
}
