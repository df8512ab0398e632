//! Date/time functions
//!
//! Dates are day serials counted from 1900-01-01 with an offset of 2, which lines up with
//! the serials spreadsheets show for every date after February 1900. The fractional part
//! of a serial is the time of day.

use super::{number_arg, raise, scalar_arg};
use crate::coerce::parse_number;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use chrono::{Datelike, Days, Duration, Months, NaiveDate, Timelike};
use gridcalc_core::CellError;

const SERIAL_OFFSET: i64 = 2;
/// Serial of 9999-12-31
const MAX_SERIAL: f64 = 2_958_465.0;

fn epoch() -> FormulaResult<NaiveDate> {
    match NaiveDate::from_ymd_opt(1900, 1, 1) {
        Some(date) => Ok(date),
        None => raise(CellError::Num),
    }
}

/// Day serial of a calendar date
pub fn date_to_serial(date: NaiveDate) -> FormulaResult<f64> {
    Ok(((date - epoch()?).num_days() + SERIAL_OFFSET) as f64)
}

/// Calendar date of a day serial; the time-of-day fraction is dropped
pub fn serial_to_date(serial: f64) -> FormulaResult<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 || serial > MAX_SERIAL {
        return raise(CellError::Num);
    }
    let days = serial.floor() as i64 - SERIAL_OFFSET;
    match epoch()?.checked_add_signed(Duration::days(days)) {
        Some(date) => Ok(date),
        None => raise(CellError::Num),
    }
}

/// A date argument: a serial, numeric text, or ISO `YYYY-MM-DD` text
fn date_arg(args: &[FormulaValue], index: usize) -> FormulaResult<NaiveDate> {
    match scalar_arg(args, index)? {
        FormulaValue::String(s) => {
            if let Some(serial) = parse_number(&s) {
                return serial_to_date(serial);
            }
            match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
                Ok(date) => Ok(date),
                Err(_) => raise(CellError::Error),
            }
        }
        _ => serial_to_date(number_arg(args, index)?),
    }
}

/// TODAY() - Serial of the current date
pub fn fn_today(_args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(date_to_serial(ctx.now().date())?))
}

/// NOW() - Serial of the current date and time
pub fn fn_now(_args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let now = ctx.now();
    let fraction = now.time().num_seconds_from_midnight() as f64 / 86_400.0;
    Ok(FormulaValue::Number(date_to_serial(now.date())? + fraction))
}

/// DATE(year, month, day)
///
/// Years 0-1899 are taken relative to 1900. Months and days outside their usual range
/// roll over into neighbouring months and years.
pub fn fn_date(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut year = number_arg(args, 0)?.trunc();
    let month = number_arg(args, 1)?.trunc();
    let day = number_arg(args, 2)?.trunc();

    if (0.0..1900.0).contains(&year) {
        year += 1900.0;
    }
    if !(0.0..=9999.0).contains(&year) || month.abs() > 120_000.0 || day.abs() > 3_000_000.0 {
        return raise(CellError::Num);
    }

    let start = NaiveDate::from_ymd_opt(year as i32, 1, 1);
    let months = month as i64 - 1;
    let days = day as i64 - 1;
    let date = start
        .and_then(|d| {
            if months >= 0 {
                d.checked_add_months(Months::new(months as u32))
            } else {
                d.checked_sub_months(Months::new(months.unsigned_abs() as u32))
            }
        })
        .and_then(|d| {
            if days >= 0 {
                d.checked_add_days(Days::new(days as u64))
            } else {
                d.checked_sub_days(Days::new(days.unsigned_abs()))
            }
        });

    let serial = match date {
        Some(date) => date_to_serial(date)?,
        None => return raise(CellError::Num),
    };
    if serial < 0.0 {
        return raise(CellError::Num);
    }
    Ok(FormulaValue::Number(serial))
}

/// YEAR(date)
pub fn fn_year(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(date_arg(args, 0)?.year() as f64))
}

/// MONTH(date)
pub fn fn_month(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(date_arg(args, 0)?.month() as f64))
}

/// DAY(date)
pub fn fn_day(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(date_arg(args, 0)?.day() as f64))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{eval, eval_with};
    use super::*;
    use gridcalc_core::CellValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serial_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(date_to_serial(date), Ok(45292.0));
        assert_eq!(serial_to_date(45292.75), Ok(date));
        assert!(serial_to_date(-1.0).is_err());
    }

    #[test]
    fn test_today_and_now_use_clock() {
        assert_eq!(eval("=TODAY()"), CellValue::Number(45366.0));
        assert_eq!(eval("=NOW()"), CellValue::Number(45366.75));
    }

    #[test]
    fn test_date() {
        assert_eq!(eval("=DATE(2024,1,1)"), CellValue::Number(45292.0));
        assert_eq!(eval("=DATE(2024,1,0)"), CellValue::Number(45291.0));
        assert_eq!(eval("=DATE(24,1,1)"), eval("=DATE(1924,1,1)"));
        assert_eq!(eval("=DATE(2024,14,1)"), eval("=DATE(2025,2,1)"));
        assert_eq!(eval("=DATE(2024,0,1)"), eval("=DATE(2023,12,1)"));
        assert_eq!(eval("=DATE(10000,1,1)"), CellValue::Error(CellError::Num));
        assert_eq!(eval("=DATE(-1,1,1)"), CellValue::Error(CellError::Num));
    }

    #[test]
    fn test_date_parts() {
        assert_eq!(eval("=YEAR(45292)"), CellValue::Number(2024.0));
        assert_eq!(eval("=MONTH(\"2024-07-04\")"), CellValue::Number(7.0));
        assert_eq!(eval("=DAY(DATE(2024,2,29))"), CellValue::Number(29.0));
        assert_eq!(eval_with(&[("A1", "2023-11-05")], "=YEAR(A1)"), CellValue::Number(2023.0));
        assert_eq!(eval("=YEAR(-1)"), CellValue::Error(CellError::Num));
        assert_eq!(eval("=YEAR(\"soon\")"), CellValue::Error(CellError::Error));
    }
}
