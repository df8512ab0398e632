//! Numeric/string coercion rules shared by operators and functions

use crate::evaluator::FormulaValue;
use gridcalc_core::CellError;
use lazy_regex::regex_captures;
use std::cmp::Ordering;

/// Parse display-formatted numeric text: `42`, `-3.5`, `1e3`, `$1,234.56`, `25%`
///
/// Returns `None` for anything else (including empty text).
///
/// ```
/// use gridcalc_formula::coerce::parse_number;
///
/// assert_eq!(parse_number("$1,234.56"), Some(1234.56));
/// assert_eq!(parse_number("25%"), Some(0.25));
/// assert_eq!(parse_number("abc"), None);
/// ```
pub fn parse_number(text: &str) -> Option<f64> {
    let (_, outer_sign, inner_sign, digits, percent) = regex_captures!(
        r"^([+-]?)\$?([+-]?)((?:\d{1,3}(?:,\d{3})+|\d*)(?:\.\d*)?(?:[eE][+-]?\d+)?)(%?)$",
        text.trim()
    )?;

    if !digits.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        || !digits.contains(|c: char| c.is_ascii_digit())
        || (!outer_sign.is_empty() && !inner_sign.is_empty())
    {
        return None;
    }

    let mut n: f64 = digits.replace(',', "").parse().ok()?;
    if outer_sign == "-" || inner_sign == "-" {
        n = -n;
    }
    if !percent.is_empty() {
        n /= 100.0;
    }
    Some(n)
}

/// Map a computed number onto a value: +/-infinity is `#DIV/0!`, NaN is `#NUM!`
pub fn classify_number(n: f64) -> FormulaValue {
    if n.is_infinite() {
        FormulaValue::Error(CellError::Div0)
    } else if n.is_nan() {
        FormulaValue::Error(CellError::Num)
    } else {
        FormulaValue::Number(n)
    }
}

/// Coerce a scalar to a number the way arithmetic does
///
/// Empty is 0, booleans are 1/0, text is parsed with [`parse_number`]. Errors and
/// non-numeric text yield `None`.
pub fn coerce_number(value: &FormulaValue) -> Option<f64> {
    match value {
        FormulaValue::Number(n) => Some(*n),
        FormulaValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        FormulaValue::Empty => Some(0.0),
        FormulaValue::String(s) => parse_number(s),
        FormulaValue::Error(_) => None,
        FormulaValue::Array(rows) => rows
            .first()
            .and_then(|r| r.first())
            .and_then(coerce_number),
    }
}

/// Truthiness of a condition value
pub fn coerce_bool(value: &FormulaValue) -> Option<bool> {
    match value {
        FormulaValue::Boolean(b) => Some(*b),
        FormulaValue::Number(n) => Some(*n != 0.0),
        FormulaValue::Empty => Some(false),
        FormulaValue::String(s) => match s.trim().to_uppercase().as_str() {
            "TRUE" => Some(true),
            "FALSE" | "" => Some(false),
            _ => parse_number(s).map(|n| n != 0.0),
        },
        FormulaValue::Error(_) => None,
        FormulaValue::Array(rows) => rows.first().and_then(|r| r.first()).and_then(coerce_bool),
    }
}

/// Compare two scalars
///
/// When both sides coerce to numbers the comparison is numeric (so `"10" > 9`);
/// otherwise it is a case-insensitive text comparison of their display forms.
pub fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    let numeric = |v: &FormulaValue| match v {
        FormulaValue::String(s) if s.trim().is_empty() => None,
        other => coerce_number(other),
    };

    match (numeric(left), numeric(right)) {
        (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => left
            .as_string()
            .to_lowercase()
            .cmp(&right.as_string().to_lowercase()),
    }
}

/// Equality used by lookups: numeric-aware, then case-insensitive text
pub fn values_equal(left: &FormulaValue, right: &FormulaValue) -> bool {
    compare_values(left, right) == Ordering::Equal
}
