//! Criteria matching for SUMIF, COUNTIF and AVERAGEIF
//!
//! A criterion can be:
//! - A number: numeric match (e.g. `5`, `"5"`, `"$5"`)
//! - A comparison: `">5"`, `">=10"`, `"<100"`, `"<=50"`, `"<>0"`, `"=5"`, or the same
//!   operators against text (`"<>apple"`)
//! - Text: case-insensitive match where `*` matches any run of characters and `?` one
//! - Empty text: matches blank cells

use super::{grid_arg, raise, scalar_arg};
use crate::coerce::parse_number;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use gridcalc_core::CellError;

/// Criteria matcher for SUMIF/COUNTIF/AVERAGEIF
#[derive(Debug)]
pub struct CriteriaMatcher {
    criteria_type: CriteriaType,
}

#[derive(Debug)]
enum CriteriaType {
    /// Numeric comparison (operator, value); a plain number uses `Equal`
    Number(ComparisonOp, f64),
    /// Text comparison (operator, lowercased pattern)
    Text(ComparisonOp, String),
    /// Match blank values
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl ComparisonOp {
    fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            ComparisonOp::Equal => ordering == Equal,
            ComparisonOp::NotEqual => ordering != Equal,
            ComparisonOp::LessThan => ordering == Less,
            ComparisonOp::LessEqual => ordering != Greater,
            ComparisonOp::GreaterThan => ordering == Greater,
            ComparisonOp::GreaterEqual => ordering != Less,
        }
    }
}

/// Numeric reading of a candidate value
fn numeric(value: &FormulaValue) -> Option<f64> {
    match value {
        FormulaValue::Number(n) => Some(*n),
        FormulaValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        FormulaValue::String(s) => parse_number(s),
        _ => None,
    }
}

impl CriteriaMatcher {
    /// Create a new criteria matcher from a criterion value
    pub fn new(criteria: &FormulaValue) -> Self {
        let criteria_type = match criteria.scalar() {
            FormulaValue::Number(n) => CriteriaType::Number(ComparisonOp::Equal, n),
            FormulaValue::Boolean(b) => {
                CriteriaType::Number(ComparisonOp::Equal, if b { 1.0 } else { 0.0 })
            }
            FormulaValue::String(s) => Self::parse_string_criteria(&s),
            _ => CriteriaType::Empty,
        };

        Self { criteria_type }
    }

    fn parse_string_criteria(s: &str) -> CriteriaType {
        let s = s.trim();
        if s.is_empty() {
            return CriteriaType::Empty;
        }

        // Longer operators first
        let (op, rest) = if let Some(rest) = s.strip_prefix(">=") {
            (ComparisonOp::GreaterEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (ComparisonOp::LessEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<>") {
            (ComparisonOp::NotEqual, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (ComparisonOp::GreaterThan, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (ComparisonOp::LessThan, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (ComparisonOp::Equal, rest)
        } else {
            (ComparisonOp::Equal, s)
        };

        let rest = rest.trim();
        match parse_number(rest) {
            Some(n) => CriteriaType::Number(op, n),
            None if rest.is_empty() && op == ComparisonOp::Equal => CriteriaType::Empty,
            None => CriteriaType::Text(op, rest.to_lowercase()),
        }
    }

    /// Check if a value matches the criteria
    pub fn matches(&self, value: &FormulaValue) -> bool {
        match &self.criteria_type {
            CriteriaType::Number(op, criteria_num) => match numeric(value) {
                Some(n) => op.holds(n.partial_cmp(criteria_num).unwrap_or(std::cmp::Ordering::Less)),
                None => *op == ComparisonOp::NotEqual,
            },

            CriteriaType::Text(op, pattern) => {
                let text = value.as_string().to_lowercase();
                match op {
                    ComparisonOp::Equal => wildcard_match(pattern, &text),
                    ComparisonOp::NotEqual => !wildcard_match(pattern, &text),
                    _ if value.is_blank() || numeric(value).is_some() => false,
                    _ => op.holds(text.as_str().cmp(pattern.as_str())),
                }
            }

            CriteriaType::Empty => value.is_blank(),
        }
    }
}

/// `*` matches any run of characters and `?` exactly one
///
/// The pattern is split at its stars: the first piece anchors the start, the last
/// anchors the end, and the ones between are found left to right in what remains.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains(['*', '?']) {
        return pattern == text;
    }

    let text: Vec<char> = text.chars().collect();
    let pieces: Vec<Vec<char>> = pattern.split('*').map(|p| p.chars().collect()).collect();
    let (first, last) = match pieces.as_slice() {
        [only] => return piece_matches(only, &text),
        [first, .., last] => (first, last),
        [] => return text.is_empty(),
    };

    if text.len() < first.len() + last.len()
        || !piece_matches(first, &text[..first.len()])
        || !piece_matches(last, &text[text.len() - last.len()..])
    {
        return false;
    }

    let mut window = &text[first.len()..text.len() - last.len()];
    for piece in &pieces[1..pieces.len() - 1] {
        if piece.len() > window.len() {
            return false;
        }
        let found = (0..=window.len() - piece.len())
            .find(|&at| piece_matches(piece, &window[at..at + piece.len()]));
        match found {
            Some(at) => window = &window[at + piece.len()..],
            None => return false,
        }
    }
    true
}

fn piece_matches(piece: &[char], text: &[char]) -> bool {
    piece.len() == text.len() && piece.iter().zip(text).all(|(p, t)| *p == '?' || p == t)
}

/// The criteria range paired with the range that supplies values
///
/// The value range is aligned with the criteria range by offset; positions it does not
/// cover contribute nothing.
fn conditional_cells(
    args: &[FormulaValue],
    value_index: usize,
) -> FormulaResult<Vec<FormulaValue>> {
    for index in [0, value_index] {
        if let Some(FormulaValue::Error(e)) = args.get(index) {
            return raise(*e);
        }
    }
    let criteria_range = grid_arg(args, 0);
    let matcher = CriteriaMatcher::new(&scalar_arg(args, 1)?);
    let values = if args.len() > value_index {
        grid_arg(args, value_index)
    } else {
        criteria_range.clone()
    };

    let mut selected = Vec::new();
    for (r, row) in criteria_range.iter().enumerate() {
        for (c, candidate) in row.iter().enumerate() {
            if matcher.matches(candidate) {
                if let Some(value) = values.get(r).and_then(|row| row.get(c)) {
                    selected.push(value.clone());
                }
            }
        }
    }
    Ok(selected)
}

/// Numbers among the selected cells; errors are raised
fn selected_numbers(selected: &[FormulaValue]) -> FormulaResult<Vec<f64>> {
    let mut out = Vec::new();
    for value in selected {
        match value {
            FormulaValue::Error(e) => return raise(*e),
            FormulaValue::Number(n) => out.push(*n),
            FormulaValue::String(s) => out.extend(parse_number(s)),
            _ => {}
        }
    }
    Ok(out)
}

/// SUMIF(range, criteria, [sum_range])
pub fn fn_sumif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let selected = conditional_cells(args, 2)?;
    Ok(FormulaValue::Number(selected_numbers(&selected)?.iter().sum()))
}

/// COUNTIF(range, criteria)
pub fn fn_countif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let selected = conditional_cells(args, 2)?;
    Ok(FormulaValue::Number(selected.len() as f64))
}

/// AVERAGEIF(range, criteria, [average_range]) - `#DIV/0!` when nothing numeric matches
pub fn fn_averageif(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let numbers = selected_numbers(&conditional_cells(args, 2)?)?;
    if numbers.is_empty() {
        return raise(CellError::Div0);
    }
    Ok(FormulaValue::Number(
        numbers.iter().sum::<f64>() / numbers.len() as f64,
    ))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::eval_with;
    use super::*;
    use gridcalc_core::CellValue;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> FormulaValue {
        FormulaValue::String(s.into())
    }

    #[test]
    fn test_number_criteria() {
        let matcher = CriteriaMatcher::new(&FormulaValue::Number(5.0));
        assert!(matcher.matches(&FormulaValue::Number(5.0)));
        assert!(!matcher.matches(&FormulaValue::Number(4.0)));
        assert!(matcher.matches(&text("5")));
        assert!(!matcher.matches(&FormulaValue::Empty));
    }

    #[test]
    fn test_comparison_criteria() {
        let matcher = CriteriaMatcher::new(&text(">5"));
        assert!(matcher.matches(&FormulaValue::Number(6.0)));
        assert!(!matcher.matches(&FormulaValue::Number(5.0)));

        let matcher = CriteriaMatcher::new(&text(">=5"));
        assert!(matcher.matches(&FormulaValue::Number(5.0)));
        assert!(!matcher.matches(&FormulaValue::Number(4.0)));

        let matcher = CriteriaMatcher::new(&text("<5"));
        assert!(matcher.matches(&FormulaValue::Number(4.0)));
        assert!(!matcher.matches(&FormulaValue::Empty));

        let matcher = CriteriaMatcher::new(&text("<=5"));
        assert!(matcher.matches(&FormulaValue::Number(5.0)));
        assert!(!matcher.matches(&FormulaValue::Number(6.0)));

        let matcher = CriteriaMatcher::new(&text("<>5"));
        assert!(matcher.matches(&FormulaValue::Number(6.0)));
        assert!(matcher.matches(&text("other")));
        assert!(!matcher.matches(&FormulaValue::Number(5.0)));

        let matcher = CriteriaMatcher::new(&text("=5"));
        assert!(matcher.matches(&FormulaValue::Number(5.0)));

        let matcher = CriteriaMatcher::new(&text(">$1,000"));
        assert!(matcher.matches(&FormulaValue::Number(1500.0)));
    }

    #[test]
    fn test_text_criteria() {
        let matcher = CriteriaMatcher::new(&text("apple"));
        assert!(matcher.matches(&text("APPLE")));
        assert!(!matcher.matches(&text("banana")));

        let matcher = CriteriaMatcher::new(&text("<>apple"));
        assert!(matcher.matches(&text("banana")));
        assert!(!matcher.matches(&text("Apple")));

        let matcher = CriteriaMatcher::new(&text(">m"));
        assert!(matcher.matches(&text("pear")));
        assert!(!matcher.matches(&text("apple")));
    }

    #[test]
    fn test_wildcard_criteria() {
        let matcher = CriteriaMatcher::new(&text("a*"));
        assert!(matcher.matches(&text("apple")));
        assert!(matcher.matches(&text("a")));
        assert!(!matcher.matches(&text("banana")));

        let matcher = CriteriaMatcher::new(&text("*an*"));
        assert!(matcher.matches(&text("banana")));
        assert!(!matcher.matches(&text("apple")));

        let matcher = CriteriaMatcher::new(&text("a?p*"));
        assert!(matcher.matches(&text("apple")));
        assert!(!matcher.matches(&text("ap")));
    }

    #[test]
    fn test_wildcard_pieces() {
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("a*b*c", "abc"));
        assert!(wildcard_match("a*b*c", "axxbyyc"));
        assert!(!wildcard_match("a*b*c", "axxcyyb"));
        assert!(wildcard_match("*na*na", "banana"));
        assert!(!wildcard_match("ab*ba", "aba"));
        assert!(wildcard_match("??", "é!"));
    }

    #[test]
    fn test_empty_criteria() {
        let matcher = CriteriaMatcher::new(&text(""));
        assert!(matcher.matches(&FormulaValue::Empty));
        assert!(matcher.matches(&text("")));
        assert!(!matcher.matches(&FormulaValue::Number(0.0)));
    }

    const SALES: &[(&str, &str)] = &[
        ("A1", "east"),
        ("B1", "100"),
        ("A2", "west"),
        ("B2", "250"),
        ("A3", "East"),
        ("B3", "50"),
        ("A4", "north"),
        ("B4", "n/a"),
    ];

    #[test]
    fn test_sumif() {
        assert_eq!(eval_with(SALES, "=SUMIF(A1:A4,\"east\",B1:B4)"), CellValue::Number(150.0));
        assert_eq!(eval_with(SALES, "=SUMIF(B1:B4,\">=100\")"), CellValue::Number(350.0));
        assert_eq!(eval_with(SALES, "=SUMIF(A1:A4,\"*t\",B1:B4)"), CellValue::Number(400.0));
        assert_eq!(eval_with(SALES, "=SUMIF(A1:A4,\"north\",B1:B4)"), CellValue::Number(0.0));
    }

    #[test]
    fn test_countif() {
        assert_eq!(eval_with(SALES, "=COUNTIF(A1:A4,\"east\")"), CellValue::Number(2.0));
        assert_eq!(eval_with(SALES, "=COUNTIF(B1:B4,\"<200\")"), CellValue::Number(2.0));
        assert_eq!(eval_with(SALES, "=COUNTIF(A1:A4,\"<>east\")"), CellValue::Number(2.0));
    }

    #[test]
    fn test_averageif() {
        assert_eq!(eval_with(SALES, "=AVERAGEIF(A1:A4,\"east\",B1:B4)"), CellValue::Number(75.0));
        assert_eq!(
            eval_with(SALES, "=AVERAGEIF(A1:A4,\"south\",B1:B4)"),
            CellValue::Error(CellError::Div0)
        );
    }

    #[test]
    fn test_error_in_sum_range_propagates() {
        let cells = &[("A1", "x"), ("B1", "=1/0")];
        assert_eq!(
            eval_with(cells, "=SUMIF(A1:A1,\"x\",B1:B1)"),
            CellValue::Error(CellError::Div0)
        );
    }
}
