//! Lookup functions

use super::{grid_arg, number_arg, opt_bool_arg, raise, scalar_arg};
use crate::coerce::values_equal;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use gridcalc_core::CellError;

/// Exact lookup equality: numeric-aware, case-insensitive; blanks only match blanks
fn lookup_equal(needle: &FormulaValue, candidate: &FormulaValue) -> bool {
    match candidate {
        FormulaValue::Error(_) => false,
        c if c.is_blank() => needle.is_blank(),
        c => !needle.is_blank() && values_equal(needle, c),
    }
}

/// Case-insensitive containment of the needle's text in the candidate's text
fn lookup_contains(needle: &str, candidate: &FormulaValue) -> bool {
    !needle.is_empty()
        && !candidate.is_blank()
        && !candidate.is_error()
        && candidate.as_string().to_lowercase().contains(needle)
}

/// Position of the needle among `keys`
///
/// An exact match always wins; unless `exact_only`, the first key containing the
/// needle's text is accepted next.
fn find_key(keys: &[&FormulaValue], needle: &FormulaValue, exact_only: bool) -> Option<usize> {
    if let Some(pos) = keys.iter().position(|k| lookup_equal(needle, k)) {
        return Some(pos);
    }
    if exact_only {
        return None;
    }
    let text = needle.as_string().to_lowercase();
    keys.iter().position(|k| lookup_contains(&text, k))
}

/// The table argument of a lookup; an error value is raised
fn table_arg(args: &[FormulaValue], index: usize) -> FormulaResult<Vec<Vec<FormulaValue>>> {
    if let Some(FormulaValue::Error(e)) = args.get(index) {
        return raise(*e);
    }
    Ok(grid_arg(args, index))
}

/// A 1-based offset argument as an integer
fn offset_arg(args: &[FormulaValue], index: usize) -> FormulaResult<i64> {
    Ok(number_arg(args, index)?.trunc() as i64)
}

/// VLOOKUP(lookup_value, table, col_index, [range_lookup])
///
/// Scans the first column. `range_lookup` FALSE requires an exact match; TRUE or omitted
/// also accepts a case-insensitive substring match.
pub fn fn_vlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let needle = scalar_arg(args, 0)?;
    let table = table_arg(args, 1)?;
    let col = offset_arg(args, 2)?;
    let exact_only = !opt_bool_arg(args, 3, true)?;

    let width = table.first().map_or(0, Vec::len);
    if col < 1 {
        return raise(CellError::Error);
    }
    if col as usize > width {
        return raise(CellError::Ref);
    }

    let keys: Vec<&FormulaValue> = table.iter().filter_map(|row| row.first()).collect();
    match find_key(&keys, &needle, exact_only) {
        Some(row) => cell_at(&table, row, col as usize - 1),
        None => raise(CellError::Na),
    }
}

/// HLOOKUP(lookup_value, table, row_index, [range_lookup]) - VLOOKUP along the first row
pub fn fn_hlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let needle = scalar_arg(args, 0)?;
    let table = table_arg(args, 1)?;
    let row = offset_arg(args, 2)?;
    let exact_only = !opt_bool_arg(args, 3, true)?;

    if row < 1 {
        return raise(CellError::Error);
    }
    if row as usize > table.len() {
        return raise(CellError::Ref);
    }

    let keys: Vec<&FormulaValue> = table.first().map(|r| r.iter().collect()).unwrap_or_default();
    match find_key(&keys, &needle, exact_only) {
        Some(col) => cell_at(&table, row as usize - 1, col),
        None => raise(CellError::Na),
    }
}

/// INDEX(range, row_num, [col_num])
///
/// Offsets are 1-based. For a single-row range without `col_num`, `row_num` selects the
/// column. Zero, negative or out-of-range offsets are `#REF!`.
pub fn fn_index(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let table = table_arg(args, 0)?;
    let rows = table.len();
    let cols = table.first().map_or(0, Vec::len);

    let first = offset_arg(args, 1)?;
    let (row, col) = if args.len() > 2 {
        (first, offset_arg(args, 2)?)
    } else if rows == 1 && cols > 1 {
        (1, first)
    } else {
        (first, 1)
    };

    if row < 1 || col < 1 || row as usize > rows || col as usize > cols {
        return raise(CellError::Ref);
    }
    cell_at(&table, row as usize - 1, col as usize - 1)
}

/// Zero-based lookup into a table whose rows may differ in length
fn cell_at(table: &[Vec<FormulaValue>], row: usize, col: usize) -> FormulaResult<FormulaValue> {
    match table.get(row).and_then(|r| r.get(col)) {
        Some(value) => Ok(value.clone()),
        None => raise(CellError::Ref),
    }
}

/// MATCH(lookup_value, range, [match_type])
///
/// Returns the 1-based position of the first exact match in a single row or column.
/// `match_type` is accepted but every lookup is exact.
pub fn fn_match(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let needle = scalar_arg(args, 0)?;
    let table = table_arg(args, 1)?;
    if args.len() > 2 {
        number_arg(args, 2)?;
    }

    let cols = table.first().map_or(0, Vec::len);
    if table.len() > 1 && cols > 1 {
        return raise(CellError::Na);
    }

    let keys: Vec<&FormulaValue> = table.iter().flatten().collect();
    match keys.iter().position(|k| lookup_equal(&needle, k)) {
        Some(pos) => Ok(FormulaValue::Number((pos + 1) as f64)),
        None => raise(CellError::Na),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::eval_with;
    use super::*;
    use crate::error::FormulaError;
    use gridcalc_core::{CellError, CellValue};
    use pretty_assertions::assert_eq;

    const FRUIT: &[(&str, &str)] = &[
        ("A1", "Apple"),
        ("B1", "1.5"),
        ("A2", "Banana"),
        ("B2", "=B1*2"),
        ("A3", "Cherry"),
        ("B3", "4"),
        ("A4", "42"),
        ("B4", "answer"),
    ];

    #[test]
    fn test_vlookup_exact() {
        assert_eq!(eval_with(FRUIT, "=VLOOKUP(\"banana\",A1:B4,2,FALSE)"), CellValue::Number(3.0));
        assert_eq!(eval_with(FRUIT, "=VLOOKUP(42,A1:B4,2,FALSE)"), CellValue::string("answer"));
        assert_eq!(eval_with(FRUIT, "=VLOOKUP(\"42\",A1:B4,2,0)"), CellValue::string("answer"));
        assert_eq!(
            eval_with(FRUIT, "=VLOOKUP(\"Durian\",A1:B4,2,FALSE)"),
            CellValue::Error(CellError::Na)
        );
        assert_eq!(
            eval_with(FRUIT, "=VLOOKUP(\"Ban\",A1:B4,2,FALSE)"),
            CellValue::Error(CellError::Na)
        );
    }

    #[test]
    fn test_vlookup_substring() {
        assert_eq!(eval_with(FRUIT, "=VLOOKUP(\"err\",A1:B4,2)"), CellValue::Number(4.0));
        assert_eq!(eval_with(FRUIT, "=VLOOKUP(\"APP\",A1:B4,2,TRUE)"), CellValue::Number(1.5));
        assert_eq!(eval_with(FRUIT, "=VLOOKUP(\"kiwi\",A1:B4,2)"), CellValue::Error(CellError::Na));
    }

    #[test]
    fn test_vlookup_column_bounds() {
        assert_eq!(
            eval_with(FRUIT, "=VLOOKUP(\"Apple\",A1:B4,3,FALSE)"),
            CellValue::Error(CellError::Ref)
        );
        assert_eq!(
            eval_with(FRUIT, "=VLOOKUP(\"Apple\",A1:B4,0,FALSE)"),
            CellValue::Error(CellError::Error)
        );
        assert_eq!(
            eval_with(FRUIT, "=VLOOKUP(1/0,A1:B4,2,FALSE)"),
            CellValue::Error(CellError::Div0)
        );
    }

    #[test]
    fn test_hlookup() {
        let cells = &[("A1", "q1"), ("B1", "q2"), ("A2", "10"), ("B2", "20")];
        assert_eq!(eval_with(cells, "=HLOOKUP(\"Q2\",A1:B2,2,FALSE)"), CellValue::Number(20.0));
        assert_eq!(eval_with(cells, "=HLOOKUP(\"q3\",A1:B2,2,FALSE)"), CellValue::Error(CellError::Na));
        assert_eq!(eval_with(cells, "=HLOOKUP(\"q1\",A1:B2,3,FALSE)"), CellValue::Error(CellError::Ref));
    }

    #[test]
    fn test_index() {
        assert_eq!(eval_with(FRUIT, "=INDEX(A1:B4,2,2)"), CellValue::Number(3.0));
        assert_eq!(eval_with(FRUIT, "=INDEX(A1:B4,3)"), CellValue::string("Cherry"));
        assert_eq!(eval_with(FRUIT, "=INDEX(A1:B4,5,1)"), CellValue::Error(CellError::Ref));
        assert_eq!(eval_with(FRUIT, "=INDEX(A1:B4,0,1)"), CellValue::Error(CellError::Ref));
        assert_eq!(eval_with(FRUIT, "=INDEX(A1:B4,-1,1)"), CellValue::Error(CellError::Ref));
        assert_eq!(eval_with(FRUIT, "=INDEX({5,6,7},3)"), CellValue::Number(7.0));
    }

    #[test]
    fn test_ragged_tables() {
        let table = vec![
            vec![FormulaValue::Number(1.0), FormulaValue::Number(2.0)],
            vec![FormulaValue::Number(3.0)],
        ];
        assert_eq!(cell_at(&table, 0, 1), Ok(FormulaValue::Number(2.0)));
        assert_eq!(cell_at(&table, 1, 1), Err(FormulaError::Sentinel(CellError::Ref)));
        assert_eq!(cell_at(&table, 2, 0), Err(FormulaError::Sentinel(CellError::Ref)));

        // uneven array literals never reach the lookups
        assert_eq!(eval_with(&[], "=VLOOKUP(3,{1,2;3},2,FALSE)"), CellValue::Error(CellError::Error));
        assert_eq!(eval_with(&[], "=INDEX({1,2;3},2,2)"), CellValue::Error(CellError::Error));
    }

    #[test]
    fn test_match() {
        assert_eq!(eval_with(FRUIT, "=MATCH(\"cherry\",A1:A4,0)"), CellValue::Number(3.0));
        assert_eq!(eval_with(FRUIT, "=MATCH(\"42\",A1:A4)"), CellValue::Number(4.0));
        assert_eq!(eval_with(FRUIT, "=MATCH(3,B1:B4,0)"), CellValue::Number(2.0));
        assert_eq!(eval_with(FRUIT, "=MATCH(\"kiwi\",A1:A4,0)"), CellValue::Error(CellError::Na));
        assert_eq!(eval_with(FRUIT, "=MATCH(\"Apple\",A1:B4,0)"), CellValue::Error(CellError::Na));
    }
}
