//! Reference functions

use super::{raise, text_arg};
use crate::ast::FormulaExpr;
use crate::error::FormulaResult;
use crate::evaluator::{evaluate, EvaluationContext, FormulaValue};
use gridcalc_core::{CellError, SheetReference};
use tracing::debug;

/// Row/column of the referenced cell, or of the calling cell when there is no argument
///
/// Without an argument and without a calling cell the placeholder 1 is returned.
fn position(
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
    pick: fn(u32, u16) -> u32,
) -> FormulaResult<FormulaValue> {
    let index = match args.first() {
        None => ctx.current_cell.map_or(0, |(row, col)| pick(row, col)),
        Some(FormulaExpr::CellRef(cell_ref)) => pick(cell_ref.address.row, cell_ref.address.col),
        Some(FormulaExpr::RangeRef(range_ref)) => {
            pick(range_ref.range.start.row, range_ref.range.start.col)
        }
        Some(other) => {
            // Any other argument must at least evaluate cleanly
            if let Some(e) = evaluate(other, ctx)?.scalar().get_error() {
                return raise(e);
            }
            return raise(CellError::Error);
        }
    };
    Ok(FormulaValue::Number(index as f64 + 1.0))
}

/// ROW([reference]) - 1-based row number
pub fn fn_row(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    position(args, ctx, |row, _| row)
}

/// COLUMN([reference]) - 1-based column number
pub fn fn_column(args: &[FormulaExpr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    position(args, ctx, |_, col| col as u32)
}

/// INDIRECT(ref_text) - Value at a reference given as text
///
/// Accepts `A1`, `A1:B3`, `'Sheet Name'.A1` and `Sheet!A1`. Text that is not a
/// reference, or names a missing sheet, is `#REF!`.
pub fn fn_indirect(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = text_arg(args, 0)?;
    match SheetReference::parse(text.trim()) {
        Ok(reference) => Ok(ctx.reference_value(&reference)),
        Err(e) => {
            debug!(reference = %text, error = %e, "INDIRECT target is not a reference");
            raise(CellError::Ref)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{eval, eval_with};
    use crate::evaluator::{evaluate_cell, EvaluationOptions};
    use gridcalc_core::{CellError, CellValue, SheetId, Workbook};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_row_and_column_of_reference() {
        assert_eq!(eval("=ROW(C7)"), CellValue::Number(7.0));
        assert_eq!(eval("=COLUMN(C7)"), CellValue::Number(3.0));
        assert_eq!(eval("=ROW(B2:D9)"), CellValue::Number(2.0));
        assert_eq!(eval("=COLUMN($AA$1)"), CellValue::Number(27.0));
        assert_eq!(eval("=ROW(5)"), CellValue::Error(CellError::Error));
    }

    #[test]
    fn test_row_and_column_without_caller() {
        assert_eq!(eval("=ROW()"), CellValue::Number(1.0));
        assert_eq!(eval("=COLUMN()"), CellValue::Number(1.0));
    }

    #[test]
    fn test_row_and_column_of_calling_cell() {
        let mut wb = Workbook::new();
        let id = SheetId::new("sheet1");
        let sheet = wb.sheet_mut(&id).unwrap();
        sheet.set_input("C4", "=ROW()*100+COLUMN()").unwrap();
        sheet.set_input("A1", "=C4").unwrap();

        let options = EvaluationOptions::default();
        assert_eq!(evaluate_cell(&wb, &id, 3, 2, &options), CellValue::Number(403.0));
        // A referenced cell answers with its own position
        assert_eq!(evaluate_cell(&wb, &id, 0, 0, &options), CellValue::Number(403.0));
    }

    #[test]
    fn test_indirect() {
        let cells = &[("A1", "5"), ("A2", "7"), ("B1", "A2")];
        assert_eq!(eval_with(cells, "=INDIRECT(\"A1\")"), CellValue::Number(5.0));
        assert_eq!(eval_with(cells, "=INDIRECT(B1)*2"), CellValue::Number(14.0));
        assert_eq!(eval_with(cells, "=SUM(INDIRECT(\"A1:A2\"))"), CellValue::Number(12.0));
        assert_eq!(eval_with(cells, "=INDIRECT(\"A\"&\"2\")"), CellValue::Number(7.0));
        assert_eq!(eval_with(cells, "=INDIRECT(\"nowhere\")"), CellValue::Error(CellError::Ref));
        assert_eq!(eval_with(cells, "=INDIRECT(\"Ghost.A1\")"), CellValue::Error(CellError::Ref));
    }

    #[test]
    fn test_indirect_cross_sheet() {
        let mut wb = Workbook::new();
        let data = wb.add_sheet("Q1 Data").unwrap();
        wb.sheet_mut(&data).unwrap().set_input("B2", "42").unwrap();
        let result = crate::evaluate_formula("=INDIRECT(\"'Q1 Data'.B2\")", &wb, &SheetId::new("sheet1"));
        assert_eq!(result, CellValue::Number(42.0));
    }
}
