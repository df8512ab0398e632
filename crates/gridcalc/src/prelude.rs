//! The types most programs need, for a single glob import
//!
//! ```rust
//! use gridcalc::prelude::*;
//! ```

pub use crate::{
    evaluate_formula, evaluate_formula_with, Calculator, CalculationOptions, CalculationStats,
    Cell, CellAddress, CellError, CellRange, CellValue, Error, EvaluationOptions, Result, Sheet,
    SheetId, Workbook, WorkbookCalculationExt, WorkbookView,
};
