//! # gridcalc
//!
//! A spreadsheet formula engine: parse and evaluate spreadsheet-style formulas against a
//! multi-sheet grid of cells.
//!
//! ## Features
//!
//! - Cell, range and cross-sheet references (`B6`, `$B$6`, `A1:C3`, `'Sheet 1'.B6`, `Data!B6`)
//! - Arithmetic, comparison and concatenation operators with spreadsheet coercion rules
//! - Aggregate, logical, lookup, financial, date, text, conditional, math and reference
//!   functions
//! - Circular-reference detection and a recursion ceiling
//! - Error sentinels that propagate as values instead of failing the evaluation
//! - A memoising calculator that materialises whole sheets
//!
//! ## Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let id = SheetId::new("sheet1");
//!
//! let sheet = workbook.sheet_mut(&id).unwrap();
//! sheet.set_input("A1", "Hello").unwrap();
//! sheet.set_input("B1", "42").unwrap();
//! sheet.set_formula(0, 2, "=B1*2").unwrap();
//!
//! assert_eq!(workbook.evaluate(&id, "=C1+1"), CellValue::Number(85.0));
//! assert_eq!(workbook.evaluate(&id, "=A1&\" world\""), CellValue::string("Hello world"));
//! ```

pub mod calculation;
pub mod prelude;

// Re-export calculation types
pub use calculation::{CalculationOptions, CalculationStats, Calculator, WorkbookCalculationExt};

// Re-export core types
pub use gridcalc_core::{
    // Cell types
    format_number,
    Cell,
    CellAddress,
    CellError,
    CellRange,
    CellValue,
    // Error types
    Error,
    Result,
    // Main types
    Sheet,
    SheetId,
    SheetReference,
    Workbook,
    WorkbookView,
    // Constants
    MAX_COLS,
    MAX_ROWS,
    MAX_SHEET_NAME_LEN,
};

// Re-export formula types
pub use gridcalc_formula::{
    evaluate, evaluate_cell, evaluate_formula, evaluate_formula_at, evaluate_formula_with,
    find_function_call, function_registry, is_volatile, parse_formula, smart_split,
    split_arguments, CellKey,
    CycleGuard, EvaluationContext, EvaluationOptions, FormulaError, FormulaExpr, FormulaResult,
    FormulaValue, FunctionCall,
};
