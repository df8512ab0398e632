//! # gridcalc-formula
//!
//! Formula parser and evaluator for gridcalc.
//!
//! This crate provides:
//! - Formula parsing (text → AST), including sheet-qualified references and array literals
//! - Formula evaluation (AST → value) with circular-reference detection
//! - Built-in spreadsheet functions (aggregates, logical, lookup, financial, date, text,
//!   conditional, math, reference)
//! - Nesting-aware argument splitting for formula text
//!
//! Evaluation never fails: every problem surfaces as one of the error sentinels
//! (`#ERROR!`, `#DIV/0!`, `#REF!`, `#N/A`, `#NUM!`, `#CIRCULAR!`).
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{CellValue, SheetId, Workbook};
//! use gridcalc_formula::evaluate_formula;
//!
//! let mut workbook = Workbook::new();
//! let sheet = SheetId::new("sheet1");
//! let grid = workbook.sheet_mut(&sheet).unwrap();
//! grid.set_input("A1", "1").unwrap();
//! grid.set_input("A2", "2").unwrap();
//! grid.set_input("A3", "3").unwrap();
//!
//! assert_eq!(evaluate_formula("=SUM(A1:A3)", &workbook, &sheet), CellValue::Number(6.0));
//! assert_eq!(evaluate_formula("=A1/0", &workbook, &sheet).to_string(), "#DIV/0!");
//! ```

pub mod ast;
pub mod coerce;
pub mod error;
pub mod evaluator;
pub mod functions;
mod lexer;
pub mod parser;
pub mod split;

pub use ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{
    evaluate, evaluate_cell, evaluate_formula, evaluate_formula_at, evaluate_formula_with,
    function_registry, is_volatile, CellKey, CycleGuard, EvaluationContext, EvaluationOptions, FormulaValue,
};
pub use parser::parse_formula;
pub use split::{find_function_call, smart_split, split_arguments, FunctionCall};
