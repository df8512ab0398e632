//! # gridcalc-core
//!
//! Core data structures for the gridcalc formula engine.
//!
//! This crate provides the fundamental types used throughout gridcalc:
//! - [`CellValue`] and [`CellError`] - Scalars and the error sentinels
//! - [`CellAddress`], [`CellRange`] and [`SheetReference`] - Reference parsing
//! - [`Cell`], [`Sheet`], [`Workbook`] - The grid data model
//! - [`WorkbookView`] - The read-only interface formula evaluation consumes
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{CellValue, SheetId, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.sheet_mut(&SheetId::new("sheet1")).unwrap();
//!
//! // Using string addresses
//! sheet.set_input("A1", "42").unwrap();
//! sheet.set_input("B1", "=A1*2").unwrap();
//!
//! // Or using row/column indices (0-based)
//! sheet.set_value(1, 0, CellValue::string("World")).unwrap();
//! ```

pub mod cell;
pub mod error;
pub mod workbook;
pub mod worksheet;

// Re-exports for convenience
pub use cell::{
    format_number, Cell, CellAddress, CellError, CellRange, CellValue, SheetReference,
};
pub use error::{Error, Result};
pub use workbook::{Workbook, WorkbookView};
pub use worksheet::{Sheet, SheetId};

/// Maximum number of rows in a sheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a sheet
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
