//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellValue`] - The scalar stored in or computed for a cell
//! - [`CellAddress`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A range of cells (e.g., "A1:B10")
//! - [`SheetReference`] - A reference optionally qualified by a sheet name
//! - [`Cell`] - A literal value or formula held in the grid

mod address;
mod value;

pub use address::{CellAddress, CellRange, SheetReference};
pub use value::{format_number, Cell, CellError, CellValue};
