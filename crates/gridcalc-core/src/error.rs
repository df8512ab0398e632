//! Errors raised by the grid data model
//!
//! These cover building and addressing the grid. Formula evaluation never surfaces them
//! directly; it reports problems as [`CellError`](crate::CellError) values instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Text outside the `[$]?[A-Z]+[$]?[0-9]+` grammar
    #[error("invalid cell reference: {0}")]
    InvalidReference(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// Zero-based row past the last row of a sheet
    #[error("row {0} is past the last row ({1})")]
    RowOutOfBounds(u32, u32),

    /// Zero-based column past the last column of a sheet
    #[error("column {0} is past the last column ({1})")]
    ColumnOutOfBounds(u32, u16),

    #[error("no sheet '{0}'")]
    SheetNotFound(String),

    #[error("invalid sheet name: {0}")]
    InvalidSheetName(String),

    /// A sheet with this name (or id) is already in the workbook
    #[error("duplicate sheet: {0}")]
    DuplicateSheetName(String),

    #[error("{0}")]
    Other(String),
}
