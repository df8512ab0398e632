//! Sheet type: a named grid of cells

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellAddress, CellRange, CellValue};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

static REVISIONS: AtomicU64 = AtomicU64::new(1);

/// A process-wide fresh revision stamp
///
/// Every mutation of any sheet or workbook takes a new stamp, so two values carrying the
/// same latest stamp went through the same history and hold the same content. Clones
/// share stamps until one of them is edited.
pub(crate) fn next_revision() -> u64 {
    REVISIONS.fetch_add(1, Ordering::Relaxed)
}

/// Stable identifier of a sheet, independent of its display name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SheetId(String);

impl SheetId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        SheetId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SheetId {
    fn from(s: &str) -> Self {
        SheetId::new(s)
    }
}

impl From<String> for SheetId {
    fn from(s: String) -> Self {
        SheetId(s)
    }
}

/// A sheet: an ordered sequence of rows, each an ordered sequence of cells
///
/// Rows may be ragged; positions past the end of a row read as empty. Every mutation bumps
/// the sheet's revision stamp, which callers use to invalidate memoised results.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sheet {
    id: SheetId,
    name: String,
    grid: Vec<Vec<Cell>>,
    #[cfg_attr(feature = "serde", serde(skip, default = "next_revision"))]
    version: u64,
}

impl Sheet {
    /// Create an empty sheet
    pub fn new<I: Into<SheetId>, S: Into<String>>(id: I, name: S) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            grid: Vec::new(),
            version: next_revision(),
        }
    }

    pub fn id(&self) -> &SheetId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
        self.touch();
    }

    /// Revision stamp; replaced by a larger, never reused one on every change
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of rows currently allocated
    pub fn row_count(&self) -> u32 {
        self.grid.len() as u32
    }

    /// Width of the widest row
    pub fn col_count(&self) -> u16 {
        self.grid.iter().map(|r| r.len()).max().unwrap_or(0) as u16
    }

    // === Cell Access ===

    /// Get a cell by row and column indices
    pub fn cell(&self, row: u32, col: u16) -> Option<&Cell> {
        self.grid
            .get(row as usize)
            .and_then(|r| r.get(col as usize))
    }

    /// Get a cell by address string (e.g., "A1")
    pub fn cell_by_address(&self, address: &str) -> Result<Option<&Cell>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cell(addr.row, addr.col))
    }

    /// The literal value at a position (`Empty` for formula cells and missing cells)
    pub fn literal(&self, row: u32, col: u16) -> CellValue {
        self.cell(row, col)
            .map(|c| c.literal().clone())
            .unwrap_or_default()
    }

    /// The formula at a position, if any
    pub fn formula(&self, row: u32, col: u16) -> Option<&str> {
        self.cell(row, col).and_then(|c| c.formula_text())
    }

    /// Iterate over non-empty cells as (row, col, cell)
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u16, &Cell)> {
        self.grid.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, c)| !c.is_empty())
                .map(move |(c, cell)| (r as u32, c as u16, cell))
        })
    }

    /// Iterate over formula cells as (row, col, formula text)
    pub fn formula_cells(&self) -> impl Iterator<Item = (u32, u16, &str)> {
        self.iter_cells()
            .filter_map(|(r, c, cell)| cell.formula_text().map(|f| (r, c, f)))
    }

    /// Bounding range of all non-empty cells
    pub fn used_range(&self) -> Option<CellRange> {
        let mut bounds: Option<(u32, u16, u32, u16)> = None;
        for (r, c, _) in self.iter_cells() {
            bounds = Some(match bounds {
                None => (r, c, r, c),
                Some((r0, c0, r1, c1)) => (r0.min(r), c0.min(c), r1.max(r), c1.max(c)),
            });
        }
        bounds.map(|(r0, c0, r1, c1)| CellRange::from_indices(r0, c0, r1, c1))
    }

    // === Mutation ===

    /// Store a cell at a position, growing the grid as needed
    pub fn set_cell(&mut self, row: u32, col: u16, cell: Cell) -> Result<()> {
        Self::check_bounds(row, col)?;
        let slot = self.slot_mut(row, col);
        *slot = cell;
        self.touch();
        Ok(())
    }

    /// Store a literal value
    pub fn set_value<V: Into<CellValue>>(&mut self, row: u32, col: u16, value: V) -> Result<()> {
        self.set_cell(row, col, Cell::value(value))
    }

    /// Store a formula; the text is normalised to start with `=`
    pub fn set_formula(&mut self, row: u32, col: u16, formula: &str) -> Result<()> {
        self.set_cell(row, col, Cell::formula(formula))
    }

    /// Store user input at an A1 address
    ///
    /// `=...` becomes a formula, finite numbers become numbers, `TRUE`/`FALSE` become
    /// booleans and anything else is stored as text.
    pub fn set_input(&mut self, address: &str, input: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        let trimmed = input.trim();
        let cell = if input.starts_with('=') {
            Cell::formula(input)
        } else if let Some(n) = trimmed.parse::<f64>().ok().filter(|n| n.is_finite()) {
            Cell::value(n)
        } else if trimmed.eq_ignore_ascii_case("TRUE") {
            Cell::value(true)
        } else if trimmed.eq_ignore_ascii_case("FALSE") {
            Cell::value(false)
        } else if input.is_empty() {
            Cell::default()
        } else {
            Cell::value(input)
        };
        self.set_cell(addr.row, addr.col, cell)
    }

    /// Reset a position to empty
    pub fn clear_cell(&mut self, row: u32, col: u16) {
        if let Some(cell) = self
            .grid
            .get_mut(row as usize)
            .and_then(|r| r.get_mut(col as usize))
        {
            *cell = Cell::default();
            self.touch();
        }
    }

    /// Write a block of cells with its top-left corner at (row, col)
    pub fn set_range_values(&mut self, row: u32, col: u16, rows: Vec<Vec<Cell>>) -> Result<()> {
        let height = rows.len() as u32;
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        if height == 0 || width == 0 {
            return Ok(());
        }
        let last_row = row.saturating_add(height - 1);
        let last_col = col as u32 + width - 1;
        if last_row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(last_row, MAX_ROWS - 1));
        }
        if last_col >= MAX_COLS as u32 {
            return Err(Error::ColumnOutOfBounds(last_col, MAX_COLS - 1));
        }

        for (dr, cells) in rows.into_iter().enumerate() {
            for (dc, cell) in cells.into_iter().enumerate() {
                *self.slot_mut(row + dr as u32, col + dc as u16) = cell;
            }
        }
        self.touch();
        Ok(())
    }

    /// Insert `count` empty rows before `at`
    pub fn insert_rows(&mut self, at: u32, count: u32) -> Result<()> {
        if at >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(at, MAX_ROWS - 1));
        }
        let at = (at as usize).min(self.grid.len());
        self.grid
            .splice(at..at, (0..count).map(|_| Vec::new()));
        self.grid.truncate(MAX_ROWS as usize);
        self.touch();
        Ok(())
    }

    /// Delete `count` rows starting at `at`; rows below shift up
    pub fn delete_rows(&mut self, at: u32, count: u32) {
        let start = (at as usize).min(self.grid.len());
        let end = (at as usize + count as usize).min(self.grid.len());
        if start < end {
            self.grid.drain(start..end);
        }
        self.touch();
    }

    /// Insert `count` empty columns before `at` in every row
    pub fn insert_cols(&mut self, at: u16, count: u16) -> Result<()> {
        if at >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(at as u32, MAX_COLS - 1));
        }
        for row in &mut self.grid {
            if (at as usize) < row.len() {
                let at = at as usize;
                row.splice(at..at, (0..count).map(|_| Cell::default()));
                row.truncate(MAX_COLS as usize);
            }
        }
        self.touch();
        Ok(())
    }

    /// Delete `count` columns starting at `at`; columns to the right shift left
    pub fn delete_cols(&mut self, at: u16, count: u16) {
        for row in &mut self.grid {
            let start = (at as usize).min(row.len());
            let end = (at as usize + count as usize).min(row.len());
            if start < end {
                row.drain(start..end);
            }
        }
        self.touch();
    }

    fn slot_mut(&mut self, row: u32, col: u16) -> &mut Cell {
        let (row, col) = (row as usize, col as usize);
        if self.grid.len() <= row {
            self.grid.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.grid[row];
        if cells.len() <= col {
            cells.resize_with(col + 1, Cell::default);
        }
        &mut cells[col]
    }

    fn check_bounds(row: u32, col: u16) -> Result<()> {
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }
        if col >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(col as u32, MAX_COLS - 1));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.version = next_revision();
    }
}
