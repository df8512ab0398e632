//! Workbook calculation
//!
//! [`Calculator`] evaluates stored formula cells and memoises their results keyed by
//! cell, for as long as [`Workbook::version`] is unchanged. Versions are process-wide
//! revision stamps, so any edit, a different workbook, or a restored snapshot that was
//! edited since all drop the cache. While the workbook holds a volatile formula
//! (TODAY, NOW, INDIRECT) nothing is memoised, since a cached dependent could go stale.
//!
//! # Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let id = SheetId::new("sheet1");
//! let sheet = workbook.sheet_mut(&id).unwrap();
//! sheet.set_input("A1", "10").unwrap();
//! sheet.set_input("A2", "20").unwrap();
//! sheet.set_input("A3", "=A1+A2").unwrap();
//!
//! let mut calculator = Calculator::new(CalculationOptions::default());
//! let (grid, stats) = calculator.calculate_sheet(&workbook, &id).unwrap();
//! assert_eq!(grid[2][0], CellValue::Number(30.0));
//! assert_eq!(stats.formula_count, 1);
//! ```

use crate::{
    evaluate_cell, evaluate_formula_with, is_volatile, parse_formula, CellError, CellKey,
    CellValue, Error, EvaluationOptions, Result, SheetId, Workbook,
};
use ahash::AHashMap;
use tracing::{debug, trace};

/// Options for workbook calculation
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationOptions {
    /// Settings passed to every evaluation
    pub evaluation: EvaluationOptions,
    /// Memoise formula results between calls (default: true)
    pub use_cache: bool,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            evaluation: EvaluationOptions::default(),
            use_cache: true,
        }
    }
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationStats {
    /// Total number of formula cells
    pub formula_count: usize,
    /// Number of formula cells actually evaluated
    pub evaluated: usize,
    /// Number of formula cells answered from the cache
    pub cache_hits: usize,
    /// Number of formula cells whose result is an error sentinel
    pub errors: usize,
    /// Number of formula cells whose result is `#CIRCULAR!`
    pub circular: usize,
}

/// Memoising evaluator for the formula cells of one workbook
#[derive(Debug, Default)]
pub struct Calculator {
    options: CalculationOptions,
    cache: AHashMap<CellKey, CellValue>,
    /// Workbook version the cache belongs to
    version: Option<u64>,
    /// Whether the workbook at `version` contains a volatile formula
    volatile: bool,
}

impl Calculator {
    pub fn new(options: CalculationOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &CalculationOptions {
        &self.options
    }

    /// Number of memoised results
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop all memoised results
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.version = None;
    }

    /// Evaluate an ad-hoc formula against a sheet (never memoised)
    pub fn evaluate(&self, workbook: &Workbook, sheet_id: &SheetId, formula: &str) -> CellValue {
        evaluate_formula_with(formula, workbook, sheet_id, &self.options.evaluation)
    }

    /// Value of the cell at (row, col), evaluating its formula if it has one
    pub fn cell_value(
        &mut self,
        workbook: &Workbook,
        sheet_id: &SheetId,
        row: u32,
        col: u16,
    ) -> CellValue {
        self.lookup(workbook, sheet_id, row, col).0
    }

    /// Materialise every cell of a sheet, with formulas replaced by their results
    pub fn calculate_sheet(
        &mut self,
        workbook: &Workbook,
        sheet_id: &SheetId,
    ) -> Result<(Vec<Vec<CellValue>>, CalculationStats)> {
        let sheet = workbook
            .sheet(sheet_id)
            .ok_or_else(|| Error::SheetNotFound(sheet_id.to_string()))?;

        let mut stats = CalculationStats::default();
        let mut grid = Vec::with_capacity(sheet.row_count() as usize);

        for row in 0..sheet.row_count() {
            let mut values = Vec::with_capacity(sheet.col_count() as usize);
            for col in 0..sheet.col_count() {
                let cell = match sheet.cell(row, col) {
                    Some(cell) => cell,
                    None => {
                        values.push(CellValue::Empty);
                        continue;
                    }
                };
                if !cell.is_formula() {
                    values.push(cell.literal().clone());
                    continue;
                }

                let (value, cached) = self.lookup(workbook, sheet_id, row, col);
                stats.formula_count += 1;
                if cached {
                    stats.cache_hits += 1;
                } else {
                    stats.evaluated += 1;
                }
                match value.error() {
                    Some(CellError::Circular) => {
                        stats.errors += 1;
                        stats.circular += 1;
                    }
                    Some(_) => stats.errors += 1,
                    None => {}
                }
                values.push(value);
            }
            grid.push(values);
        }

        debug!(
            sheet = %sheet_id,
            formulas = stats.formula_count,
            evaluated = stats.evaluated,
            cache_hits = stats.cache_hits,
            errors = stats.errors,
            "sheet calculated"
        );
        Ok((grid, stats))
    }

    /// Cell value plus whether it came from the cache
    fn lookup(
        &mut self,
        workbook: &Workbook,
        sheet_id: &SheetId,
        row: u32,
        col: u16,
    ) -> (CellValue, bool) {
        self.sync(workbook);

        let key = CellKey {
            sheet: sheet_id.clone(),
            row,
            col,
        };
        let memoise = self.options.use_cache && !self.volatile;
        if memoise {
            if let Some(value) = self.cache.get(&key) {
                trace!(cell = %key, "cache hit");
                return (value.clone(), true);
            }
        }

        let value = evaluate_cell(workbook, sheet_id, row, col, &self.options.evaluation);
        let is_formula = workbook
            .sheet(sheet_id)
            .and_then(|s| s.cell(row, col))
            .map_or(false, |c| c.is_formula());
        if memoise && is_formula {
            self.cache.insert(key, value.clone());
        }
        (value, false)
    }

    /// Drop the cache when the workbook changed since it was filled
    fn sync(&mut self, workbook: &Workbook) {
        let version = workbook.version();
        if self.version == Some(version) {
            return;
        }
        if !self.cache.is_empty() {
            debug!(
                entries = self.cache.len(),
                old = ?self.version,
                new = version,
                "workbook changed, invalidating calculation cache"
            );
        }
        self.cache.clear();
        self.version = Some(version);
        self.volatile = workbook.sheets().any(|sheet| {
            sheet.formula_cells().any(|(_, _, formula)| {
                parse_formula(formula).map_or(false, |expr| is_volatile(&expr))
            })
        });
    }
}

/// Extension trait for Workbook to add calculation methods
pub trait WorkbookCalculationExt {
    /// Evaluate an ad-hoc formula against a sheet
    fn evaluate(&self, sheet_id: &SheetId, formula: &str) -> CellValue;

    /// Materialise a sheet with default options
    fn calculate_sheet(&self, sheet_id: &SheetId) -> Result<(Vec<Vec<CellValue>>, CalculationStats)>;
}

impl WorkbookCalculationExt for Workbook {
    fn evaluate(&self, sheet_id: &SheetId, formula: &str) -> CellValue {
        crate::evaluate_formula(formula, self, sheet_id)
    }

    fn calculate_sheet(&self, sheet_id: &SheetId) -> Result<(Vec<Vec<CellValue>>, CalculationStats)> {
        Calculator::new(CalculationOptions::default()).calculate_sheet(self, sheet_id)
    }
}
