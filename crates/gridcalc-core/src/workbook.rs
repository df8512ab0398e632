//! Workbook type - the multi-sheet container the evaluator reads from

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, SheetReference};
use crate::error::{Error, Result};
use crate::worksheet::{next_revision, Sheet, SheetId};
use crate::MAX_SHEET_NAME_LEN;

/// Read-only view of a workbook, as consumed by formula evaluation
///
/// The evaluator never creates, deletes or writes sheets; it only looks sheets up and
/// reads cells through this trait.
pub trait WorkbookView {
    /// Resolve a sheet name (exact match) to its id
    fn sheet_id_by_name(&self, name: &str) -> Option<&SheetId>;

    /// Whether a sheet with this id exists
    fn contains_sheet(&self, id: &SheetId) -> bool;

    /// Read a cell; `None` for unknown sheets and unallocated positions
    fn cell(&self, sheet: &SheetId, row: u32, col: u16) -> Option<&Cell>;

    /// Allocated (rows, columns) of a sheet; every position outside reads as empty
    fn used_extent(&self, sheet: &SheetId) -> (u32, u16);
}

impl SheetReference {
    /// Resolve the sheet this reference points to
    ///
    /// Unqualified references resolve to `current`. A qualified reference to a name no
    /// sheet carries resolves to `None`, which callers report as `#REF!`.
    pub fn resolve_sheet(&self, view: &dyn WorkbookView, current: &SheetId) -> Option<SheetId> {
        match &self.sheet_name {
            None => Some(current.clone()),
            Some(name) => view.sheet_id_by_name(name).cloned(),
        }
    }
}

/// A workbook: an ordered list of sheets, looked up by id or by name
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Workbook {
    sheets: Vec<Sheet>,
    /// Stamp of the last sheet-list change
    #[cfg_attr(feature = "serde", serde(skip, default = "next_revision"))]
    revision: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    next_id: u64,
}

impl Workbook {
    /// Create a workbook with one empty sheet named "Sheet1"
    pub fn new() -> Self {
        Self {
            sheets: vec![Sheet::new("sheet1", "Sheet1")],
            revision: next_revision(),
            next_id: 2,
        }
    }

    /// Create a workbook with no sheets
    pub fn empty() -> Self {
        Self {
            sheets: Vec::new(),
            revision: next_revision(),
            next_id: 1,
        }
    }

    /// Get the number of sheets
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Latest revision stamp of the workbook or any of its sheets
    ///
    /// Grows on every edit and is never shared by two workbooks with different content,
    /// including a clone restored after its original was edited.
    pub fn version(&self) -> u64 {
        self.sheets
            .iter()
            .map(Sheet::version)
            .fold(self.revision, u64::max)
    }

    /// Iterate over sheets in order
    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter()
    }

    /// Get a sheet by position
    pub fn sheet_at(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    /// Get a sheet by id
    pub fn sheet(&self, id: &SheetId) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.id() == id)
    }

    /// Get a mutable sheet by id
    pub fn sheet_mut(&mut self, id: &SheetId) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.id() == id)
    }

    /// Get a sheet by exact name
    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name() == name)
    }

    /// Get a mutable sheet by exact name
    pub fn sheet_by_name_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name() == name)
    }

    /// Add a sheet with a generated id
    pub fn add_sheet(&mut self, name: &str) -> Result<SheetId> {
        let mut id = SheetId::new(format!("sheet{}", self.next_id));
        while self.sheet(&id).is_some() {
            self.next_id += 1;
            id = SheetId::new(format!("sheet{}", self.next_id));
        }
        self.add_sheet_with_id(id, name)
    }

    /// Add a sheet with a caller-chosen id
    pub fn add_sheet_with_id<I: Into<SheetId>>(&mut self, id: I, name: &str) -> Result<SheetId> {
        let id = id.into();
        if self.sheet(&id).is_some() {
            return Err(Error::DuplicateSheetName(format!("id '{}'", id)));
        }
        self.validate_sheet_name(name, None)?;

        self.sheets.push(Sheet::new(id.clone(), name));
        self.next_id += 1;
        self.revision = next_revision();
        Ok(id)
    }

    /// Rename a sheet
    pub fn rename_sheet(&mut self, id: &SheetId, new_name: &str) -> Result<()> {
        self.validate_sheet_name(new_name, Some(id))?;
        let sheet = self
            .sheet_mut(id)
            .ok_or_else(|| Error::SheetNotFound(id.to_string()))?;
        sheet.set_name(new_name);
        Ok(())
    }

    /// Remove a sheet, returning it
    pub fn remove_sheet(&mut self, id: &SheetId) -> Result<Sheet> {
        let index = self
            .sheets
            .iter()
            .position(|s| s.id() == id)
            .ok_or_else(|| Error::SheetNotFound(id.to_string()))?;
        let sheet = self.sheets.remove(index);
        self.revision = next_revision();
        Ok(sheet)
    }

    fn validate_sheet_name(&self, name: &str, exclude: Option<&SheetId>) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }

        const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
        if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }

        // Case-insensitive duplicate check
        let lower = name.to_lowercase();
        let clash = self
            .sheets
            .iter()
            .filter(|s| Some(s.id()) != exclude)
            .any(|s| s.name().to_lowercase() == lower);
        if clash {
            return Err(Error::DuplicateSheetName(name.into()));
        }

        Ok(())
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkbookView for Workbook {
    fn sheet_id_by_name(&self, name: &str) -> Option<&SheetId> {
        self.sheet_by_name(name).map(Sheet::id)
    }

    fn contains_sheet(&self, id: &SheetId) -> bool {
        self.sheet(id).is_some()
    }

    fn cell(&self, sheet: &SheetId, row: u32, col: u16) -> Option<&Cell> {
        self.sheet(sheet).and_then(|s| s.cell(row, col))
    }

    fn used_extent(&self, sheet: &SheetId) -> (u32, u16) {
        self.sheet(sheet)
            .map_or((0, 0), |s| (s.row_count(), s.col_count()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_workbook() {
        let wb = Workbook::new();
        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.sheet_at(0).unwrap().name(), "Sheet1");
        assert!(Workbook::empty().is_empty());
    }

    #[test]
    fn test_add_sheets() {
        let mut wb = Workbook::new();
        let id = wb.add_sheet("Data").unwrap();
        assert_eq!(id, SheetId::new("sheet2"));
        assert_eq!(wb.sheet(&id).unwrap().name(), "Data");

        let custom = wb.add_sheet_with_id("abc", "Other").unwrap();
        assert_eq!(wb.sheet_by_name("Other").unwrap().id(), &custom);

        assert!(wb.add_sheet_with_id("abc", "Third").is_err());
    }

    #[test]
    fn test_duplicate_name() {
        let mut wb = Workbook::new();
        assert!(matches!(
            wb.add_sheet("SHEET1"),
            Err(Error::DuplicateSheetName(_))
        ));
    }

    #[test]
    fn test_invalid_sheet_name() {
        let mut wb = Workbook::new();
        assert!(wb.add_sheet("").is_err());
        assert!(wb.add_sheet("Sheet/1").is_err());
        assert!(wb.add_sheet("Sheet[1]").is_err());
        assert!(wb.add_sheet(&"A".repeat(MAX_SHEET_NAME_LEN + 1)).is_err());
        // Spaces and dots are fine; such names are quoted in formulas
        assert!(wb.add_sheet("Q1 Sales.v2").is_ok());
    }

    #[test]
    fn test_rename_and_remove() {
        let mut wb = Workbook::new();
        let id = wb.add_sheet("Data").unwrap();
        wb.rename_sheet(&id, "Inputs").unwrap();
        assert!(wb.sheet_by_name("Data").is_none());
        assert!(wb.sheet_by_name("Inputs").is_some());

        // Renaming to its own name with different case is allowed
        wb.rename_sheet(&id, "INPUTS").unwrap();

        wb.remove_sheet(&id).unwrap();
        assert!(!wb.contains_sheet(&id));
        assert!(matches!(
            wb.remove_sheet(&id),
            Err(Error::SheetNotFound(_))
        ));
    }

    #[test]
    fn test_version_is_monotonic() {
        let mut wb = Workbook::new();
        let id = wb.add_sheet("Data").unwrap();
        let v0 = wb.version();

        wb.sheet_mut(&id).unwrap().set_value(0, 0, 1.0).unwrap();
        wb.sheet_mut(&id).unwrap().set_value(0, 1, 2.0).unwrap();
        let v1 = wb.version();
        assert!(v1 > v0);

        wb.remove_sheet(&id).unwrap();
        assert!(wb.version() > v1);
    }

    #[test]
    fn test_view_and_resolution() {
        let mut wb = Workbook::new();
        let data = wb.add_sheet("Data").unwrap();
        wb.sheet_mut(&data).unwrap().set_value(1, 1, 42.0).unwrap();
        let current = SheetId::new("sheet1");

        let view: &dyn WorkbookView = &wb;
        assert_eq!(
            view.cell(&data, 1, 1).map(|c| c.literal().clone()),
            Some(CellValue::Number(42.0))
        );

        let r = SheetReference::parse("'Data'.B2").unwrap();
        assert_eq!(r.resolve_sheet(view, &current), Some(data));

        let r = SheetReference::parse("Missing.B2").unwrap();
        assert_eq!(r.resolve_sheet(view, &current), None);

        let r = SheetReference::parse("B2").unwrap();
        assert_eq!(r.resolve_sheet(view, &current), Some(current.clone()));
    }
}
