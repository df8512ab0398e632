//! Workbook loading from JSON
//!
//! ```json
//! {"sheets": [{"name": "Sheet1", "cells": {"A1": 1, "B1": "=A1*2"}}]}
//! ```

use anyhow::{bail, Context, Result};
use gridcalc::{SheetId, Workbook};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkbookFile {
    sheets: Vec<SheetFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SheetFile {
    name: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    cells: BTreeMap<String, Value>,
}

/// Read a workbook from a JSON file
pub fn load_workbook(path: &Path) -> Result<Workbook> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let workbook =
        parse_workbook(&text).with_context(|| format!("Failed to load '{}'", path.display()))?;
    debug!(path = %path.display(), sheets = workbook.sheet_count(), "loaded workbook");
    Ok(workbook)
}

/// Build a workbook from its JSON text
pub fn parse_workbook(text: &str) -> Result<Workbook> {
    let file: WorkbookFile = serde_json::from_str(text).context("Invalid workbook JSON")?;
    if file.sheets.is_empty() {
        bail!("Workbook has no sheets");
    }

    let mut workbook = Workbook::empty();
    for sheet in file.sheets {
        let id = match sheet.id {
            Some(id) => workbook.add_sheet_with_id(id, &sheet.name),
            None => workbook.add_sheet(&sheet.name),
        }
        .with_context(|| format!("Cannot add sheet '{}'", sheet.name))?;

        let target = workbook
            .sheet_mut(&id)
            .with_context(|| format!("Sheet '{}' vanished after insertion", sheet.name))?;
        for (address, value) in &sheet.cells {
            let input = match value {
                Value::Null => continue,
                Value::Bool(true) => "TRUE".to_string(),
                Value::Bool(false) => "FALSE".to_string(),
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.clone(),
                Value::Array(_) | Value::Object(_) => {
                    bail!("Cell {}!{} must hold a scalar", sheet.name, address)
                }
            };
            target
                .set_input(address, &input)
                .with_context(|| format!("Bad cell {}!{}", sheet.name, address))?;
        }
    }
    Ok(workbook)
}

/// Pick a sheet by name, or the first sheet when no name is given
pub fn select_sheet(workbook: &Workbook, name: Option<&str>) -> Result<SheetId> {
    let sheet = match name {
        Some(name) => workbook
            .sheet_by_name(name)
            .with_context(|| format!("No sheet named '{}'", name))?,
        None => workbook.sheet_at(0).context("Workbook has no sheets")?,
    };
    Ok(sheet.id().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc::{CellValue, WorkbookCalculationExt};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_parse_workbook() {
        let wb = parse_workbook(
            r#"{"sheets": [
                {"name": "Main", "cells": {"A1": 2, "B1": "=A1*2", "C1": true, "D1": null}},
                {"name": "Data", "id": "data", "cells": {"A1": "label"}}
            ]}"#,
        )
        .unwrap();

        assert_eq!(wb.sheet_count(), 2);
        let main = select_sheet(&wb, None).unwrap();
        assert_eq!(wb.evaluate(&main, "=B1+1"), CellValue::Number(5.0));
        assert_eq!(wb.evaluate(&main, "=C1"), CellValue::Boolean(true));
        assert_eq!(wb.evaluate(&main, "=Data.A1"), CellValue::string("label"));
        assert_eq!(select_sheet(&wb, Some("Data")).unwrap(), SheetId::new("data"));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse_workbook(r#"{"sheets": []}"#).is_err());
        assert!(parse_workbook(r#"{"sheets": [{"name": "S", "cells": {"A1": [1]}}]}"#).is_err());
        assert!(parse_workbook(r#"{"sheets": [{"name": "S", "cells": {"1A": 1}}]}"#).is_err());
        assert!(parse_workbook(r#"{"sheets": [{"name": "S"}, {"name": "S"}]}"#).is_err());

        let wb = parse_workbook(r#"{"sheets": [{"name": "S"}]}"#).unwrap();
        assert!(select_sheet(&wb, Some("T")).is_err());
    }

    #[test]
    fn test_load_workbook_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"sheets": [{{"name": "S", "cells": {{"A1": 1.5}}}}]}}"#).unwrap();

        let wb = load_workbook(file.path()).unwrap();
        let sheet = select_sheet(&wb, Some("S")).unwrap();
        assert_eq!(wb.evaluate(&sheet, "=A1*2"), CellValue::Number(3.0));

        assert!(load_workbook(Path::new("/nonexistent/workbook.json")).is_err());
    }
}
