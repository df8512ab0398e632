//! Scalar cell values and error sentinels

use lazy_regex::regex_is_match;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A scalar value: the literal content of a cell or the result of a formula
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CellValue {
    /// Nothing stored; reads as 0 in arithmetic and "" in text
    #[default]
    Empty,

    /// Numeric value (all numbers stored as f64, including date serials)
    Number(f64),

    String(String),

    Boolean(bool),

    /// Error sentinel (#REF!, #DIV/0!, etc.)
    Error(CellError),
}

impl CellValue {
    /// Shorthand for `CellValue::String(s.into())`
    pub fn string<S: Into<String>>(s: S) -> Self {
        CellValue::String(s.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Check if the value is an error sentinel
    ///
    /// Sentinel-shaped strings (`#REF!`, `#VALUE!`) count as errors too, so a sentinel
    /// that travelled through a text channel still propagates.
    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }

    /// Get the error carried by this value, if any
    pub fn error(&self) -> Option<CellError> {
        match self {
            CellValue::Error(e) => Some(*e),
            CellValue::String(s) if s.starts_with('#') => CellError::from_sentinel(s),
            _ => None,
        }
    }

    /// Try to get the value as a number (no text coercion)
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(true) => Some(1.0),
            CellValue::Boolean(false) => Some(0.0),
            _ => None,
        }
    }

    /// Booleans, and numbers by `!= 0`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Boolean(b) => Some(*b),
            CellValue::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    /// Try to get the value as a string slice
    pub fn as_string(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Empty => "empty",
            CellValue::Number(_) => "number",
            CellValue::String(_) => "string",
            CellValue::Boolean(_) => "boolean",
            CellValue::Error(_) => "error",
        }
    }
}

/// Format a number the way a grid shows it: integral values without a decimal point
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::string(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<CellError> for CellValue {
    fn from(e: CellError) -> Self {
        CellValue::Error(e)
    }
}

/// Error sentinels produced by evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CellError {
    /// #ERROR! - Generic failure (malformed formula, unknown function)
    Error,
    /// #DIV/0! - Division by zero or infinite result
    Div0,
    /// #REF! - Invalid cell reference or missing sheet
    Ref,
    /// #N/A - Lookup found nothing
    Na,
    /// #NUM! - Invalid numeric value or non-convergence
    Num,
    /// #CIRCULAR! - Reference cycle
    Circular,
}

impl CellError {
    /// Spreadsheet spelling, e.g. `#DIV/0!`
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Error => "#ERROR!",
            CellError::Div0 => "#DIV/0!",
            CellError::Ref => "#REF!",
            CellError::Na => "#N/A",
            CellError::Num => "#NUM!",
            CellError::Circular => "#CIRCULAR!",
        }
    }

    /// Parse an error string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "#ERROR!" => Some(CellError::Error),
            "#DIV/0!" => Some(CellError::Div0),
            "#REF!" => Some(CellError::Ref),
            "#N/A" => Some(CellError::Na),
            "#NUM!" => Some(CellError::Num),
            "#CIRCULAR!" => Some(CellError::Circular),
            _ => None,
        }
    }
}

impl CellError {
    /// Classify sentinel-shaped text such as `#VALUE!` or `#NAME?`
    ///
    /// The known spellings map to their own variant; any other `#` word in capitals
    /// with an optional trailing `!` or `?` is the generic [`CellError::Error`].
    pub fn from_sentinel(s: &str) -> Option<Self> {
        let s = s.trim();
        CellError::from_str(s)
            .or_else(|| regex_is_match!(r"^#[A-Z0-9/]+[!?]?$", s).then_some(CellError::Error))
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A grid cell: a literal value, or a formula whose result is computed on read
///
/// Formula cells never cache a result here; `value` stays `Empty` while `formula` is set.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cell {
    value: CellValue,
    formula: Option<String>,
}

impl Cell {
    /// Create a literal cell
    pub fn value<V: Into<CellValue>>(value: V) -> Self {
        Self {
            value: value.into(),
            formula: None,
        }
    }

    /// Create a formula cell, prefixing `=` if the text lacks it
    pub fn formula<S: AsRef<str>>(text: S) -> Self {
        Self {
            value: CellValue::Empty,
            formula: Some(normalize_formula(text.as_ref())),
        }
    }

    /// Build a cell from user input: text starting with `=` becomes a formula
    pub fn from_input(input: &str) -> Self {
        if input.starts_with('=') {
            Self::formula(input)
        } else {
            Self::value(input)
        }
    }

    /// The literal value (always `Empty` for formula cells)
    pub fn literal(&self) -> &CellValue {
        &self.value
    }

    /// The formula text, including the leading `=`
    pub fn formula_text(&self) -> Option<&str> {
        self.formula.as_deref()
    }

    pub fn is_formula(&self) -> bool {
        self.formula.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.formula.is_none() && self.value.is_empty()
    }
}

fn normalize_formula(text: &str) -> String {
    let text = text.trim();
    if text.starts_with('=') {
        text.to_string()
    } else {
        format!("={}", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cell_value_conversions() {
        assert_eq!(CellValue::from(42), CellValue::Number(42.0));
        assert_eq!(CellValue::from(2.5), CellValue::Number(2.5));
        assert_eq!(CellValue::from(true), CellValue::Boolean(true));
        assert_eq!(CellValue::from("hello").as_string(), Some("hello"));
    }

    #[test]
    fn test_cell_value_as_number() {
        assert_eq!(CellValue::Number(42.0).as_number(), Some(42.0));
        assert_eq!(CellValue::Boolean(true).as_number(), Some(1.0));
        assert_eq!(CellValue::string("12").as_number(), None);
        assert_eq!(CellValue::Empty.as_number(), None);
    }

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::Number(6.0).to_string(), "6");
        assert_eq!(CellValue::Number(-0.25).to_string(), "-0.25");
        assert_eq!(CellValue::Boolean(false).to_string(), "FALSE");
        assert_eq!(CellValue::Empty.to_string(), "");
        assert_eq!(CellValue::Error(CellError::Circular).to_string(), "#CIRCULAR!");
    }

    #[test]
    fn test_error_detection() {
        assert_eq!(CellValue::Error(CellError::Na).error(), Some(CellError::Na));
        assert_eq!(CellValue::string("#REF!").error(), Some(CellError::Ref));
        assert_eq!(CellValue::string("#hashtag").error(), None);
        assert!(!CellValue::Number(1.0).is_error());
    }

    #[test]
    fn test_cell_error_parse() {
        assert_eq!(CellError::from_str("#DIV/0!"), Some(CellError::Div0));
        assert_eq!(CellError::from_str("#n/a"), Some(CellError::Na));
        assert_eq!(CellError::from_str("#circular!"), Some(CellError::Circular));
        assert_eq!(CellError::from_str("#VALUE!"), None);
        assert_eq!(CellError::from_str("invalid"), None);
    }

    #[test]
    fn test_sentinel_shaped_text_is_an_error() {
        assert_eq!(CellError::from_sentinel("#VALUE!"), Some(CellError::Error));
        assert_eq!(CellError::from_sentinel("#NAME?"), Some(CellError::Error));
        assert_eq!(CellError::from_sentinel("#ref!"), Some(CellError::Ref));
        assert_eq!(CellError::from_sentinel("#hashtag"), None);
        assert_eq!(CellError::from_sentinel("# 1"), None);

        assert_eq!(CellValue::string("#VALUE!").error(), Some(CellError::Error));
        assert!(CellValue::string("#NULL!").is_error());
        assert!(!CellValue::string("#todo item").is_error());
    }

    #[test]
    fn test_cell_formula_normalised() {
        let cell = Cell::formula("SUM(A1:A3)");
        assert_eq!(cell.formula_text(), Some("=SUM(A1:A3)"));
        assert_eq!(cell.literal(), &CellValue::Empty);

        let cell = Cell::from_input("=A1");
        assert!(cell.is_formula());

        let cell = Cell::from_input("A1");
        assert_eq!(cell.literal(), &CellValue::string("A1"));
        assert!(!Cell::default().is_formula());
        assert!(Cell::default().is_empty());
    }
}
