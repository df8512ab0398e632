//! Cell address, range and sheet-qualified reference types

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// One grid position in A1 notation (`B6`, `$B$6`)
///
/// Column letters are a bijective base-26 numeral (A=1 ... Z=26, AA=27), stored zero-based.
/// The optional `$` markers are kept as flags; evaluation treats absolute and relative
/// references the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    /// Zero-based row (row 1 in A1 notation is 0)
    pub row: u32,
    /// Zero-based column (A is 0, XFD is 16383)
    pub col: u16,
    /// `$` before the row number
    pub row_absolute: bool,
    /// `$` before the column letters
    pub col_absolute: bool,
}

impl CellAddress {
    /// A relative address
    pub fn new(row: u32, col: u16) -> Self {
        Self::with_absolute(row, col, false, false)
    }

    pub fn with_absolute(row: u32, col: u16, row_absolute: bool, col_absolute: bool) -> Self {
        Self {
            row,
            col,
            row_absolute,
            col_absolute,
        }
    }

    /// Parse `[$]LETTERS[$]DIGITS`; letters must be uppercase
    ///
    /// # Examples
    /// ```
    /// use gridcalc_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("B6").unwrap();
    /// assert_eq!((addr.row, addr.col), (5, 1));
    ///
    /// let addr = CellAddress::parse("$B$6").unwrap();
    /// assert!(addr.row_absolute && addr.col_absolute);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let text = s.trim();
        let invalid = |what: &str| Error::InvalidReference(format!("{} in '{}'", what, text));

        let (col_absolute, rest) = match text.strip_prefix('$') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let letters_len = rest
            .find(|c: char| !c.is_ascii_uppercase())
            .unwrap_or(rest.len());
        if letters_len == 0 {
            return Err(invalid("no column letters"));
        }
        let (letters, rest) = rest.split_at(letters_len);

        let (row_absolute, digits) = match rest.strip_prefix('$') {
            Some(digits) => (true, digits),
            None => (false, rest),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("invalid row number"));
        }

        let col = Self::letters_to_column(letters)?;
        let row = match digits.parse::<u32>() {
            Ok(0) => return Err(invalid("row number must be >= 1")),
            Ok(n) => n - 1,
            Err(_) => return Err(invalid("invalid row number")),
        };
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }

        Ok(Self::with_absolute(row, col, row_absolute, col_absolute))
    }

    /// Whether `s` is a single-cell reference
    pub fn is_reference(s: &str) -> bool {
        Self::parse(s).is_ok()
    }

    /// Column letters for a zero-based index (0 -> A, 26 -> AA)
    pub fn column_to_letters(col: u16) -> String {
        let mut letters = Vec::new();
        let mut n = u32::from(col) + 1;
        while n > 0 {
            let digit = (n - 1) % 26;
            letters.push(char::from(b'A' + digit as u8));
            n = (n - 1) / 26;
        }
        letters.iter().rev().collect()
    }

    /// Zero-based index for uppercase column letters (A -> 0, AA -> 26)
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() {
            return Err(Error::InvalidReference("empty column letters".into()));
        }

        let value = letters.chars().try_fold(0u32, |acc, c| {
            if c.is_ascii_uppercase() {
                Ok(acc.saturating_mul(26).saturating_add(c as u32 - 'A' as u32 + 1))
            } else {
                Err(Error::InvalidReference(format!("invalid column letter '{}'", c)))
            }
        })?;

        let col = value - 1;
        u16::try_from(col)
            .ok()
            .filter(|&c| c < MAX_COLS)
            .ok_or(Error::ColumnOutOfBounds(col, MAX_COLS - 1))
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let col_marker = if self.col_absolute { "$" } else { "" };
        let row_marker = if self.row_absolute { "$" } else { "" };
        write!(
            f,
            "{}{}{}{}",
            col_marker,
            Self::column_to_letters(self.col),
            row_marker,
            self.row + 1
        )
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// An inclusive rectangle of cells (`A1:C3`), `start` top-left and `end` bottom-right
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl CellRange {
    /// Build a range from two corners in any order
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        Self {
            start: CellAddress::with_absolute(
                a.row.min(b.row),
                a.col.min(b.col),
                a.row_absolute,
                a.col_absolute,
            ),
            end: CellAddress::with_absolute(
                a.row.max(b.row),
                a.col.max(b.col),
                b.row_absolute,
                b.col_absolute,
            ),
        }
    }

    pub fn from_indices(start_row: u32, start_col: u16, end_row: u32, end_col: u16) -> Self {
        Self::new(
            CellAddress::new(start_row, start_col),
            CellAddress::new(end_row, end_col),
        )
    }

    /// The degenerate range covering one cell
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Parse `A1:C3`; text without `:` is a single-cell range
    pub fn parse(s: &str) -> Result<Self> {
        let text = s.trim();
        let Some((first, second)) = text.split_once(':') else {
            return CellAddress::parse(text).map(Self::single);
        };

        let corner = |part: &str| {
            CellAddress::parse(part).map_err(|e| Error::InvalidRange(format!("'{}': {}", text, e)))
        };
        Ok(Self::new(corner(first)?, corner(second)?))
    }

    pub fn is_single_cell(&self) -> bool {
        (self.start.row, self.start.col) == (self.end.row, self.end.col)
    }

    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn col_count(&self) -> u16 {
        self.end.col - self.start.col + 1
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

/// A reference optionally qualified by a sheet name
///
/// Accepted forms: `'Sheet Name'.B6`, `Sheet.B6` (the unquoted name has no dots), the
/// spreadsheet `!` separator in place of `.`, and any of these with a `:` range.
/// Parsing is purely syntactic; the sheet name is resolved against a workbook by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetReference {
    /// Sheet name, if the reference was qualified
    pub sheet_name: Option<String>,
    /// The referenced cell or range
    pub range: CellRange,
}

impl SheetReference {
    /// Parse a possibly sheet-qualified reference
    ///
    /// # Examples
    /// ```
    /// use gridcalc_core::SheetReference;
    ///
    /// let r = SheetReference::parse("'Sheet 1'.B6").unwrap();
    /// assert_eq!(r.sheet_name.as_deref(), Some("Sheet 1"));
    /// assert_eq!(r.range.start.row, 5);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(rest) = s.strip_prefix('\'') {
            let mut name = String::new();
            let mut chars = rest.char_indices().peekable();
            let mut tail = None;
            while let Some((i, c)) = chars.next() {
                if c == '\'' {
                    if matches!(chars.peek(), Some((_, '\''))) {
                        name.push('\'');
                        chars.next();
                        continue;
                    }
                    tail = Some(&rest[i + 1..]);
                    break;
                }
                name.push(c);
            }

            let tail = tail.ok_or_else(|| {
                Error::InvalidReference(format!("unterminated sheet name in '{}'", s))
            })?;
            let range_text = tail
                .strip_prefix('.')
                .or_else(|| tail.strip_prefix('!'))
                .ok_or_else(|| {
                    Error::InvalidReference(format!("expected '.' after sheet name in '{}'", s))
                })?;

            if name.is_empty() {
                return Err(Error::InvalidReference(format!("empty sheet name in '{}'", s)));
            }

            return Ok(Self {
                sheet_name: Some(name),
                range: CellRange::parse(range_text)?,
            });
        }

        let split = s.find('.').or_else(|| s.find('!'));
        match split {
            Some(pos) => {
                let name = &s[..pos];
                if name.is_empty() {
                    return Err(Error::InvalidReference(format!("empty sheet name in '{}'", s)));
                }
                Ok(Self {
                    sheet_name: Some(name.to_string()),
                    range: CellRange::parse(&s[pos + 1..])?,
                })
            }
            None => Ok(Self {
                sheet_name: None,
                range: CellRange::parse(s)?,
            }),
        }
    }
}
