//! Formula parser
//!
//! The whole formula is parsed once into a [`FormulaExpr`] tree; references and nested
//! calls are resolved later by the evaluator rather than substituted into the text.
//!
//! Binary operators share one precedence-climbing loop. Prefix `-`/`+` and postfix `%`
//! bind tighter than all of them, so `-2^2` is `(-2)^2`.

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::lexer::{Lexer, Token};
use gridcalc_core::{CellAddress, CellRange};

/// Deepest nesting of brackets, calls and prefix signs a formula may use
pub const MAX_NESTING: usize = 128;

/// Parse formula text (leading `=` required) into a tree
///
/// ```rust
/// use gridcalc_formula::{parse_formula, FormulaExpr};
///
/// assert!(matches!(parse_formula("=SUM(A1:A10)"), Ok(FormulaExpr::Function { .. })));
/// assert!(parse_formula("='Sheet 2'.B6*2").is_ok());
/// assert!(parse_formula("1+2").is_err());
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let body = formula
        .trim()
        .strip_prefix('=')
        .ok_or_else(|| syntax("a formula starts with '='"))?;

    let mut parser = Parser::new(body);
    let expr = parser.expression()?;
    match parser.token {
        Token::End => Ok(expr),
        ref trailing => Err(syntax(format!("unexpected {:?} after expression", trailing))),
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    /// One token of lookahead, already scanned
    token: Token,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(body: &'a str) -> Self {
        let mut lexer = Lexer::new(body);
        let token = lexer.next_token();
        Self {
            lexer,
            token,
            depth: 0,
        }
    }

    fn bump(&mut self) -> Token {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.token, next)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        let hit = self.token == *expected;
        if hit {
            self.bump();
        }
        hit
    }

    fn expect(&mut self, expected: Token) -> FormulaResult<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(syntax(format!("expected {:?}, found {:?}", expected, self.token)))
        }
    }

    fn expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.nested(|parser| parser.infix(0))
    }

    /// Run `parse` one nesting level deeper, failing past [`MAX_NESTING`]
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> FormulaResult<T>,
    ) -> FormulaResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(syntax(format!("nesting deeper than {} levels", MAX_NESTING)));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn infix(&mut self, min_power: u8) -> FormulaResult<FormulaExpr> {
        let mut left = self.prefix()?;
        while let Token::Operator(op) = self.token {
            let power = precedence(op);
            if power < min_power {
                break;
            }
            self.bump();
            // ^ groups to the right
            let next_min = if op == BinaryOperator::Power { power } else { power + 1 };
            let right = self.nested(|parser| parser.infix(next_min))?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn prefix(&mut self) -> FormulaResult<FormulaExpr> {
        match self.token {
            Token::Operator(BinaryOperator::Subtract) => {
                self.bump();
                let operand = self.nested(Self::prefix)?;
                Ok(unary(UnaryOperator::Negate, operand))
            }
            Token::Operator(BinaryOperator::Add) => {
                self.bump();
                self.nested(Self::prefix)
            }
            _ => {
                let mut expr = self.range()?;
                while self.eat(&Token::Percent) {
                    expr = unary(UnaryOperator::Percent, expr);
                }
                Ok(expr)
            }
        }
    }

    fn range(&mut self) -> FormulaResult<FormulaExpr> {
        let start = self.primary()?;
        if !self.eat(&Token::Colon) {
            return Ok(start);
        }
        let end = self.primary()?;

        let (FormulaExpr::CellRef(start), FormulaExpr::CellRef(end)) = (start, end) else {
            return Err(syntax("':' must join two cell references"));
        };
        // Data.A1:B3 - the end corner inherits the sheet
        let sheet = match (start.sheet, end.sheet) {
            (Some(a), Some(b)) if a != b => {
                return Err(syntax(format!("range spans sheets '{}' and '{}'", a, b)))
            }
            (a, b) => a.or(b),
        };
        Ok(FormulaExpr::RangeRef(RangeReference {
            sheet,
            range: CellRange::new(start.address, end.address),
        }))
    }

    fn primary(&mut self) -> FormulaResult<FormulaExpr> {
        if self.token == Token::OpenBrace {
            return self.array();
        }

        let expr = match self.bump() {
            Token::Number(n) => FormulaExpr::Number(n),
            Token::Text(s) => FormulaExpr::String(s),
            Token::Bool(b) => FormulaExpr::Boolean(b),
            Token::ErrorLiteral(e) => FormulaExpr::Error(e),
            Token::OpenParen => {
                let inner = self.expression()?;
                self.expect(Token::CloseParen)?;
                inner
            }
            Token::SheetPrefix(sheet) => match self.bump() {
                Token::Cell(text) => cell_reference(Some(sheet), &text)?,
                other => {
                    return Err(syntax(format!(
                        "sheet '{}' must be followed by a cell, found {:?}",
                        sheet, other
                    )))
                }
            },
            Token::Cell(text) => cell_reference(None, &text)?,
            Token::Word(name) if self.token == Token::OpenParen => self.call(name)?,
            Token::Word(name) => FormulaExpr::Name(name),
            Token::Bad(text) => return Err(syntax(format!("unexpected input '{}'", text))),
            other => return Err(syntax(format!("unexpected {:?}", other))),
        };
        Ok(expr)
    }

    /// `{1,2;3,4}`; the depth is raised before `{` is consumed so the first item
    /// already scans with list commas
    fn array(&mut self) -> FormulaResult<FormulaExpr> {
        self.lexer.list_depth += 1;
        self.bump();

        let mut rows = Vec::new();
        let mut row = Vec::new();
        if self.token != Token::CloseBrace {
            row.push(self.expression()?);
            loop {
                if self.eat(&Token::Comma) {
                    row.push(self.expression()?);
                } else if self.eat(&Token::Semicolon) {
                    rows.push(std::mem::take(&mut row));
                    row.push(self.expression()?);
                } else {
                    break;
                }
            }
        }
        if !row.is_empty() {
            rows.push(row);
        }
        if rows.iter().any(|r| r.len() != rows[0].len()) {
            return Err(syntax("array rows must all have the same length"));
        }

        self.lexer.list_depth -= 1;
        self.expect(Token::CloseBrace)?;
        Ok(FormulaExpr::Array(rows))
    }

    fn call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.lexer.list_depth += 1;
        self.bump();

        let mut args = Vec::new();
        if self.token != Token::CloseParen {
            args.push(self.expression()?);
            while self.eat(&Token::Comma) {
                args.push(self.expression()?);
            }
        }

        self.lexer.list_depth -= 1;
        self.expect(Token::CloseParen)?;
        Ok(FormulaExpr::Function {
            name: name.to_uppercase(),
            args,
        })
    }
}

/// Binding power of an infix operator; higher binds tighter
fn precedence(op: BinaryOperator) -> u8 {
    use BinaryOperator::*;
    match op {
        Equal | NotEqual | LessThan | LessEqual | GreaterThan | GreaterEqual => 1,
        Concat => 2,
        Add | Subtract => 3,
        Multiply | Divide => 4,
        Power => 5,
    }
}

fn cell_reference(sheet: Option<String>, text: &str) -> FormulaResult<FormulaExpr> {
    let address = CellAddress::parse(text)
        .map_err(|e| syntax(format!("bad cell reference '{}': {}", text, e)))?;
    Ok(FormulaExpr::CellRef(CellReference { sheet, address }))
}

fn syntax(message: impl Into<String>) -> FormulaError {
    FormulaError::Parse(message.into())
}

fn unary(op: UnaryOperator, operand: FormulaExpr) -> FormulaExpr {
    FormulaExpr::UnaryOp {
        op,
        operand: Box::new(operand),
    }
}

fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
    FormulaExpr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
