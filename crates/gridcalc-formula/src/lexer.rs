//! Formula tokenizer

use crate::ast::BinaryOperator;
use gridcalc_core::{CellAddress, CellError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Text(String),
    Bool(bool),
    ErrorLiteral(CellError),
    /// Function name or a bare word
    Word(String),
    /// `A1`, `$B$2`
    Cell(String),
    /// `Data.` or `'My Sheet'!`, the separator already consumed
    SheetPrefix(String),
    /// Infix operator; `+` and `-` double as prefix signs
    Operator(BinaryOperator),
    Percent,
    Colon,
    Comma,
    Semicolon,
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    Bad(String),
    End,
}

pub(crate) struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    /// Open call/array brackets; commas inside them separate items, not thousands
    pub(crate) list_depth: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            list_depth: 0,
        }
    }

    pub(crate) fn next_token(&mut self) -> Token {
        self.pos = self.src.len() - self.rest().trim_start().len();

        let Some(c) = self.nth(0) else {
            return Token::End;
        };

        let simple = match c {
            '+' => Token::Operator(BinaryOperator::Add),
            '-' => Token::Operator(BinaryOperator::Subtract),
            '*' => Token::Operator(BinaryOperator::Multiply),
            '/' => Token::Operator(BinaryOperator::Divide),
            '^' => Token::Operator(BinaryOperator::Power),
            '&' => Token::Operator(BinaryOperator::Concat),
            '=' => Token::Operator(BinaryOperator::Equal),
            '%' => Token::Percent,
            ':' => Token::Colon,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '(' => Token::OpenParen,
            ')' => Token::CloseParen,
            '{' => Token::OpenBrace,
            '}' => Token::CloseBrace,
            _ => return self.compound(c),
        };
        self.bump();
        simple
    }

    fn compound(&mut self, c: char) -> Token {
        match c {
            '<' => {
                self.bump();
                let op = if self.bump_if('=') {
                    BinaryOperator::LessEqual
                } else if self.bump_if('>') {
                    BinaryOperator::NotEqual
                } else {
                    BinaryOperator::LessThan
                };
                Token::Operator(op)
            }
            '>' => {
                self.bump();
                let op = if self.bump_if('=') {
                    BinaryOperator::GreaterEqual
                } else {
                    BinaryOperator::GreaterThan
                };
                Token::Operator(op)
            }
            '!' => {
                self.bump();
                if self.bump_if('=') {
                    Token::Operator(BinaryOperator::NotEqual)
                } else {
                    Token::Bad("!".into())
                }
            }
            '"' => self.text(),
            '\'' => self.quoted_sheet(),
            // $1,234.56
            '$' if self.number_starts_at(1) => {
                self.bump();
                self.number()
            }
            _ if self.number_starts_at(0) => self.number(),
            '#' => self.error_literal(),
            _ if c.is_ascii_alphabetic() || c == '_' || c == '$' => self.word(),
            _ => {
                self.bump();
                Token::Bad(c.to_string())
            }
        }
    }

    fn text(&mut self) -> Token {
        self.bump();
        let mut out = String::new();
        while let Some(c) = self.bump() {
            match c {
                '"' | '\\' if self.nth(0) == Some('"') => {
                    self.bump();
                    out.push('"');
                }
                '"' => return Token::Text(out),
                _ => out.push(c),
            }
        }
        Token::Bad("unterminated string".into())
    }

    fn quoted_sheet(&mut self) -> Token {
        self.bump();
        let mut name = String::new();
        loop {
            match self.bump() {
                None => return Token::Bad("unterminated sheet name".into()),
                Some('\'') if self.bump_if('\'') => name.push('\''),
                Some('\'') => break,
                Some(c) => name.push(c),
            }
        }

        if !name.is_empty() && (self.bump_if('.') || self.bump_if('!')) {
            Token::SheetPrefix(name)
        } else {
            Token::Bad(format!("'{}' is not followed by a reference", name))
        }
    }

    fn number(&mut self) -> Token {
        let mut text = self.take_while(0, |c| c.is_ascii_digit()).to_string();

        if self.list_depth == 0 && (1..=3).contains(&text.len()) {
            while self.at_thousands_group() {
                self.bump();
                text.push_str(self.take_while(0, |c| c.is_ascii_digit()));
            }
        }

        if self.bump_if('.') {
            text.push('.');
            text.push_str(self.take_while(0, |c| c.is_ascii_digit()));
        }

        if let Some(exponent) = self.exponent() {
            text.push_str(&exponent);
        }

        match text.parse::<f64>() {
            Ok(n) => Token::Number(n),
            Err(_) => Token::Bad(text),
        }
    }

    /// `e7`, `E-3`; a bare `e` is left for the next token
    fn exponent(&mut self) -> Option<String> {
        let tail = self.rest().strip_prefix(['e', 'E'])?;
        let unsigned = tail.strip_prefix(['+', '-']).unwrap_or(tail);
        if !unsigned.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        let sign = &tail[..tail.len() - unsigned.len()];
        self.pos += 1 + sign.len();
        Some(format!("e{}{}", sign, self.take_while(0, |c| c.is_ascii_digit())))
    }

    /// A comma followed by exactly three digits
    fn at_thousands_group(&self) -> bool {
        match self.rest().strip_prefix(',') {
            Some(group) => group.bytes().take_while(u8::is_ascii_digit).count() == 3,
            None => false,
        }
    }

    fn number_starts_at(&self, offset: usize) -> bool {
        let mut chars = self.rest().chars().skip(offset);
        match (chars.next(), chars.next()) {
            (Some(c), _) if c.is_ascii_digit() => true,
            (Some('.'), Some(d)) => d.is_ascii_digit(),
            _ => false,
        }
    }

    fn error_literal(&mut self) -> Token {
        let text = self.take_while(1, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '!' | '/' | '?')
        });
        match CellError::from_str(text) {
            Some(e) => Token::ErrorLiteral(e),
            None => Token::Bad(text.to_string()),
        }
    }

    fn word(&mut self) -> Token {
        let start = self.pos;
        let text = self.take_while(0, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.')
        });

        // Data!A1, but A1!=B1 is a comparison
        if self.nth(0) == Some('!') && self.nth(1) != Some('=') {
            self.bump();
            return Token::SheetPrefix(text.to_string());
        }

        // Unquoted sheet names hold no dots, so Data.A1 splits at the first one
        if let Some((sheet, rest)) = text.split_once('.') {
            let names_cell = rest
                .split('.')
                .next()
                .map_or(false, CellAddress::is_reference);
            if !sheet.is_empty() && !sheet.contains('$') && names_cell {
                self.pos = start + sheet.len() + 1;
                return Token::SheetPrefix(sheet.to_string());
            }
        }

        // LOG10(100) is a call
        if !self.rest().trim_start().starts_with('(') {
            if text.eq_ignore_ascii_case("TRUE") {
                return Token::Bool(true);
            }
            if text.eq_ignore_ascii_case("FALSE") {
                return Token::Bool(false);
            }
            if CellAddress::is_reference(text) {
                return Token::Cell(text.to_string());
            }
        }

        Token::Word(text.to_string())
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.nth(0)?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        let hit = self.nth(0) == Some(expected);
        if hit {
            self.pos += expected.len_utf8();
        }
        hit
    }

    /// Consume `skip` bytes plus the run of chars matching `pred` after them
    fn take_while(&mut self, skip: usize, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest[skip..]
            .find(|c: char| !pred(c))
            .map_or(rest.len(), |n| n + skip);
        self.pos += len;
        &rest[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            match lexer.next_token() {
                Token::End => return out,
                t => out.push(t),
            }
        }
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("<> <= >= != < > ^ &"),
            vec![
                Token::Operator(BinaryOperator::NotEqual),
                Token::Operator(BinaryOperator::LessEqual),
                Token::Operator(BinaryOperator::GreaterEqual),
                Token::Operator(BinaryOperator::NotEqual),
                Token::Operator(BinaryOperator::LessThan),
                Token::Operator(BinaryOperator::GreaterThan),
                Token::Operator(BinaryOperator::Power),
                Token::Operator(BinaryOperator::Concat),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokens("1,234,567.5"), vec![Token::Number(1234567.5)]);
        assert_eq!(tokens("$12.50"), vec![Token::Number(12.5)]);
        assert_eq!(tokens(".5 2e3 4E-1"), vec![
            Token::Number(0.5),
            Token::Number(2000.0),
            Token::Number(0.4),
        ]);
        // 1,2345 is not a thousands group
        assert_eq!(
            tokens("1,2345"),
            vec![Token::Number(1.0), Token::Comma, Token::Number(2345.0)]
        );
    }

    #[test]
    fn test_commas_inside_lists() {
        let mut lexer = Lexer::new("1,234");
        lexer.list_depth = 1;
        assert_eq!(lexer.next_token(), Token::Number(1.0));
        assert_eq!(lexer.next_token(), Token::Comma);
        assert_eq!(lexer.next_token(), Token::Number(234.0));
    }

    #[test]
    fn test_strings_and_sheets() {
        assert_eq!(
            tokens(r#""say ""hi""" "a\"b""#),
            vec![Token::Text("say \"hi\"".into()), Token::Text("a\"b".into())]
        );
        assert_eq!(
            tokens("'It''s'.A1 Data!B2 Data.C3"),
            vec![
                Token::SheetPrefix("It's".into()),
                Token::Cell("A1".into()),
                Token::SheetPrefix("Data".into()),
                Token::Cell("B2".into()),
                Token::SheetPrefix("Data".into()),
                Token::Cell("C3".into()),
            ]
        );
        assert!(matches!(tokens("\"open")[0], Token::Bad(_)));
        assert!(matches!(tokens("'Data' 1")[0], Token::Bad(_)));
    }

    #[test]
    fn test_words() {
        assert_eq!(
            tokens("true LOG10(A1!=B1"),
            vec![
                Token::Bool(true),
                Token::Word("LOG10".into()),
                Token::OpenParen,
                Token::Cell("A1".into()),
                Token::Operator(BinaryOperator::NotEqual),
                Token::Cell("B1".into()),
            ]
        );
        assert_eq!(tokens("#N/A #bogus"), vec![
            Token::ErrorLiteral(CellError::Na),
            Token::Bad("#bogus".into()),
        ]);
    }
}
