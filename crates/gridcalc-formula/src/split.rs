//! Nesting-aware text splitting for formula fragments
//!
//! These helpers operate on raw formula text. They split only at top level: delimiters
//! nested inside parentheses or inside double-quoted strings (with `""` or `\"` escapes)
//! are left alone.

/// A function call found at the start of an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    /// Uppercase function name
    pub name: String,
    /// Text between the call's parentheses
    pub args_text: String,
    /// Byte offset just past the matching `)`
    pub span_end: usize,
}

impl FunctionCall {
    /// The call's arguments, split at top-level commas
    pub fn arguments(&self) -> Vec<String> {
        split_arguments(&self.args_text)
    }

    /// Whether the call spans the whole (trimmed) expression it was found in
    pub fn is_whole(&self, expr: &str) -> bool {
        self.span_end == expr.trim_end().len()
    }
}

/// Split a function's argument text on top-level commas
///
/// ```
/// use gridcalc_formula::split::split_arguments;
///
/// assert_eq!(
///     split_arguments(r#"A1:A3, "a,b", MAX(1,2)"#),
///     vec!["A1:A3", "\"a,b\"", "MAX(1,2)"]
/// );
/// ```
pub fn split_arguments(args_text: &str) -> Vec<String> {
    if args_text.trim().is_empty() {
        return Vec::new();
    }
    smart_split(args_text, ',')
}

/// Split an expression on a delimiter that appears at top level
pub fn smart_split(expr: &str, delimiter: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut scanner = Scanner::default();

    let mut chars = expr.chars().peekable();
    while let Some(c) = chars.next() {
        if c == delimiter && scanner.at_top_level() {
            parts.push(current.trim().to_string());
            current.clear();
            continue;
        }
        current.push(c);
        if scanner.in_string && c == '\\' && chars.peek() == Some(&'"') {
            // Escaped quote stays inside the string
            if let Some(q) = chars.next() {
                current.push(q);
            }
            continue;
        }
        scanner.feed(c);
    }

    parts.push(current.trim().to_string());
    parts
}

/// Detect an `UPPERCASE(` call at the start of `expr` and find its matching `)`
///
/// Returns `None` when the text does not start with a call or the parentheses never
/// balance.
pub fn find_function_call(expr: &str) -> Option<FunctionCall> {
    let leading = expr.len() - expr.trim_start().len();
    let body = &expr[leading..];

    let name_len = body
        .find(|c: char| !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '_'))
        .unwrap_or(body.len());
    let name = &body[..name_len];
    if name.is_empty() || !name.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    if !body[name_len..].starts_with('(') {
        return None;
    }

    let open = leading + name_len;
    let mut scanner = Scanner::default();
    let mut escaped = false;
    for (offset, c) in expr[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if scanner.in_string && c == '\\' && expr[open + offset + 1..].starts_with('"') {
            escaped = true;
            continue;
        }
        scanner.feed(c);
        if scanner.depth == 0 && !scanner.in_string && c == ')' {
            let close = open + offset;
            return Some(FunctionCall {
                name: name.to_string(),
                args_text: expr[open + 1..close].to_string(),
                span_end: close + 1,
            });
        }
    }

    None
}

/// Tracks parenthesis depth and string state while walking formula text
#[derive(Debug, Default)]
struct Scanner {
    depth: usize,
    in_string: bool,
}

impl Scanner {
    fn feed(&mut self, c: char) {
        match c {
            '"' => self.in_string = !self.in_string,
            '(' if !self.in_string => self.depth += 1,
            ')' if !self.in_string => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
    }

    fn at_top_level(&self) -> bool {
        self.depth == 0 && !self.in_string
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_arguments_respects_nesting() {
        assert_eq!(
            split_arguments("A1:A10, IF(B1>0,1,2), 3"),
            vec!["A1:A10", "IF(B1>0,1,2)", "3"]
        );
        assert_eq!(split_arguments(""), Vec::<String>::new());
        assert_eq!(split_arguments("1,"), vec!["1", ""]);
    }

    #[test]
    fn test_split_arguments_respects_strings() {
        assert_eq!(
            split_arguments(r#""a,b", "c""d,e", 1"#),
            vec![r#""a,b""#, r#""c""d,e""#, "1"]
        );
        assert_eq!(
            split_arguments(r#""say \"x,y\"", 2"#),
            vec![r#""say \"x,y\"""#, "2"]
        );
    }

    #[test]
    fn test_smart_split_concatenation() {
        assert_eq!(
            smart_split(r#""Total: "&A1&CONCATENATE("a","&")"#, '&'),
            vec![r#""Total: ""#, "A1", r#"CONCATENATE("a","&")"#]
        );
    }

    #[test]
    fn test_find_function_call() {
        let call = find_function_call("SUM(A1:A3, MAX(1,2))").unwrap();
        assert_eq!(call.name, "SUM");
        assert_eq!(call.args_text, "A1:A3, MAX(1,2)");
        assert!(call.is_whole("SUM(A1:A3, MAX(1,2))"));
        assert_eq!(call.arguments(), vec!["A1:A3", "MAX(1,2)"]);

        let text = "ROUND(A1,2)*3";
        let call = find_function_call(text).unwrap();
        assert_eq!(call.span_end, "ROUND(A1,2)".len());
        assert!(!call.is_whole(text));

        let call = find_function_call(r#"LEN(")")"#).unwrap();
        assert_eq!(call.args_text, r#"")""#);
    }

    #[test]
    fn test_find_function_call_rejects() {
        assert_eq!(find_function_call("A1+1"), None);
        assert_eq!(find_function_call("sum(1)"), None);
        assert_eq!(find_function_call("SUM(1"), None);
        assert_eq!(find_function_call("(1+2)"), None);
    }
}
