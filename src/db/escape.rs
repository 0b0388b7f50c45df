//! Identifier and literal escaping.

/// Escape a string for use inside `quote_char`-delimited literals using
/// backslash escapes (REST formula strings).
pub fn escape_string_for_quote(s: &str, quote_char: char) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            c if c == quote_char => {
                result.push('\\');
                result.push(c);
            }
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c => result.push(c),
        }
    }
    result
}

/// Wrap an identifier in `open`/`close`, doubling any embedded closing character.
pub fn quote_identifier(ident: &str, open: char, close: char) -> String {
    let mut quoted = String::with_capacity(ident.len() + 2);
    quoted.push(open);
    for c in ident.chars() {
        if c == close {
            quoted.push(close);
        }
        quoted.push(c);
    }
    quoted.push(close);
    quoted
}

/// SQL string literal with embedded single quotes doubled.
pub fn escape_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Collect the single-quoted literals in a fragment such as
/// `enum('A','B')` or `([role]='USER' OR [role]='ADMIN')`.
pub fn quoted_literals(fragment: &str) -> Vec<String> {
    let mut literals = Vec::new();
    let mut chars = fragment.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }
        let mut literal = String::new();
        loop {
            match chars.next() {
                Some('\'') if chars.peek() == Some(&'\'') => {
                    chars.next();
                    literal.push('\'');
                }
                Some('\'') | None => break,
                Some(other) => literal.push(other),
            }
        }
        literals.push(literal);
    }
    literals
}
