//! Lexical rules of Prolog source text.
//!
//! Classification of values as variables, atoms or text that needs quoting.
//! The scanners work on a *masked* copy of the goal in which quoted text and
//! comments are blanked out byte-for-byte. Offsets into the masked copy are
//! valid offsets into the unmasked text.

use regex::Regex;
use std::sync::OnceLock;

/// How a textual argument value is emitted into a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lexeme {
    /// Leading uppercase letter or underscore: emitted verbatim as a variable.
    Variable,
    /// Lowercase identifier: emitted as a bare atom.
    Atom,
    /// Anything else: emitted as a quoted atom.
    Quoted,
}

fn variable_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:_|[A-Z_][A-Za-z0-9_]*)$").expect("Invalid variable regex"))
}

fn atom_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][A-Za-z0-9_]*$").expect("Invalid atom regex"))
}

fn predicate_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z_][a-zA-Z0-9_]*$").expect("Invalid predicate name regex")
    })
}

/// A single argument-like term: identifier, variable, number or quoted text.
fn simple_term_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^(?:[a-z][A-Za-z0-9_]*|[A-Z_][A-Za-z0-9_]*|-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?|'(?:[^'\\]|\\.|'')*'|"(?:[^"\\]|\\.|"")*")$"#,
        )
        .expect("Invalid simple term regex")
    })
}

/// Classify a textual argument value.
pub fn classify(value: &str) -> Lexeme {
    if variable_regex().is_match(value) {
        Lexeme::Variable
    } else if atom_regex().is_match(value) {
        Lexeme::Atom
    } else {
        Lexeme::Quoted
    }
}

/// Whether `name` may be used as a configured predicate name.
pub fn is_predicate_name(name: &str) -> bool {
    predicate_name_regex().is_match(name)
}

/// Whether `text` is a lone identifier, variable, number or quoted literal.
pub fn is_simple_term(text: &str) -> bool {
    simple_term_regex().is_match(text.trim())
}

/// Quote `text` as a Prolog atom, escaping as ISO requires.
pub fn quote_atom(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Render a string value as a goal argument.
pub fn format_text(value: &str) -> String {
    match classify(value) {
        Lexeme::Variable | Lexeme::Atom => value.to_string(),
        Lexeme::Quoted => quote_atom(value),
    }
}

/// Render an atom (never a variable) such as a file path or flag value.
pub fn format_atom(value: &str) -> String {
    match classify(value) {
        Lexeme::Atom => value.to_string(),
        _ => quote_atom(value),
    }
}

/// Uppercase the first letter: the variable name for an unbound parameter.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Blank out quoted text and comments, preserving byte offsets.
pub fn mask(goal: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        Quoted(char),
        LineComment,
        BlockComment,
    }

    let chars: Vec<(usize, char)> = goal.char_indices().collect();
    let mut out = String::with_capacity(goal.len());
    let mut state = State::Code;
    let mut i = 0;

    let blank = |out: &mut String, c: char| {
        if c == '\n' {
            out.push('\n');
        } else {
            out.extend(std::iter::repeat(' ').take(c.len_utf8()));
        }
    };

    while i < chars.len() {
        let c = chars[i].1;
        let next = chars.get(i + 1).map(|&(_, n)| n);
        match state {
            State::Code => match c {
                '\'' | '"' | '`' => {
                    // 0'c is a character code, not the start of a quoted atom
                    let prev = i.checked_sub(1).map(|p| chars[p].1);
                    let before_prev = i.checked_sub(2).map(|p| chars[p].1);
                    let is_char_code = c == '\''
                        && prev == Some('0')
                        && !before_prev.is_some_and(|b| b.is_alphanumeric() || b == '_');
                    if is_char_code {
                        out.push(c);
                        i += 1;
                        // The quoted character itself, with its escape if any.
                        let skip = match chars.get(i).map(|&(_, n)| n) {
                            Some('\\') => 2,
                            Some('\'') if chars.get(i + 1).map(|&(_, n)| n) == Some('\'') => 2,
                            Some(_) => 1,
                            None => 0,
                        };
                        for _ in 0..skip {
                            if let Some(&(_, q)) = chars.get(i) {
                                blank(&mut out, q);
                                i += 1;
                            }
                        }
                        continue;
                    }
                    blank(&mut out, c);
                    state = State::Quoted(c);
                }
                '%' => {
                    blank(&mut out, c);
                    state = State::LineComment;
                }
                '/' if next == Some('*') => {
                    out.push_str("  ");
                    i += 2;
                    state = State::BlockComment;
                    continue;
                }
                _ => out.push(c),
            },
            State::Quoted(q) => {
                blank(&mut out, c);
                if c == '\\' {
                    if let Some(n) = next {
                        blank(&mut out, n);
                        i += 2;
                        continue;
                    }
                } else if c == q {
                    if next == Some(q) {
                        blank(&mut out, q);
                        i += 2;
                        continue;
                    }
                    state = State::Code;
                }
            }
            State::LineComment => {
                blank(&mut out, c);
                if c == '\n' {
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if c == '*' && next == Some('/') {
                    out.push_str("  ");
                    i += 2;
                    state = State::Code;
                    continue;
                }
                blank(&mut out, c);
            }
        }
        i += 1;
    }
    out
}

/// Named variables of `goal` in order of first occurrence.
///
/// Anonymous `_` and `_Name` variables are excluded, as are identifiers
/// inside quoted text or comments.
pub fn free_variables(goal: &str) -> Vec<String> {
    let masked = mask(goal);
    let bytes = masked.as_bytes();
    let mut vars: Vec<String> = Vec::new();
    let mut i = 0;

    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_';

    while i < bytes.len() {
        let b = bytes[i];
        let at_boundary = i == 0 || !is_ident(bytes[i - 1]);
        if at_boundary && (b.is_ascii_uppercase() || b == b'_') {
            let start = i;
            while i < bytes.len() && is_ident(bytes[i]) {
                i += 1;
            }
            let name = &masked[start..i];
            if !name.starts_with('_') && !vars.iter().any(|v| v == name) {
                vars.push(name.to_string());
            }
            continue;
        }
        i += 1;
    }
    vars
}

/// Check that (), [] and {} are balanced and properly nested outside quotes.
pub fn check_brackets(goal: &str) -> Result<(), String> {
    let masked = mask(goal);
    let mut stack: Vec<(char, usize)> = Vec::new();
    for (pos, c) in masked.char_indices() {
        match c {
            '(' | '[' | '{' => stack.push((c, pos)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, at)) => {
                        return Err(format!("'{open}' at offset {at} closed by '{c}' at offset {pos}"))
                    }
                    None => return Err(format!("unexpected '{c}' at offset {pos}")),
                }
            }
            _ => {}
        }
    }
    match stack.pop() {
        Some((open, at)) => Err(format!("unclosed '{open}' at offset {at}")),
        None => Ok(()),
    }
}

/// Split `text` at commas that are not nested in brackets or quotes.
pub fn split_top_level(text: &str) -> Vec<&str> {
    let masked = mask(text);
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (pos, c) in masked.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(text[start..pos].trim());
                start = pos + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}

/// If `text` is exactly one compound term `name(...)`, return `(name, inner)`.
///
/// `f(a), g(b)` is not a single compound: its first `(` closes before the end.
pub fn outer_compound(text: &str) -> Option<(&str, &str)> {
    let text = text.trim();
    let open = text.find('(')?;
    let name = &text[..open];
    if !atom_regex().is_match(name) || !text.ends_with(')') {
        return None;
    }
    let masked = mask(text);
    let mut depth = 0usize;
    for (pos, c) in masked.char_indices().skip_while(|&(p, _)| p < open) {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return (pos == text.len() - 1).then(|| (name, &text[open + 1..pos]));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("X"), Lexeme::Variable);
        assert_eq!(classify("_"), Lexeme::Variable);
        assert_eq!(classify("_Tail"), Lexeme::Variable);
        assert_eq!(classify("Man2"), Lexeme::Variable);
        assert_eq!(classify("bianca"), Lexeme::Atom);
        assert_eq!(classify("new_york"), Lexeme::Atom);
        assert_eq!(classify("New York"), Lexeme::Quoted);
        assert_eq!(classify("o'hara"), Lexeme::Quoted);
        assert_eq!(classify(""), Lexeme::Quoted);
        assert_eq!(classify("42"), Lexeme::Quoted);
    }

    #[test]
    fn test_format_text_quotes_when_needed() {
        assert_eq!(format_text("bianca"), "bianca");
        assert_eq!(format_text("Y"), "Y");
        assert_eq!(format_text("Rio de Janeiro"), "'Rio de Janeiro'");
        assert_eq!(format_text("o'hara"), r"'o\'hara'");
        assert_eq!(format_text(r"a\b"), r"'a\\b'");
        assert_eq!(format_atom("Paris"), "'Paris'");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("man"), "Man");
        assert_eq!(capitalize("X"), "X");
        assert_eq!(capitalize("start_city"), "Start_city");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_predicate_names() {
        assert!(is_predicate_name("partner"));
        assert!(is_predicate_name("travel_plan2"));
        assert!(is_predicate_name("_helper"));
        assert!(!is_predicate_name("Partner"));
        assert!(!is_predicate_name("partner(X)"));
        assert!(!is_predicate_name(""));
    }

    #[test]
    fn test_free_variables_in_order() {
        assert_eq!(free_variables("partner(X, Y)"), vec!["X", "Y"]);
        assert_eq!(free_variables("parent(A, B, _)"), vec!["A", "B"]);
        assert_eq!(free_variables("p(X, _Skip, X)"), vec!["X"]);
        assert!(free_variables("partner(john, bianca)").is_empty());
    }

    #[test]
    fn test_free_variables_ignore_quotes_and_comments() {
        assert!(free_variables("city('Paris', \"London\")").is_empty());
        assert!(free_variables("city('It''s Here') % Comment X\n").is_empty());
        assert_eq!(free_variables("/* X */ p(Y)"), vec!["Y"]);
        assert_eq!(free_variables("X = 0'A"), vec!["X"]);
        assert!(free_variables("X1 = 1.0E10").contains(&"X1".to_string()));
        assert_eq!(free_variables("X1 = 1.0E10").len(), 1);
    }

    #[test]
    fn test_check_brackets() {
        assert!(check_brackets("partner(X, [a, b])").is_ok());
        assert!(check_brackets("p(')')").is_ok());
        assert!(check_brackets("partner(X, Y").is_err());
        assert!(check_brackets("partner(X, Y))").is_err());
        assert!(check_brackets("p([a)]").is_err());
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(split_top_level("john, Y"), vec!["john", "Y"]);
        assert_eq!(split_top_level("f(a, b), [1, 2], 'x, y'"), vec!["f(a, b)", "[1, 2]", "'x, y'"]);
        assert_eq!(split_top_level(""), vec![""]);
    }

    #[test]
    fn test_outer_compound() {
        assert_eq!(outer_compound("partner(john, Y)"), Some(("partner", "john, Y")));
        assert_eq!(outer_compound(" hello() "), Some(("hello", "")));
        assert_eq!(outer_compound("f(a), g(b)"), None);
        assert_eq!(outer_compound("john, Y"), None);
        assert_eq!(outer_compound("X = f(a)"), None);
        assert_eq!(outer_compound("p(')')"), Some(("p", "')'")));
    }

    #[test]
    fn test_simple_terms() {
        assert!(is_simple_term("john"));
        assert!(is_simple_term(" Y "));
        assert!(is_simple_term("-3.5"));
        assert!(is_simple_term("'John Smith'"));
        assert!(!is_simple_term("X = 1"));
        assert!(!is_simple_term("f(a)"));
    }
}
