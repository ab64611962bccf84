//! Quote- and parenthesis-aware scanning shared by the clause parsers.
//!
//! Every search here only matches at parenthesis depth zero and outside
//! quoted text, so sub-selects, function arguments and string literals never
//! split the clause that contains them.

use crate::error::{QueryError, QueryResult};
use crate::value::{parse_number, Value};

/// Quoting and nesting state while walking query text.
#[derive(Debug, Default, Clone, Copy)]
struct Scanner {
    depth: usize,
    /// Closing character of the quoted section being read.
    closing_quote: Option<char>,
    escaped: bool,
    unbalanced: bool,
}

impl Scanner {
    fn is_top_level(&self) -> bool {
        self.depth == 0 && self.closing_quote.is_none()
    }

    fn step(&mut self, c: char) {
        if let Some(closing) = self.closing_quote {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' && closing != ']' {
                self.escaped = true;
            } else if c == closing {
                self.closing_quote = None;
            }
            return;
        }
        match c {
            '(' => self.depth += 1,
            ')' if self.depth == 0 => self.unbalanced = true,
            ')' => self.depth -= 1,
            '\'' | '"' | '`' => self.closing_quote = Some(c),
            '[' => self.closing_quote = Some(']'),
            _ => {}
        }
    }
}

/// Collapse whitespace runs outside quoted text and trim.
///
/// Fails when quotes or parentheses do not balance.
pub(super) fn normalize_whitespace(sql: &str) -> QueryResult<String> {
    let mut normalized = String::with_capacity(sql.len());
    let mut scanner = Scanner::default();
    let mut pending_space = false;

    for c in sql.chars() {
        if scanner.closing_quote.is_none() && c.is_whitespace() {
            pending_space = !normalized.is_empty();
            continue;
        }
        if pending_space {
            normalized.push(' ');
            pending_space = false;
        }
        scanner.step(c);
        normalized.push(c);
    }

    if scanner.closing_quote.is_some() {
        return Err(QueryError::ParseError(format!(
            "Unterminated quoted text in query: {}",
            sql.trim()
        )));
    }
    if scanner.unbalanced || scanner.depth != 0 {
        return Err(QueryError::ParseError(format!(
            "Unbalanced parentheses in query: {}",
            sql.trim()
        )));
    }
    Ok(normalized)
}

fn matches_at(text: &str, index: usize, pattern: &str) -> bool {
    text.get(index..index + pattern.len())
        .is_some_and(|candidate| candidate.eq_ignore_ascii_case(pattern))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

/// First top-level position at or after `from` where `matcher` reports a
/// match end.
fn find_top_level(text: &str, from: usize, mut matcher: impl FnMut(usize) -> Option<usize>) -> Option<(usize, usize)> {
    let mut scanner = Scanner::default();
    for (index, c) in text.char_indices() {
        if index >= from && scanner.is_top_level() {
            if let Some(end) = matcher(index) {
                return Some((index, end));
            }
        }
        scanner.step(c);
    }
    None
}

/// Locate a keyword (case-insensitive, whole words) at top level.
pub(super) fn find_keyword(text: &str, keyword: &str, from: usize) -> Option<(usize, usize)> {
    find_top_level(text, from, |index| {
        let end = index + keyword.len();
        let before = text[..index].chars().next_back();
        let after = text.get(end..).and_then(|rest| rest.chars().next());
        (matches_at(text, index, keyword)
            && !before.is_some_and(is_word_char)
            && !after.is_some_and(is_word_char))
        .then_some(end)
    })
}

/// Every top-level occurrence of `keyword`.
pub(super) fn find_keywords(text: &str, keyword: &str) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some((start, end)) = find_keyword(text, keyword, from) {
        found.push((start, end));
        from = end;
    }
    found
}

/// Locate a literal pattern (case-insensitive) at top level.
pub(super) fn find_pattern(text: &str, pattern: &str) -> Option<(usize, usize)> {
    find_top_level(text, 0, |index| {
        matches_at(text, index, pattern).then_some(index + pattern.len())
    })
}

/// First top-level position where one of `patterns` matches; the first
/// listed pattern wins at a given position.
pub(super) fn find_first_of<'p>(text: &str, patterns: &[&'p str]) -> Option<(&'p str, usize, usize)> {
    let mut hit = None;
    find_top_level(text, 0, |index| {
        let pattern = patterns.iter().find(|p| matches_at(text, index, p))?;
        hit = Some(*pattern);
        Some(index + pattern.len())
    })
    .and_then(|(start, end)| hit.map(|pattern| (pattern, start, end)))
}

/// Split on a top-level delimiter, trimming and dropping empty segments.
pub(super) fn split_top_level<'t>(text: &'t str, delimiter: &str) -> Vec<&'t str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut scanner = Scanner::default();
    for (index, c) in text.char_indices() {
        if index >= start && scanner.is_top_level() && matches_at(text, index, delimiter) {
            parts.push(text[start..index].trim());
            start = index + delimiter.len();
        }
        scanner.step(c);
    }
    parts.push(text[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

/// Index of the parenthesis closing the one at `open`.
pub(super) fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut scanner = Scanner::default();
    for (offset, c) in text.get(open..)?.char_indices() {
        scanner.step(c);
        if c == ')' && scanner.is_top_level() {
            return Some(open + offset);
        }
    }
    None
}

/// Contents of one parenthesis pair spanning all of `text`.
pub(super) fn unwrap_parentheses(text: &str) -> Option<&str> {
    let text = text.trim();
    if !text.starts_with('(') {
        return None;
    }
    (matching_paren(text, 0)? == text.len() - 1).then(|| text[1..text.len() - 1].trim())
}

/// Text following a leading keyword, e.g. `DISTINCT a, b` → `a, b`.
pub(super) fn strip_keyword_prefix<'t>(text: &'t str, keyword: &str) -> Option<&'t str> {
    let rest = text.get(keyword.len()..)?;
    (matches_at(text, 0, keyword) && rest.starts_with(' ')).then(|| rest.trim())
}

/// Split a trailing `AS alias` off an item.
pub(super) fn split_alias(text: &str) -> (&str, Option<String>) {
    match find_keywords(text, "AS").last() {
        Some(&(start, end)) if start > 0 => {
            let alias = text[end..].trim();
            if alias.is_empty() || (alias.contains(' ') && !is_quoted_identifier(alias)) {
                (text, None)
            } else {
                (text[..start].trim(), Some(unquote_identifier(alias).to_string()))
            }
        }
        _ => (text, None),
    }
}

fn is_quoted_identifier(text: &str) -> bool {
    let delimited = |open: char, close: char| text.len() >= 2 && text.starts_with(open) && text.ends_with(close);
    delimited('"', '"') || delimited('`', '`') || delimited('[', ']')
}

/// Strip `"…"`, `` `…` `` or `[…]` around an identifier.
pub(super) fn unquote_identifier(text: &str) -> &str {
    let text = text.trim();
    if is_quoted_identifier(text) {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

/// Body of a single-quoted string literal with escapes resolved, or `None`
/// when `text` is not exactly one literal.
fn unquote_string(text: &str) -> Option<String> {
    let body = text.strip_prefix('\'')?;
    let mut unquoted = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => unquoted.push(chars.next()?),
            '\'' if chars.peek() == Some(&'\'') => {
                chars.next();
                unquoted.push('\'');
            }
            '\'' => return chars.next().is_none().then_some(unquoted),
            c => unquoted.push(c),
        }
    }
    None
}

/// Literal value: quoted string, number, boolean or NULL.
pub(super) fn parse_literal(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.starts_with('\'') {
        return unquote_string(text).map(Value::Text);
    }
    if text.eq_ignore_ascii_case("NULL") {
        return Some(Value::Null);
    }
    if text.eq_ignore_ascii_case("TRUE") {
        return Some(Value::Boolean(true));
    }
    if text.eq_ignore_ascii_case("FALSE") {
        return Some(Value::Boolean(false));
    }
    if text.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.') {
        return parse_number(text);
    }
    None
}
