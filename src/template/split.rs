//! Splitting a tag body into tokens.

/// How a token is interpreted, by its first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `.a.b` data path
    Path,
    /// `$name` variable
    Variable,
    /// `"..."` string literal
    Quoted,
    /// Tag or filter name, keyword, number
    Word,
}

pub fn classify(token: &str) -> TokenKind {
    match token.as_bytes().first() {
        Some(b'.') => TokenKind::Path,
        Some(b'$') => TokenKind::Variable,
        Some(b'"') => TokenKind::Quoted,
        _ => TokenKind::Word,
    }
}

/// The pipe token separating filters.
pub const PIPE: &str = "|";

/// Split on whitespace, keeping `"..."` substrings (quotes included)
/// within a single token. A `|` outside of quotes is always a token
/// of its own.
pub fn split_tag_body(body: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut in_quote = false;
    for (i, c) in body.char_indices() {
        if in_quote {
            if c == '"' {
                in_quote = false;
            }
            continue;
        }
        match c {
            '"' => {
                if start.is_none() {
                    start = Some(i);
                }
                in_quote = true;
            }
            '|' => {
                if let Some(s) = start.take() {
                    tokens.push(&body[s..i]);
                }
                tokens.push(&body[i..i + 1]);
            }
            c if c.is_whitespace() => {
                if let Some(s) = start.take() {
                    tokens.push(&body[s..i]);
                }
            }
            _ =>
                if start.is_none() {
                    start = Some(i);
                }
        }
    }
    if let Some(s) = start {
        tokens.push(&body[s..]);
    }
    tokens
}

/// Split a token list at `|` tokens. The first group is the value
/// expression, the others are filter invocations.
pub fn pipeline_groups<'a, 's>(tokens: &'a [&'s str]) -> Vec<&'a [&'s str]> {
    tokens.split(|t| *t == PIPE).collect()
}
