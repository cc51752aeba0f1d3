//! Tokeniser for the statement language.
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Ident(String),
    /// Operators and punctuation: `+ - * / ^ % ! ( ) , : = == != < <= > >=`.
    Symbol(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offsets into the statement text.
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn is_symbol(&self, symbol: &str) -> bool {
        matches!(self.kind, TokenKind::Symbol(s) if s == symbol)
    }

    pub fn is_ident(&self, ident: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(s) if s == ident)
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Number(n) => n.to_string(),
            TokenKind::Ident(s) => s.clone(),
            TokenKind::Symbol(s) => s.to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

const SYMBOLS: [&str; 18] = [
    "==", "!=", "<=", ">=", "+", "-", "*", "/", "^", "%", "!", "(", ")", ",", ":", "=", "<", ">",
];

/// Splits `text` into tokens, ending with [`TokenKind::Eof`]. `//` starts a
/// comment running to the end of the text.
pub fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        if text[pos..].starts_with("//") {
            break;
        }
        let start = pos;

        if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            pos = scan_number(bytes, pos);
            let literal: String = text[start..pos].chars().filter(|c| *c != '_').collect();
            let value = literal
                .parse::<f64>()
                .map_err(|_| ParseError::new(["number"], start))?;
            tokens.push(Token { kind: TokenKind::Number(value), start, end: pos });
            continue;
        }

        let ch = text[pos..].chars().next().unwrap_or_default();
        if ch.is_alphabetic() || ch == '_' {
            let len: usize = text[pos..]
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .map(char::len_utf8)
                .sum();
            pos += len;
            tokens.push(Token { kind: TokenKind::Ident(text[start..pos].to_string()), start, end: pos });
            continue;
        }

        match SYMBOLS.iter().find(|s| text[pos..].starts_with(**s)) {
            Some(symbol) => {
                pos += symbol.len();
                tokens.push(Token { kind: TokenKind::Symbol(symbol), start, end: pos });
            }
            None => return Err(ParseError::new(["number", "identifier", "operator"], start)),
        }
    }

    tokens.push(Token { kind: TokenKind::Eof, start: text.len(), end: text.len() });
    Ok(tokens)
}

fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'_') {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    // Exponent only when digits follow, so `2 e` stays a number and an identifier.
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut ahead = pos + 1;
        if ahead < bytes.len() && (bytes[ahead] == b'+' || bytes[ahead] == b'-') {
            ahead += 1;
        }
        if ahead < bytes.len() && bytes[ahead].is_ascii_digit() {
            pos = ahead;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    pos
}
