//! Lexer/tokenizer for the filter expression language.

use super::CompileError;
use winnow::combinator::alt;
use winnow::prelude::*;
use winnow::token::{any, take_while};

/// Token types for the expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Quoted string literal (key, value or regex pattern).
    Str(String),
    /// Numeric literal (coordinates, distances, ids).
    Number(f64),
    /// Test/function name or entity kind.
    Ident(String),

    // Comparison operators
    EqEq, // ==
    Lt,   // <
    Le,   // <=
    Gt,   // >
    Ge,   // >=

    // Boolean operators
    And, // &
    Or,  // |
    Not, // !

    // Punctuation
    LParen, // (
    RParen, // )
    Comma,  // ,

    // End of input
    Eof,
}

impl Token {
    /// Short description used in parse error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Str(s) => format!("string \"{s}\""),
            Token::Number(n) => format!("number {n}"),
            Token::Ident(name) => format!("`{name}`"),
            Token::EqEq => "`==`".into(),
            Token::Lt => "`<`".into(),
            Token::Le => "`<=`".into(),
            Token::Gt => "`>`".into(),
            Token::Ge => "`>=`".into(),
            Token::And => "`&`".into(),
            Token::Or => "`|`".into(),
            Token::Not => "`!`".into(),
            Token::LParen => "`(`".into(),
            Token::RParen => "`)`".into(),
            Token::Comma => "`,`".into(),
            Token::Eof => "end of expression".into(),
        }
    }
}

/// A token together with its byte offset in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub offset: usize,
}

// Manually define PResult for resilience against winnow version changes
type PResult<T> = Result<T, winnow::error::ErrMode<winnow::error::ContextError>>;

/// Lex a double-quoted string literal with `\"` and `\\` escapes.
fn lex_string(input: &mut &str) -> PResult<Token> {
    '"'.parse_next(input)?;
    let mut out = String::new();
    loop {
        match any.parse_next(input)? {
            '"' => return Ok(Token::Str(out)),
            '\\' => match any.parse_next(input)? {
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            },
            other => out.push(other),
        }
    }
}

/// Lex a number (integer or float, optional leading minus).
fn lex_number(input: &mut &str) -> PResult<Token> {
    let neg = winnow::combinator::opt('-').parse_next(input)?;
    let num_str = take_while(1.., |c: char| c.is_ascii_digit() || c == '.').parse_next(input)?;
    let full = if neg.is_some() {
        format!("-{num_str}")
    } else {
        num_str.to_string()
    };
    let n: f64 = full
        .parse()
        .map_err(|_| winnow::error::ErrMode::Backtrack(winnow::error::ContextError::default()))?;
    Ok(Token::Number(n))
}

/// Lex an identifier: test/function names and entity kinds.
fn lex_ident(input: &mut &str) -> PResult<Token> {
    let s = take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_')
        .verify(|s: &str| s.starts_with(|c: char| c.is_ascii_alphabetic()))
        .parse_next(input)?;
    Ok(Token::Ident(s.to_string()))
}

/// Lex a single token. Leading whitespace must already be consumed.
fn lex_token(input: &mut &str) -> PResult<Token> {
    alt((
        // Multi-char operators first
        "==".value(Token::EqEq),
        "<=".value(Token::Le),
        ">=".value(Token::Ge),
        // Single-char operators
        "<".value(Token::Lt),
        ">".value(Token::Gt),
        "&".value(Token::And),
        "|".value(Token::Or),
        "!".value(Token::Not),
        "(".value(Token::LParen),
        ")".value(Token::RParen),
        ",".value(Token::Comma),
        lex_string,
        lex_number,
        lex_ident,
    ))
    .parse_next(input)
}

/// Tokenize the entire input, recording byte offsets.
pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>, CompileError> {
    let mut remaining = input;
    let mut tokens = Vec::new();

    loop {
        remaining = remaining.trim_start();
        let offset = input.len() - remaining.len();
        if remaining.is_empty() {
            tokens.push(SpannedToken {
                token: Token::Eof,
                offset,
            });
            return Ok(tokens);
        }
        match lex_token(&mut remaining) {
            Ok(token) => tokens.push(SpannedToken { token, offset }),
            Err(_) => {
                let message = if remaining.starts_with('"') {
                    "unterminated string literal".to_string()
                } else {
                    let c = remaining.chars().next().unwrap_or_default();
                    format!("unexpected character `{c}`")
                };
                return Err(CompileError { message, offset });
            }
        }
    }
}
