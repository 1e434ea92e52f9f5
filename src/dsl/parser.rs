//! Parser for the filter expression language.
//!
//! Grammar (in rough EBNF):
//!
//! expr       = or_expr
//! or_expr    = and_expr ("|" and_expr)*
//! and_expr   = unary_expr ("&" unary_expr)*
//! unary_expr = "!" unary_expr | atom
//! atom       = "(" expr ")" | STRING | comparison | call
//! call       = IDENT "(" args ")"
//! comparison = numeric ("==" | "<" | "<=" | ">" | ">=") numeric
//! numeric    = NUMBER | "distance" "(" point ")"
//! point      = "pointAt" "(" NUMBER "," NUMBER ")"
//!
//! A bare STRING atom is shorthand for `key(STRING)`. Regex patterns
//! given to `keyMatches`/`valueMatches` are compiled here, so malformed
//! patterns fail at compile time rather than at first evaluation.

use super::CompileError;
use super::ast::{CompareOp, FilterAst, NumExpr, Pattern};
use super::lexer::{SpannedToken, Token, tokenize};
use crate::model::EntityKind;
use geo_types::Coord;

/// Parser state.
struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    /// Byte offset of the current token.
    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos.min(self.tokens.len() - 1))
            .map(|t| t.offset)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> Token {
        let tok = self
            .tokens
            .get(self.pos)
            .map(|t| t.token.clone())
            .unwrap_or(Token::Eof);
        self.pos += 1;
        tok
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError {
            message: message.into(),
            offset: self.offset(),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), CompileError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {}, found {}",
                expected.describe(),
                self.peek().describe()
            )))
        }
    }

    /// Parse OR expression: and_expr ("|" and_expr)*
    fn parse_expr(&mut self) -> Result<FilterAst, CompileError> {
        let mut left = self.parse_and_expr()?;
        while matches!(self.peek(), Token::Or) {
            self.advance();
            let right = self.parse_and_expr()?;
            left = FilterAst::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Parse AND expression: unary_expr ("&" unary_expr)*
    fn parse_and_expr(&mut self) -> Result<FilterAst, CompileError> {
        let mut left = self.parse_unary_expr()?;
        while matches!(self.peek(), Token::And) {
            self.advance();
            let right = self.parse_unary_expr()?;
            left = FilterAst::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Parse unary expression: "!" unary_expr | atom
    fn parse_unary_expr(&mut self) -> Result<FilterAst, CompileError> {
        if matches!(self.peek(), Token::Not) {
            self.advance();
            let inner = self.parse_unary_expr()?;
            Ok(FilterAst::Not(Box::new(inner)))
        } else {
            self.parse_atom()
        }
    }

    fn parse_atom(&mut self) -> Result<FilterAst, CompileError> {
        match self.peek().clone() {
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Str(key) => {
                self.advance();
                Ok(FilterAst::KeyEquals(key))
            }
            // A numeric literal can only start a comparison.
            Token::Number(_) => self.parse_comparison(),
            Token::Ident(name) if name == "distance" => self.parse_comparison(),
            Token::Ident(name) => self.parse_call(&name),
            other => Err(self.error(format!("expected a test, found {}", other.describe()))),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<FilterAst, CompileError> {
        match name {
            "key" => {
                self.advance();
                self.expect(Token::LParen)?;
                let key = self.parse_string()?;
                self.expect(Token::RParen)?;
                Ok(FilterAst::KeyEquals(key))
            }
            "value" => {
                self.advance();
                self.expect(Token::LParen)?;
                let value = self.parse_string()?;
                self.expect(Token::RParen)?;
                Ok(FilterAst::ValueEquals(value))
            }
            "keyMatches" => {
                self.advance();
                self.expect(Token::LParen)?;
                let pattern = self.parse_regex()?;
                self.expect(Token::RParen)?;
                Ok(FilterAst::KeyMatches(pattern))
            }
            "valueMatches" => {
                self.advance();
                self.expect(Token::LParen)?;
                let pattern = self.parse_regex()?;
                self.expect(Token::RParen)?;
                Ok(FilterAst::ValueMatches(pattern))
            }
            "tag" => {
                self.advance();
                self.expect(Token::LParen)?;
                let key = self.parse_string()?;
                self.expect(Token::Comma)?;
                let value = self.parse_string()?;
                self.expect(Token::RParen)?;
                Ok(FilterAst::TagEquals { key, value })
            }
            "id" => {
                self.advance();
                self.expect(Token::LParen)?;
                let id = self.parse_integer()?;
                self.expect(Token::Comma)?;
                let kind = self.parse_kind()?;
                self.expect(Token::RParen)?;
                Ok(FilterAst::IdEquals { id, kind })
            }
            "bbox" => {
                self.advance();
                self.expect(Token::LParen)?;
                let min_lon = self.parse_number()?;
                self.expect(Token::Comma)?;
                let min_lat = self.parse_number()?;
                self.expect(Token::Comma)?;
                let max_lon = self.parse_number()?;
                self.expect(Token::Comma)?;
                let max_lat = self.parse_number()?;
                self.expect(Token::RParen)?;
                Ok(FilterAst::BoundingBox {
                    min_lon,
                    min_lat,
                    max_lon,
                    max_lat,
                })
            }
            other => Err(self.error(format!("unknown test `{other}`"))),
        }
    }

    /// Parse comparison: numeric op numeric
    fn parse_comparison(&mut self) -> Result<FilterAst, CompileError> {
        let left = self.parse_numeric()?;
        let op = match self.peek() {
            Token::EqEq => CompareOp::Eq,
            Token::Lt => CompareOp::Lt,
            Token::Le => CompareOp::Le,
            Token::Gt => CompareOp::Gt,
            Token::Ge => CompareOp::Ge,
            other => {
                return Err(self.error(format!(
                    "expected comparison operator, found {}",
                    other.describe()
                )));
            }
        };
        self.advance();
        let right = self.parse_numeric()?;
        Ok(FilterAst::Compare { op, left, right })
    }

    /// Parse numeric: NUMBER | distance(pointAt(lon, lat))
    fn parse_numeric(&mut self) -> Result<NumExpr, CompileError> {
        match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(NumExpr::Constant(n))
            }
            Token::Ident(name) if name == "distance" => {
                self.advance();
                self.expect(Token::LParen)?;
                let origin = self.parse_point()?;
                self.expect(Token::RParen)?;
                Ok(NumExpr::Distance(origin))
            }
            other => Err(self.error(format!(
                "expected number or `distance(...)`, found {}",
                other.describe()
            ))),
        }
    }

    /// Parse point literal: pointAt(lon, lat)
    fn parse_point(&mut self) -> Result<Coord<f64>, CompileError> {
        match self.advance() {
            Token::Ident(name) if name == "pointAt" => {}
            other => {
                self.pos -= 1;
                return Err(self.error(format!(
                    "expected `pointAt`, found {}",
                    other.describe()
                )));
            }
        }
        self.expect(Token::LParen)?;
        let lon = self.parse_number()?;
        self.expect(Token::Comma)?;
        let lat = self.parse_number()?;
        self.expect(Token::RParen)?;
        Ok(Coord { x: lon, y: lat })
    }

    fn parse_string(&mut self) -> Result<String, CompileError> {
        match self.peek().clone() {
            Token::Str(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(self.error(format!(
                "expected string literal, found {}",
                other.describe()
            ))),
        }
    }

    fn parse_regex(&mut self) -> Result<Pattern, CompileError> {
        let offset = self.offset();
        let pattern = self.parse_string()?;
        Pattern::new(&pattern).map_err(|err| CompileError {
            message: format!("invalid regex pattern: {err}"),
            offset,
        })
    }

    fn parse_number(&mut self) -> Result<f64, CompileError> {
        match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(n)
            }
            other => Err(self.error(format!("expected number, found {}", other.describe()))),
        }
    }

    fn parse_integer(&mut self) -> Result<i64, CompileError> {
        let offset = self.offset();
        let n = self.parse_number()?;
        if n.fract() != 0.0 || n < i64::MIN as f64 || n > i64::MAX as f64 {
            return Err(CompileError {
                message: format!("expected integer id, found {n}"),
                offset,
            });
        }
        Ok(n as i64)
    }

    fn parse_kind(&mut self) -> Result<EntityKind, CompileError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                let kind = match name.as_str() {
                    "node" => EntityKind::Node,
                    "way" => EntityKind::Way,
                    "relation" => EntityKind::Relation,
                    other => {
                        return Err(self.error(format!(
                            "expected entity kind (node, way, relation), found `{other}`"
                        )));
                    }
                };
                self.advance();
                Ok(kind)
            }
            other => Err(self.error(format!(
                "expected entity kind (node, way, relation), found {}",
                other.describe()
            ))),
        }
    }
}

/// Compile a filter expression into an AST. All-or-nothing: any syntax
/// problem or malformed regex is reported with its byte offset.
pub fn compile(input: &str) -> Result<FilterAst, CompileError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens);
    let ast = parser.parse_expr()?;
    if !matches!(parser.peek(), Token::Eof) {
        return Err(parser.error(format!(
            "unexpected {} after expression",
            parser.peek().describe()
        )));
    }
    Ok(ast)
}
