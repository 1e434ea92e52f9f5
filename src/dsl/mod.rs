//! Filter expression language over geotagged entities.
//!
//! Syntax:
//!   "key"                          - entity has a tag with this key
//!   key("k") / value("v")          - literal key / value test
//!   keyMatches("re")               - regex key test (full match)
//!   valueMatches("re")             - regex value test (full match)
//!   tag("k", "v")                  - key and value on the same tag
//!   id(42, way)                    - match a specific (kind, id)
//!   bbox(minLon, minLat, maxLon, maxLat)
//!                                  - stateful bounding-box containment
//!   distance(pointAt(lon, lat)) < 1000
//!                                  - haversine distance comparison;
//!                                    operators: == < <= > >=
//!   expr & expr                    - AND
//!   expr | expr                    - OR (lower precedence than &)
//!   !expr                          - NOT
//!   (expr)                         - grouping
//!
//! Compilation is all-or-nothing: any syntax problem or malformed regex
//! is reported as a [`CompileError`] with the byte offset of the
//! offending token.

mod ast;
mod eval;
mod lexer;
mod parser;

pub use ast::{CompareOp, FilterAst, NumExpr, Pattern};
pub use eval::{evaluate, evaluate_numeric, matches};
pub use parser::compile;

/// Expression rejected by the compiler. `offset` is the byte position
/// of the offending token in the source text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct CompileError {
    pub message: String,
    pub offset: usize,
}
