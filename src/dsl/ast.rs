//! AST types for the filter expression language.

use crate::model::EntityKind;
use geo_types::Coord;
use regex::Regex;
use std::fmt;

/// A regex tag test, compiled eagerly so malformed patterns surface at
/// compile time. Matching covers the whole key/value, not a substring.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(raw: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{raw})$"))?;
        Ok(Pattern {
            raw: raw.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

/// Boolean filter expression. Immutable once built; evaluation only
/// mutates the externally supplied spatial state.
#[derive(Debug, Clone)]
pub enum FilterAst {
    /// Any tag with exactly this key.
    KeyEquals(String),

    /// Any tag with exactly this value.
    ValueEquals(String),

    /// Any tag whose key matches the pattern (full match).
    KeyMatches(Pattern),

    /// Any tag whose value matches the pattern (full match).
    ValueMatches(Pattern),

    /// A single tag carrying both this key and this value.
    TagEquals { key: String, value: String },

    /// The entity's own identity.
    IdEquals { id: i64, kind: EntityKind },

    /// Stateful containment test; see the eval module for the
    /// node-before-way-before-relation scan-order precondition.
    BoundingBox {
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    },

    /// Numeric comparison. Evaluates to true when either side is not
    /// applicable to the entity kind.
    Compare {
        op: CompareOp,
        left: NumExpr,
        right: NumExpr,
    },

    And(Box<FilterAst>, Box<FilterAst>),
    Or(Box<FilterAst>, Box<FilterAst>),
    Not(Box<FilterAst>),
}

/// Numeric sub-expression of a comparison.
#[derive(Debug, Clone)]
pub enum NumExpr {
    Constant(f64),
    /// Great-circle distance from the entity to a fixed point
    /// (lon/lat). Only applicable to nodes with a resolved location.
    Distance(Coord<f64>),
}

/// Numeric comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq, // ==
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Le => write!(f, "<="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Ge => write!(f, ">="),
        }
    }
}

impl FilterAst {
    /// True when the tree contains a bounding-box node. Containment for
    /// ways and relations depends on members already classified in the
    /// same scan, so such a filter needs resolution scans over the
    /// entire dataset rather than a kind-restricted stream.
    pub fn requires_all_entities(&self) -> bool {
        match self {
            FilterAst::BoundingBox { .. } => true,
            FilterAst::Not(inner) => inner.requires_all_entities(),
            FilterAst::And(a, b) | FilterAst::Or(a, b) => {
                a.requires_all_entities() || b.requires_all_entities()
            }
            _ => false,
        }
    }
}

impl PartialEq for FilterAst {
    fn eq(&self, other: &Self) -> bool {
        use FilterAst::*;
        match (self, other) {
            (KeyEquals(a), KeyEquals(b)) | (ValueEquals(a), ValueEquals(b)) => a == b,
            (KeyMatches(a), KeyMatches(b)) | (ValueMatches(a), ValueMatches(b)) => a == b,
            (
                TagEquals { key: k1, value: v1 },
                TagEquals { key: k2, value: v2 },
            ) => k1 == k2 && v1 == v2,
            (
                IdEquals { id: i1, kind: k1 },
                IdEquals { id: i2, kind: k2 },
            ) => i1 == i2 && k1 == k2,
            (
                BoundingBox {
                    min_lon: a1,
                    min_lat: b1,
                    max_lon: c1,
                    max_lat: d1,
                },
                BoundingBox {
                    min_lon: a2,
                    min_lat: b2,
                    max_lon: c2,
                    max_lat: d2,
                },
            ) => a1 == a2 && b1 == b2 && c1 == c2 && d1 == d2,
            (
                Compare {
                    op: o1,
                    left: l1,
                    right: r1,
                },
                Compare {
                    op: o2,
                    left: l2,
                    right: r2,
                },
            ) => o1 == o2 && l1 == l2 && r1 == r2,
            (And(a1, b1), And(a2, b2)) | (Or(a1, b1), Or(a2, b2)) => a1 == a2 && b1 == b2,
            (Not(a), Not(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for NumExpr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NumExpr::Constant(a), NumExpr::Constant(b)) => a == b,
            (NumExpr::Distance(a), NumExpr::Distance(b)) => a == b,
            _ => false,
        }
    }
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            other => write!(f, "{other}")?,
        }
    }
    write!(f, "\"")
}

/// Canonical text form. Fully parenthesized; re-compiling the rendered
/// text yields an equivalent tree.
impl fmt::Display for FilterAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterAst::KeyEquals(key) => {
                write!(f, "key(")?;
                write_string_literal(f, key)?;
                write!(f, ")")
            }
            FilterAst::ValueEquals(value) => {
                write!(f, "value(")?;
                write_string_literal(f, value)?;
                write!(f, ")")
            }
            FilterAst::KeyMatches(re) => {
                write!(f, "keyMatches(")?;
                write_string_literal(f, re.as_str())?;
                write!(f, ")")
            }
            FilterAst::ValueMatches(re) => {
                write!(f, "valueMatches(")?;
                write_string_literal(f, re.as_str())?;
                write!(f, ")")
            }
            FilterAst::TagEquals { key, value } => {
                write!(f, "tag(")?;
                write_string_literal(f, key)?;
                write!(f, ", ")?;
                write_string_literal(f, value)?;
                write!(f, ")")
            }
            FilterAst::IdEquals { id, kind } => write!(f, "id({id}, {kind})"),
            FilterAst::BoundingBox {
                min_lon,
                min_lat,
                max_lon,
                max_lat,
            } => write!(f, "bbox({min_lon}, {min_lat}, {max_lon}, {max_lat})"),
            FilterAst::Compare { op, left, right } => write!(f, "{left} {op} {right}"),
            FilterAst::And(a, b) => write!(f, "({a} & {b})"),
            FilterAst::Or(a, b) => write!(f, "({a} | {b})"),
            FilterAst::Not(inner) => write!(f, "!{inner}"),
        }
    }
}

impl fmt::Display for NumExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumExpr::Constant(v) => write!(f, "{v}"),
            NumExpr::Distance(origin) => {
                write!(f, "distance(pointAt({}, {}))", origin.x, origin.y)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_all_entities_propagates_through_combinators() {
        let bbox = FilterAst::BoundingBox {
            min_lon: 0.0,
            min_lat: 0.0,
            max_lon: 1.0,
            max_lat: 1.0,
        };
        let key = FilterAst::KeyEquals("highway".into());
        assert!(bbox.requires_all_entities());
        assert!(!key.requires_all_entities());
        assert!(
            FilterAst::And(Box::new(key.clone()), Box::new(bbox.clone())).requires_all_entities()
        );
        assert!(FilterAst::Not(Box::new(bbox)).requires_all_entities());
        assert!(
            !FilterAst::Or(Box::new(key.clone()), Box::new(key)).requires_all_entities()
        );
    }

    #[test]
    fn display_escapes_string_literals() {
        let ast = FilterAst::KeyEquals("a\"b\\c".into());
        assert_eq!(ast.to_string(), r#"key("a\"b\\c")"#);
    }

    #[test]
    fn patterns_compare_and_display_by_raw_text() {
        let a = FilterAst::KeyMatches(Pattern::new("high.*").unwrap());
        let b = FilterAst::KeyMatches(Pattern::new("high.*").unwrap());
        let c = FilterAst::KeyMatches(Pattern::new("low.*").unwrap());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), r#"keyMatches("high.*")"#);
    }

    #[test]
    fn patterns_match_whole_text_only() {
        let p = Pattern::new("prim.*").unwrap();
        assert!(p.is_match("primary"));
        assert!(!p.is_match("unprimary"));
    }
}
