//! Evaluator for the filter expression AST.
//!
//! Tag tests are existential: one matching tag anywhere in the list is
//! enough. Numeric comparisons are permissive: when either side is not
//! applicable to the entity kind (a distance asked of a way or
//! relation, or of a node with no resolved location), the comparison
//! evaluates to true, so a missing operand never excludes an entity.
//!
//! Bounding-box evaluation is stateful and order-dependent: a way is
//! inside the box iff one of its nodes was classified inside earlier in
//! the same scan, and likewise for relation members. The entity stream
//! must therefore deliver nodes before ways before relations within a
//! scan; the evaluator does not enforce this.

use super::ast::{CompareOp, FilterAst, NumExpr};
use crate::model::{Entity, EntityKind, Tag};
use crate::spatial::SpatialState;
use geo::{Distance, Haversine};
use geo_types::Point;

/// Evaluate a filter AST against one entity. The only side effect is
/// spatial-state mutation from bounding-box nodes.
pub fn evaluate(ast: &FilterAst, entity: &Entity, spatial: &mut SpatialState) -> bool {
    match ast {
        FilterAst::KeyEquals(key) => any_tag(entity, |t| t.key == *key),
        FilterAst::ValueEquals(value) => any_tag(entity, |t| t.value == *value),
        FilterAst::KeyMatches(pattern) => any_tag(entity, |t| pattern.is_match(&t.key)),
        FilterAst::ValueMatches(pattern) => any_tag(entity, |t| pattern.is_match(&t.value)),
        FilterAst::TagEquals { key, value } => {
            any_tag(entity, |t| t.key == *key && t.value == *value)
        }
        FilterAst::IdEquals { id, kind } => entity.id() == *id && entity.kind() == *kind,
        FilterAst::BoundingBox {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        } => within_box(entity, *min_lon, *min_lat, *max_lon, *max_lat, spatial),
        FilterAst::Compare { op, left, right } => {
            match (evaluate_numeric(left, entity), evaluate_numeric(right, entity)) {
                (Some(l), Some(r)) => compare(*op, l, r),
                // Inapplicable operand: permissive true.
                _ => true,
            }
        }
        FilterAst::And(a, b) => evaluate(a, entity, spatial) && evaluate(b, entity, spatial),
        FilterAst::Or(a, b) => evaluate(a, entity, spatial) || evaluate(b, entity, spatial),
        FilterAst::Not(inner) => !evaluate(inner, entity, spatial),
    }
}

/// Evaluate a numeric sub-expression. `None` means "not applicable to
/// this entity kind", not a failure.
pub fn evaluate_numeric(expr: &NumExpr, entity: &Entity) -> Option<f64> {
    match expr {
        NumExpr::Constant(v) => Some(*v),
        NumExpr::Distance(origin) => match entity {
            Entity::Node(node) => node
                .location()
                .map(|loc| Haversine.distance(Point::from(loc), Point::from(*origin))),
            _ => None,
        },
    }
}

/// Filter-or-pass-through: an absent filter matches every entity.
pub fn matches(filter: Option<&FilterAst>, entity: &Entity, spatial: &mut SpatialState) -> bool {
    match filter {
        Some(ast) => evaluate(ast, entity, spatial),
        None => true,
    }
}

fn any_tag<F>(entity: &Entity, pred: F) -> bool
where
    F: Fn(&Tag) -> bool,
{
    entity.tags().iter().any(pred)
}

fn compare(op: CompareOp, left: f64, right: f64) -> bool {
    match op {
        CompareOp::Eq => left == right,
        CompareOp::Lt => left < right,
        CompareOp::Le => left <= right,
        CompareOp::Gt => left > right,
        CompareOp::Ge => left >= right,
    }
}

fn within_box(
    entity: &Entity,
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
    spatial: &mut SpatialState,
) -> bool {
    match entity {
        Entity::Node(node) => {
            // Bounds are inclusive on all four sides.
            let within = node.location().is_some_and(|loc| {
                loc.x >= min_lon && loc.x <= max_lon && loc.y >= min_lat && loc.y <= max_lat
            });
            if within {
                spatial.insert(EntityKind::Node, node.id);
            }
            within
        }
        Entity::Way(way) => {
            let within = way
                .refs
                .iter()
                .any(|id| spatial.contains(EntityKind::Node, *id));
            if within {
                spatial.insert(EntityKind::Way, way.id);
            }
            within
        }
        Entity::Relation(rel) => {
            let within = rel
                .members
                .iter()
                .any(|m| spatial.contains(m.kind, m.id));
            if within {
                spatial.insert(EntityKind::Relation, rel.id);
            }
            within
        }
    }
}
