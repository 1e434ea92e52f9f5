//! Pass-scoped membership memory for bounding-box evaluation.

use crate::model::EntityKind;
use std::collections::HashSet;

/// Records which ids have matched a bounding-box predicate earlier in
/// the current scan. Containment for ways and relations is derived from
/// the classification of their members within the same scan, so this
/// state must be cleared (or replaced) whenever a new scan over the
/// dataset starts; stale ids from a previous scan would corrupt the
/// containment results.
#[derive(Debug, Clone, Default)]
pub struct SpatialState {
    nodes: HashSet<i64>,
    ways: HashSet<i64>,
    relations: HashSet<i64>,
}

impl SpatialState {
    pub fn new() -> Self {
        SpatialState::default()
    }

    pub fn insert(&mut self, kind: EntityKind, id: i64) {
        self.set_mut(kind).insert(id);
    }

    pub fn contains(&self, kind: EntityKind, id: i64) -> bool {
        self.set(kind).contains(&id)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.ways.clear();
        self.relations.clear();
    }

    fn set(&self, kind: EntityKind) -> &HashSet<i64> {
        match kind {
            EntityKind::Node => &self.nodes,
            EntityKind::Way => &self.ways,
            EntityKind::Relation => &self.relations,
        }
    }

    fn set_mut(&mut self, kind: EntityKind) -> &mut HashSet<i64> {
        match kind {
            EntityKind::Node => &mut self.nodes,
            EntityKind::Way => &mut self.ways,
            EntityKind::Relation => &mut self.relations,
        }
    }
}
