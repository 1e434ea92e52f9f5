//! Reference-closure extraction.
//!
//! The dataset can only be scanned forward, so the set of entities
//! referenced (transitively) by the filtered subset is resolved with
//! repeated sequential scans: relations first, until no relation id
//! remains both pending and resolvable, then ways the same way. Each
//! emitted way contributes its node refs, each emitted relation its
//! members. The result is an [`EmitPlan`] that decides, during one
//! final nodes-then-ways-then-relations pass, which entities to write.
//!
//! Termination is a fixed point: a scan that neither emits a new id nor
//! adds a new pending id ends its phase. Ids still pending at that
//! point reference entities absent from the dataset; they are logged
//! and dropped rather than looped on forever.

use crate::dsl::{FilterAst, matches};
use crate::model::{Entity, EntityKind, KindMask};
use crate::source::EntitySource;
use crate::spatial::SpatialState;
use anyhow::Result;
use std::collections::HashSet;

/// Decision function for the final emission pass: an entity is written
/// when it is referenced by the resolved closure, or when its kind is
/// directly filterable and the filter matches it.
#[derive(Debug)]
pub struct EmitPlan {
    filter: Option<FilterAst>,
    mask: KindMask,
    node_refs: HashSet<i64>,
    way_refs: HashSet<i64>,
    rel_refs: HashSet<i64>,
}

impl EmitPlan {
    pub fn should_emit(&self, entity: &Entity, spatial: &mut SpatialState) -> bool {
        // The filter is still evaluated for referenced entities: a
        // bounding-box filter needs every node classified during the
        // final pass so later ways and relations test correctly.
        let matched = self.mask.contains(entity.kind())
            && matches(self.filter.as_ref(), entity, spatial);
        self.is_referenced(entity) || matched
    }

    pub fn is_referenced(&self, entity: &Entity) -> bool {
        match entity.kind() {
            EntityKind::Node => self.node_refs.contains(&entity.id()),
            EntityKind::Way => self.way_refs.contains(&entity.id()),
            EntityKind::Relation => self.rel_refs.contains(&entity.id()),
        }
    }

    /// Per-kind sizes of the resolved reference sets (nodes, ways,
    /// relations), for logging.
    pub fn referenced_counts(&self) -> (usize, usize, usize) {
        (
            self.node_refs.len(),
            self.way_refs.len(),
            self.rel_refs.len(),
        )
    }
}

struct Resolver {
    filter: Option<FilterAst>,
    mask: KindMask,
    requires_all: bool,
    emit_nodes: HashSet<i64>,
    emit_ways: HashSet<i64>,
    emit_rels: HashSet<i64>,
    ways_pending: HashSet<i64>,
    rels_pending: HashSet<i64>,
}

impl Resolver {
    fn new(filter: Option<FilterAst>, mask: KindMask) -> Self {
        let requires_all = filter
            .as_ref()
            .is_some_and(|f| f.requires_all_entities());
        Resolver {
            filter,
            mask,
            requires_all,
            emit_nodes: HashSet::new(),
            emit_ways: HashSet::new(),
            emit_rels: HashSet::new(),
            ways_pending: HashSet::new(),
            rels_pending: HashSet::new(),
        }
    }

    /// One full sequential scan. Returns whether anything changed:
    /// a new emit, a new pending id, or a pending id resolved.
    fn scan_once<S: EntitySource + ?Sized>(
        &mut self,
        source: &S,
        scan_mask: KindMask,
    ) -> Result<bool> {
        let mut changed = false;
        // Spatial membership is re-derived from scratch for each scan's
        // entity ordering; stale ids would corrupt containment.
        let mut spatial = SpatialState::new();

        for entity in source.scan(scan_mask)? {
            let entity = entity?;
            // Always evaluate the filter so bounding-box nodes classify
            // every entity of this scan, even kinds outside the mask.
            let matched = matches(self.filter.as_ref(), &entity, &mut spatial);
            match &entity {
                Entity::Node(_) => {}
                Entity::Way(way) => {
                    let pending = self.ways_pending.contains(&way.id);
                    if pending || (self.mask.way && matched) {
                        changed |= self.emit_ways.insert(way.id);
                        changed |= self.ways_pending.remove(&way.id);
                        for node_id in &way.refs {
                            changed |= self.emit_nodes.insert(*node_id);
                        }
                    }
                }
                Entity::Relation(rel) => {
                    let pending = self.rels_pending.contains(&rel.id);
                    if pending || (self.mask.relation && matched) {
                        changed |= self.emit_rels.insert(rel.id);
                        changed |= self.rels_pending.remove(&rel.id);
                        for member in &rel.members {
                            changed |= match member.kind {
                                EntityKind::Node => self.emit_nodes.insert(member.id),
                                // An id already emitted is never re-added
                                // to pending; this is what lets reference
                                // cycles terminate.
                                EntityKind::Way => {
                                    !self.emit_ways.contains(&member.id)
                                        && self.ways_pending.insert(member.id)
                                }
                                EntityKind::Relation => {
                                    !self.emit_rels.contains(&member.id)
                                        && self.rels_pending.insert(member.id)
                                }
                            };
                        }
                    }
                }
            }
        }

        Ok(changed)
    }

    fn scan_mask_for(&self, kind: EntityKind) -> KindMask {
        if self.requires_all {
            KindMask::all()
        } else {
            KindMask::only(kind)
        }
    }

    fn into_plan(self) -> EmitPlan {
        EmitPlan {
            filter: self.filter,
            mask: self.mask,
            node_refs: self.emit_nodes,
            way_refs: self.emit_ways,
            rel_refs: self.emit_rels,
        }
    }
}

/// Resolve the reference closure of the filtered subset with repeated
/// sequential scans of `source`. The returned plan, used with a fresh
/// [`SpatialState`], drives the final emission pass.
pub fn resolve_references<S: EntitySource + ?Sized>(
    filter: Option<FilterAst>,
    mask: KindMask,
    source: &S,
) -> Result<EmitPlan> {
    let mut resolver = Resolver::new(filter, mask);

    // Relations first: a relation may reference another relation not
    // yet seen, so re-scan until the pending set stabilizes.
    if mask.relation {
        let scan_mask = resolver.scan_mask_for(EntityKind::Relation);
        let mut pass = 0u32;
        loop {
            pass += 1;
            let changed = resolver.scan_once(source, scan_mask)?;
            tracing::debug!(
                "Relation pass {}: {} emitted, {} pending",
                pass,
                resolver.emit_rels.len(),
                resolver.rels_pending.len()
            );
            if resolver.rels_pending.is_empty() || !changed {
                break;
            }
        }
        if !resolver.rels_pending.is_empty() {
            tracing::warn!(
                "{} referenced relation id(s) not present in the dataset",
                resolver.rels_pending.len()
            );
            resolver.rels_pending.clear();
        }
    }

    // Then ways, which only ever reference nodes; one extra scan can
    // still be needed when the first scan emits nothing new.
    if mask.way || !resolver.ways_pending.is_empty() {
        let scan_mask = resolver.scan_mask_for(EntityKind::Way);
        let mut pass = 0u32;
        loop {
            pass += 1;
            let changed = resolver.scan_once(source, scan_mask)?;
            tracing::debug!(
                "Way pass {}: {} emitted, {} pending",
                pass,
                resolver.emit_ways.len(),
                resolver.ways_pending.len()
            );
            if resolver.ways_pending.is_empty() || !changed {
                break;
            }
        }
        if !resolver.ways_pending.is_empty() {
            tracing::warn!(
                "{} referenced way id(s) not present in the dataset",
                resolver.ways_pending.len()
            );
            resolver.ways_pending.clear();
        }
    }

    Ok(resolver.into_plan())
}
