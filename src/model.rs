//! Entity model shared by the filter DSL and the reference resolver.
//!
//! Identity is the (kind, id) pair; ids are only unique within a kind.
//! Tags are kept as an ordered list because OSM data in the wild does
//! contain repeated keys and the filter semantics are existential over
//! the whole list.

use geo_types::Coord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Node,
    Way,
    Relation,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::Way => "way",
            EntityKind::Relation => "relation",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single key/value tag. Keys may repeat within one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Tag {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A typed, role-annotated relation member reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub kind: EntityKind,
    #[serde(rename = "ref")]
    pub id: i64,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Longitude/latitude in degrees; absent when the source could not
    /// resolve a location for this node.
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub lat: Option<f64>,
}

impl Node {
    pub fn location(&self) -> Option<Coord<f64>> {
        match (self.lon, self.lat) {
            (Some(x), Some(y)) => Some(Coord { x, y }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Way {
    pub id: i64,
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Ordered node references forming the path.
    #[serde(default)]
    pub refs: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: i64,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub members: Vec<Member>,
}

/// One streamed entity. The JSONL wire form carries the kind in a
/// `type` field: `{"type":"node","id":1,"lon":0.0,"lat":0.0,"tags":[...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entity {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Node(_) => EntityKind::Node,
            Entity::Way(_) => EntityKind::Way,
            Entity::Relation(_) => EntityKind::Relation,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Entity::Node(n) => n.id,
            Entity::Way(w) => w.id,
            Entity::Relation(r) => r.id,
        }
    }

    pub fn tags(&self) -> &[Tag] {
        match self {
            Entity::Node(n) => &n.tags,
            Entity::Way(w) => &w.tags,
            Entity::Relation(r) => &r.tags,
        }
    }
}

/// Which entity kinds are eligible for direct filter matches.
///
/// Referenced entities bypass the mask: a relation closure always pulls
/// in its member ways and nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindMask {
    pub node: bool,
    pub way: bool,
    pub relation: bool,
}

impl KindMask {
    pub const fn all() -> Self {
        KindMask {
            node: true,
            way: true,
            relation: true,
        }
    }

    pub const fn only(kind: EntityKind) -> Self {
        KindMask {
            node: matches!(kind, EntityKind::Node),
            way: matches!(kind, EntityKind::Way),
            relation: matches!(kind, EntityKind::Relation),
        }
    }

    pub fn contains(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Node => self.node,
            EntityKind::Way => self.way,
            EntityKind::Relation => self.relation,
        }
    }

    pub fn any(&self) -> bool {
        self.node || self.way || self.relation
    }
}

impl Default for KindMask {
    fn default() -> Self {
        KindMask::all()
    }
}

impl FromStr for KindMask {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut mask = KindMask {
            node: false,
            way: false,
            relation: false,
        };
        for c in value.chars() {
            match c.to_ascii_lowercase() {
                'n' => mask.node = true,
                'w' => mask.way = true,
                'r' => mask.relation = true,
                other => return Err(format!("invalid kind letter '{other}' (expected n, w, r)")),
            }
        }
        if !mask.any() {
            return Err("empty kind mask".to_string());
        }
        Ok(mask)
    }
}

impl fmt::Display for KindMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.node {
            f.write_str("n")?;
        }
        if self.way {
            f.write_str("w")?;
        }
        if self.relation {
            f.write_str("r")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_mask_from_letters() {
        let mask: KindMask = "wr".parse().unwrap();
        assert!(!mask.node);
        assert!(mask.way);
        assert!(mask.relation);
        assert_eq!(mask.to_string(), "wr");
    }

    #[test]
    fn kind_mask_rejects_unknown_letters() {
        assert!("nwx".parse::<KindMask>().is_err());
        assert!("".parse::<KindMask>().is_err());
    }

    #[test]
    fn entity_kind_orders_like_the_scan_order() {
        let mut pairs = vec![
            (EntityKind::Relation, 20_i64),
            (EntityKind::Node, 2),
            (EntityKind::Way, 10),
            (EntityKind::Node, 1),
        ];
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                (EntityKind::Node, 1),
                (EntityKind::Node, 2),
                (EntityKind::Way, 10),
                (EntityKind::Relation, 20),
            ]
        );
    }

    #[test]
    fn entity_roundtrips_through_json() {
        let way = Entity::Way(Way {
            id: 7,
            tags: vec![Tag::new("highway", "primary")],
            refs: vec![1, 2, 3],
        });
        let line = serde_json::to_string(&way).unwrap();
        assert!(line.contains("\"type\":\"way\""));
        let back: Entity = serde_json::from_str(&line).unwrap();
        assert_eq!(back, way);
    }

    #[test]
    fn node_without_coordinates_has_no_location() {
        let node: Node = serde_json::from_str(r#"{"id":1}"#).unwrap();
        assert!(node.location().is_none());
    }
}
