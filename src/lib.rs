//! Filter and extract entities from geotagged entity streams.
//!
//! The crate compiles a small boolean filter language into an AST,
//! evaluates it against streamed nodes, ways and relations, and can
//! optionally resolve the transitive reference closure of the matching
//! set so that emitted ways and relations arrive with their members.

pub mod app;
pub mod config;
pub mod dsl;
pub mod extract;
pub mod model;
pub mod sink;
pub mod source;
pub mod spatial;

pub use dsl::{CompileError, FilterAst, compile, evaluate, evaluate_numeric};
pub use extract::{EmitPlan, resolve_references};
pub use model::{Entity, EntityKind, KindMask, Member, Node, Relation, Tag, Way};
pub use sink::{EntitySink, JsonlSink};
pub use source::{EntitySource, JsonlSource, MemorySource};
pub use spatial::SpatialState;
