use std::path::{Path, PathBuf};

use osmsieve::{
    EntitySink, EntitySource, JsonlSink, JsonlSource, KindMask, SpatialState, compile,
    resolve_references,
};

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("fixture")
        .join("transit_sample.jsonl")
}

#[test]
fn closure_resolution_over_a_jsonl_stream() {
    let source = JsonlSource::new(fixture_path());
    let filter = compile(r#"tag("route", "bus")"#).unwrap();

    let plan = resolve_references(Some(filter), KindMask::only(osmsieve::EntityKind::Relation), &source)
        .unwrap();
    assert_eq!(plan.referenced_counts(), (3, 1, 1));

    let mut spatial = SpatialState::new();
    let mut emitted = Vec::new();
    for entity in source.scan(KindMask::all()).unwrap() {
        let entity = entity.unwrap();
        if plan.should_emit(&entity, &mut spatial) {
            emitted.push((entity.kind(), entity.id()));
        }
    }

    use osmsieve::EntityKind::*;
    assert_eq!(
        emitted,
        vec![(Node, 1), (Node, 3), (Node, 4), (Way, 10), (Relation, 20)]
    );
}

#[test]
fn sink_writes_one_json_object_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.jsonl");

    let source = JsonlSource::new(fixture_path());
    let mut sink = JsonlSink::new(&path).unwrap();
    for entity in source.scan(KindMask::only(osmsieve::EntityKind::Way)).unwrap() {
        sink.add_entity(&entity.unwrap()).unwrap();
    }
    sink.finish().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    for line in lines {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["type"], "way");
    }
}
