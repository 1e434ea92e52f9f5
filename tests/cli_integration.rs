use std::path::{Path, PathBuf};
use std::process::Command;

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("fixture")
        .join("transit_sample.jsonl")
}

fn run_osmsieve(args: &[&str]) -> Vec<serde_json::Value> {
    let exe = env!("CARGO_BIN_EXE_osmsieve");

    let output = Command::new(exe)
        .arg("--input")
        .arg(fixture_path())
        .arg("--output")
        .arg("-")
        .args(args)
        .output()
        .expect("run osmsieve");

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("osmsieve failed: {}", stderr);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("valid JSON line"))
        .collect()
}

fn ids_of_kind(entities: &[serde_json::Value], kind: &str) -> Vec<i64> {
    entities
        .iter()
        .filter(|e| e["type"] == kind)
        .map(|e| e["id"].as_i64().unwrap())
        .collect()
}

#[test]
fn key_filter_emits_matching_nodes_and_ways() {
    let entities = run_osmsieve(&["--expression", r#""highway""#]);
    assert_eq!(ids_of_kind(&entities, "node"), vec![1]);
    assert_eq!(ids_of_kind(&entities, "way"), vec![10]);
    assert!(ids_of_kind(&entities, "relation").is_empty());
}

#[test]
fn kind_mask_restricts_direct_matches() {
    let entities = run_osmsieve(&["--expression", r#""highway""#, "--kinds", "w"]);
    assert!(ids_of_kind(&entities, "node").is_empty());
    assert_eq!(ids_of_kind(&entities, "way"), vec![10]);
}

#[test]
fn include_refs_pulls_in_the_whole_closure() {
    let entities = run_osmsieve(&[
        "--expression",
        r#"tag("route", "bus")"#,
        "--kinds",
        "r",
        "--include-refs",
    ]);
    // Relation 20 matches; its member way 10 and node 3 follow, and
    // way 10 brings nodes 1 and 4.
    assert_eq!(ids_of_kind(&entities, "node"), vec![1, 3, 4]);
    assert_eq!(ids_of_kind(&entities, "way"), vec![10]);
    assert_eq!(ids_of_kind(&entities, "relation"), vec![20]);
}

#[test]
fn nested_relations_resolve_through_extra_passes() {
    let entities = run_osmsieve(&[
        "--expression",
        r#"tag("type", "network")"#,
        "--kinds",
        "r",
        "--include-refs",
    ]);
    // Relation 21 references relation 20, which is streamed earlier,
    // so a second relation pass is needed to pick it up.
    assert_eq!(ids_of_kind(&entities, "relation"), vec![20, 21]);
    assert_eq!(ids_of_kind(&entities, "way"), vec![10]);
    assert_eq!(ids_of_kind(&entities, "node"), vec![1, 3, 4]);
}

#[test]
fn bbox_filter_classifies_ways_through_their_nodes() {
    let entities = run_osmsieve(&[
        "--expression",
        "bbox(-0.01, -0.01, 0.01, 0.01)",
        "--kinds",
        "w",
    ]);
    // Way 10's nodes sit inside the box; way 11's single node does not.
    assert_eq!(ids_of_kind(&entities, "way"), vec![10]);
    assert!(ids_of_kind(&entities, "node").is_empty());
}

#[test]
fn distance_comparisons_only_constrain_nodes() {
    let entities = run_osmsieve(&[
        "--expression",
        r#""highway" & distance(pointAt(0, 0)) < 1000"#,
    ]);
    // Node 1 is ~157m from the origin. Way 10 has no location, so the
    // distance term is vacuously true and the tag test decides.
    assert_eq!(ids_of_kind(&entities, "node"), vec![1]);
    assert_eq!(ids_of_kind(&entities, "way"), vec![10]);
}

#[test]
fn max_results_stops_the_scan_early() {
    let entities = run_osmsieve(&["--max-results", "3"]);
    assert_eq!(entities.len(), 3);
}

#[test]
fn count_mode_prints_per_kind_totals() {
    let exe = env!("CARGO_BIN_EXE_osmsieve");
    let output = Command::new(exe)
        .arg("--input")
        .arg(fixture_path())
        .arg("--expression")
        .arg(r#""highway""#)
        .arg("--count")
        .output()
        .expect("run osmsieve");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "nodes: 1, ways: 1, relations: 0");
}

#[test]
fn job_file_supplies_defaults_and_cli_overrides_them() {
    let job_file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
    std::fs::write(
        job_file.path(),
        "expression: '\"highway\"'\nkinds: n\n",
    )
    .unwrap();

    let job_arg = job_file.path().to_str().unwrap().to_string();
    let entities = run_osmsieve(&["--job", &job_arg]);
    assert_eq!(ids_of_kind(&entities, "node"), vec![1]);
    assert!(ids_of_kind(&entities, "way").is_empty());

    let entities = run_osmsieve(&["--job", &job_arg, "--kinds", "w"]);
    assert!(ids_of_kind(&entities, "node").is_empty());
    assert_eq!(ids_of_kind(&entities, "way"), vec![10]);
}

#[test]
fn invalid_expression_fails_with_a_caret_diagnostic() {
    let exe = env!("CARGO_BIN_EXE_osmsieve");
    let output = Command::new(exe)
        .arg("--input")
        .arg(fixture_path())
        .arg("--expression")
        .arg(r#""highway" & frob("x")"#)
        .output()
        .expect("run osmsieve");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid filter expression"), "{stderr}");
    assert!(stderr.contains("unknown test `frob`"), "{stderr}");
    assert!(stderr.contains('^'), "{stderr}");
}

#[test]
fn writes_to_a_file_when_output_is_a_path() {
    let out = tempfile::NamedTempFile::with_suffix(".jsonl").unwrap();
    let out_path = out.path().to_str().unwrap();

    let exe = env!("CARGO_BIN_EXE_osmsieve");
    let status = Command::new(exe)
        .arg("--input")
        .arg(fixture_path())
        .arg("--output")
        .arg(out_path)
        .arg("--expression")
        .arg(r#"id(20, relation)"#)
        .arg("--verbose")
        .status()
        .expect("run osmsieve");

    assert!(status.success());
    let content = std::fs::read_to_string(out_path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);

    let entity: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(entity["type"], "relation");
    assert_eq!(entity["id"], 20);
}
