use crate::fixtures::{init_tracing, v1_mapping, V1, V2};
use remora_core::artifact::{load_artifact, parse_artifact};
use remora_matcher::{run, RemapConfig};
use serde_json::{json, Value};
use std::io::Write;
use tempfile::NamedTempFile;

fn document(artifact: &remora_core::Artifact) -> Value {
    serde_json::to_value(artifact).unwrap()
}

#[test]
fn malformed_members_are_skipped_and_the_run_continues() {
    init_tracing();
    let mut doc = document(&V2.artifact());
    let classes = doc["classes"].as_array_mut().unwrap();
    classes[0]["methods"]
        .as_array_mut()
        .unwrap()
        .push(json!({"name": "x", "desc": "(Q)V"}));
    classes[1]["fields"]
        .as_array_mut()
        .unwrap()
        .push(json!({"name": "y", "desc": "not a type"}));
    classes.push(json!({"methods": []}));

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(serde_json::to_string(&doc).unwrap().as_bytes())
        .unwrap();
    let (new, report) = load_artifact(file.path()).unwrap();

    assert_eq!(report.skipped.len(), 3);
    assert_eq!(new.classes.len(), 2);
    assert!(new.class("client").unwrap().method("x", "(Q)V").is_none());

    let mapping = v1_mapping();
    let outcome = run(
        &V1.artifact(),
        &new,
        Some(&mapping),
        None,
        &RemapConfig::default(),
    )
    .unwrap();
    let carry = outcome.carry.unwrap();
    assert_eq!(carry.methods_carried, 3);
    assert_eq!(carry.fields_carried, 1);
}

#[test]
fn digest_covers_the_raw_bytes() {
    let bytes = serde_json::to_vec(&document(&V1.artifact())).unwrap();
    let (_, first) = parse_artifact(&bytes).unwrap();
    let (_, second) = parse_artifact(&bytes).unwrap();
    assert_eq!(first.sha256, second.sha256);
    assert_eq!(first.sha256.len(), 64);
    assert_eq!(first.byte_length, bytes.len());

    let mut spaced = bytes.clone();
    spaced.push(b'\n');
    let (_, third) = parse_artifact(&spaced).unwrap();
    assert_ne!(first.sha256, third.sha256);
}

#[test]
fn rejects_documents_that_are_not_artifacts() {
    assert!(parse_artifact(br#"{"version": 3}"#).is_err());
    assert!(parse_artifact(b"[{]").is_err());
    assert!(load_artifact("/nonexistent/remora/artifact.json").is_err());
}
