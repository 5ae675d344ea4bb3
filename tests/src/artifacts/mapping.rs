use crate::fixtures::{v1_mapping, V1, V2};
use remora_core::mapping::{load_mapping, mapping_from_str, mapping_to_string, save_mapping};
use remora_matcher::{run, RemapConfig};
use std::fs;

#[test]
fn carried_mapping_survives_save_and_load() {
    let old_mapping = v1_mapping();
    let outcome = run(
        &V1.artifact(),
        &V2.artifact(),
        Some(&old_mapping),
        None,
        &RemapConfig::default(),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");
    save_mapping(&first, &outcome.mapping).unwrap();
    let loaded = load_mapping(&first).unwrap();
    assert_eq!(loaded, outcome.mapping);
    save_mapping(&second, &loaded).unwrap();
    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn mapping_documents_use_camel_case_keys() {
    let json = mapping_to_string(&v1_mapping()).unwrap();
    assert!(json.contains("\"obfuscatedName\": \"client\""));
    assert!(json.contains("\"ownerObfuscatedName\""));
    assert!(!json.contains("owner_obfuscated_name"));
    assert_eq!(mapping_from_str(&json).unwrap(), v1_mapping());
}
