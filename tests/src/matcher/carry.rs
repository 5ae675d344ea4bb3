use crate::fixtures::{v1_mapping, V1, V2};
use remora_core::mapping::{MappedClass, MappedMethod};
use remora_matcher::carry::CarryReport;
use remora_matcher::{run, RemapConfig};

#[test]
fn stale_entries_are_counted_not_fatal() {
    let mut old_mapping = v1_mapping();
    old_mapping[0].methods.push(MappedMethod {
        name: "removed".into(),
        obfuscated_name: "zz".into(),
        owner_obfuscated_name: "client".into(),
        descriptor: "()V".into(),
        ..MappedMethod::default()
    });
    old_mapping.push(MappedClass {
        name: "Ghost".into(),
        obfuscated_name: "qq".into(),
        ..MappedClass::default()
    });

    let outcome = run(
        &V1.artifact(),
        &V2.artifact(),
        Some(&old_mapping),
        None,
        &RemapConfig::default(),
    )
    .unwrap();

    assert_eq!(
        outcome.carry,
        Some(CarryReport {
            classes_carried: 2,
            classes_skipped: 1,
            classes_unmatched: 0,
            methods_carried: 3,
            methods_skipped: 1,
            fields_carried: 1,
            fields_skipped: 0,
        })
    );
    assert!(outcome.mapping.iter().all(|c| c.name != "Ghost"));
}

#[test]
fn nothing_to_carry_leaves_an_unnamed_scaffold() {
    let outcome = run(
        &V1.artifact(),
        &V2.artifact(),
        None,
        None,
        &RemapConfig::default(),
    )
    .unwrap();
    assert!(outcome.carry.is_none());
    assert_eq!(outcome.mapping.len(), 2);
    assert!(outcome.mapping.iter().all(|c| c.name.is_empty()));
    assert!(outcome
        .mapping
        .iter()
        .flat_map(|c| &c.methods)
        .all(|m| !m.is_named()));
}
