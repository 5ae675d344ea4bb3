use crate::fixtures::{init_tracing, v1_mapping, GUARD_VALUE, V1, V2};
use remora_core::mapping::MappedClass;
use remora_matcher::{run, FixedClassPairing, RemapConfig, RemapOutcome};
use serde_json::Value;
use tracing::info;

fn remap() -> RemapOutcome {
    let old_mapping = v1_mapping();
    run(
        &V1.artifact(),
        &V2.artifact(),
        Some(&old_mapping),
        None,
        &RemapConfig::default(),
    )
    .unwrap()
}

fn class<'a>(mapping: &'a [MappedClass], obfuscated: &str) -> &'a MappedClass {
    mapping
        .iter()
        .find(|c| c.obfuscated_name == obfuscated)
        .unwrap()
}

#[test]
fn names_reach_the_new_version() {
    init_tracing();
    let outcome = remap();
    info!("\n{}", outcome.render());

    assert_eq!(outcome.old_live, 4);
    assert_eq!(outcome.new_live, 4);
    assert_eq!(outcome.class_pairs, 2);

    let client = class(&outcome.mapping, "client");
    assert_eq!(client.name, "Client");
    let tick = client
        .methods
        .iter()
        .find(|m| m.obfuscated_name == V2.tick)
        .unwrap();
    assert_eq!(tick.name, "tick");
    assert_eq!(tick.owner, "Client");
    assert_eq!(tick.garbage_value, None);
    let ctor = client
        .methods
        .iter()
        .find(|m| m.obfuscated_name == "<init>")
        .unwrap();
    assert!(!ctor.is_named());

    let counter = &client.fields[0];
    assert_eq!(counter.obfuscated_name, V2.counter);
    assert_eq!(counter.name, "counter");
    assert_eq!(counter.getter, Some(i64::from(V2.decode)));
    assert_eq!(counter.setter, Some(i64::from(V2.encode)));

    let util = class(&outcome.mapping, V2.util);
    assert_eq!(util.name, "Util");
    let log = util
        .methods
        .iter()
        .find(|m| m.obfuscated_name == V2.log)
        .unwrap();
    assert_eq!(log.name, "log");
    assert_eq!(log.descriptor, "(Ljava/lang/String;I)V");
    assert_eq!(log.garbage_value, Some(i64::from(GUARD_VALUE)));
    assert!(log.is_static);
    let twice = util
        .methods
        .iter()
        .find(|m| m.obfuscated_name == V2.twice)
        .unwrap();
    assert_eq!(twice.name, "twice");
    assert_eq!(twice.garbage_value, None);
}

#[test]
fn repeated_runs_agree() {
    let first = remap();
    let second = remap();
    assert_eq!(first.mapping, second.mapping);
    assert_eq!(first.refined.mapping, second.refined.mapping);
    assert_eq!(first.fields, second.fields);
    assert_eq!(first.report_json().unwrap(), second.report_json().unwrap());
    assert_eq!(first.render(), second.render());
}

#[test]
fn report_lists_every_resolved_pair() {
    let report: Value = serde_json::from_str(&remap().report_json().unwrap()).unwrap();
    assert_eq!(report["classPairs"], 2);
    assert_eq!(report["converged"], true);
    assert_eq!(report["methods"].as_array().unwrap().len(), 4);
    assert_eq!(report["fields"][0]["old"], "client.b I");
    assert_eq!(report["fields"][0]["new"], "client.c I");
    assert_eq!(report["carry"]["methodsCarried"], 3);
    let identical = report["methods"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["old"] == "ab.d(I)I")
        .unwrap();
    assert_eq!(identical["new"], "zq.f(I)I");
    assert!(identical["score"].as_f64().unwrap() > 0.99);
}

#[test]
fn supplied_class_pairing_overrides_the_structural_one() {
    // pairing the utility class with nothing leaves its methods without candidates
    let pairing = FixedClassPairing::identity(["client"]);
    let outcome = run(
        &V1.artifact(),
        &V2.artifact(),
        Some(&v1_mapping()),
        Some(&pairing),
        &RemapConfig::default(),
    )
    .unwrap();

    assert_eq!(outcome.class_pairs, 1);
    assert_eq!(outcome.refined.mapping.len(), 2);
    let carry = outcome.carry.unwrap();
    assert_eq!(carry.classes_unmatched, 1);
    assert_eq!(carry.methods_skipped, 2);
    assert!(class(&outcome.mapping, V2.util).name.is_empty());
}
