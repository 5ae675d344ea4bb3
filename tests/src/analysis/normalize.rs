use crate::fixtures::{wrap, V1, V2};
use remora_analysis::normalize::{normalize, normalize_all, normalize_with};
use remora_core::strip::strip_wrapper;
use remora_core::{Insn, MethodKey, Opcode};
use std::collections::{BTreeMap, BTreeSet};

fn live(artifact: &remora_core::Artifact) -> BTreeSet<MethodKey> {
    artifact.methods().map(|(key, _)| key).collect()
}

#[test]
fn normalizing_twice_gives_the_same_summaries() {
    let artifact = V2.artifact();
    let keys = live(&artifact);
    let opaque = BTreeMap::from([(
        MethodKey::new(V2.util, V2.log, "(Ljava/lang/String;I)V"),
        BTreeSet::from([1]),
    )]);
    let first = normalize_all(&artifact, &keys, &opaque);
    let second = normalize_all(&artifact, &keys, &opaque);
    assert_eq!(first, second);
    assert_eq!(first.len(), keys.len());
}

#[test]
fn guard_branches_do_not_change_the_fingerprint() {
    let old = V1.artifact();
    let new = V2.artifact();
    let plain = old.class(V1.util).unwrap().method(V1.log, "(Ljava/lang/String;)V").unwrap();
    let guarded = new
        .class(V2.util)
        .unwrap()
        .method(V2.log, "(Ljava/lang/String;I)V")
        .unwrap();

    let a = normalize(V1.util, plain);
    let b = normalize_with(V2.util, guarded, &BTreeSet::from([1]));
    assert_eq!(b.descriptor, "(Ljava/lang/String;)V");
    assert_eq!(a.opcode_histogram, b.opcode_histogram);
    assert_eq!(a.fingerprint, b.fingerprint);

    // left in place, the guard is part of the body
    let kept = normalize(V2.util, guarded);
    assert_ne!(a.fingerprint, kept.fingerprint);
}

#[test]
fn ordering_guards_stay_in_the_body() {
    let old = V1.artifact();
    let new = V2.artifact();
    let plain = old.class(V1.util).unwrap().method(V1.log, "(Ljava/lang/String;)V").unwrap();
    let mut guarded = new
        .class(V2.util)
        .unwrap()
        .method(V2.log, "(Ljava/lang/String;I)V")
        .unwrap()
        .clone();
    for insn in &mut guarded.instructions {
        if let Insn::Jump { opcode, .. } = insn {
            *opcode = Opcode::IF_ICMPLT;
        }
    }

    let a = normalize(V1.util, plain);
    let b = normalize_with(V2.util, &guarded, &BTreeSet::from([1]));
    assert_eq!(b.descriptor, a.descriptor);
    assert_eq!(b.opcode_histogram.get(&Opcode::IF_ICMPLT), Some(&1));
    assert_ne!(a.fingerprint, b.fingerprint);
}

#[test]
fn wrapper_does_not_change_the_fingerprint() {
    let old = V1.artifact();
    let tick = old.class("client").unwrap().method(V1.tick, "()V").unwrap();
    let wrapped = wrap(tick.clone(), "client.a()V");

    let a = normalize("client", tick);
    let b = normalize("client", &wrapped);
    assert!(!a.unwrapped);
    assert!(b.unwrapped);
    assert_eq!(a.fingerprint, b.fingerprint);
    assert!(!b.strings.contains("client.a()V"));
}

#[test]
fn unwrapping_is_idempotent() {
    let new = V2.artifact();
    let mut tick = new.class("client").unwrap().method(V2.tick, "()V").unwrap().clone();
    let before = normalize("client", &tick);

    let report = strip_wrapper(&mut tick);
    assert!(report.stripped);
    assert_eq!(report.signature.as_deref(), Some("client.b()V"));
    assert!(tick.try_catch.is_empty());

    let once = tick.clone();
    assert!(!strip_wrapper(&mut tick).stripped);
    assert_eq!(tick, once);
    assert_eq!(normalize("client", &tick).fingerprint, before.fingerprint);
}
