use crate::fixtures::{class, invoke, method, op, V1};
use remora_analysis::{ReachabilityConfig, ReachabilityScanner};
use remora_core::{Artifact, MethodDef, MethodKey, Opcode};
use std::collections::BTreeSet;

fn scan(artifact: &Artifact) -> BTreeSet<MethodKey> {
    let config = ReachabilityConfig::default();
    ReachabilityScanner::new(artifact, &config).scan()
}

fn helper() -> MethodDef {
    method("x", "()V", true, vec![op(Opcode::RETURN)])
}

#[test]
fn fixture_liveness() {
    let live = scan(&V1.artifact());
    let expected: BTreeSet<MethodKey> = [
        MethodKey::new("client", "<init>", "()V"),
        MethodKey::new("client", V1.tick, "()V"),
        MethodKey::new(V1.util, V1.log, "(Ljava/lang/String;)V"),
        MethodKey::new(V1.util, V1.twice, "(I)I"),
    ]
    .into();
    assert_eq!(live, expected);
}

#[test]
fn adding_an_edge_never_shrinks_the_live_set() {
    let mut artifact = V1.artifact();
    artifact.classes[1].methods.push(helper());
    let artifact = Artifact::from_classes(artifact.classes);
    let before = scan(&artifact);
    let x = MethodKey::new(V1.util, "x", "()V");
    assert!(!before.contains(&x));

    let mut classes = artifact.classes;
    let twice = classes[1]
        .methods
        .iter_mut()
        .find(|m| m.name == V1.twice)
        .unwrap();
    twice
        .instructions
        .insert(0, invoke(Opcode::INVOKESTATIC, V1.util, "x", "()V"));
    let after = scan(&Artifact::from_classes(classes));

    assert!(after.is_superset(&before));
    assert!(after.contains(&x));
}

#[test]
fn adding_a_seed_never_shrinks_the_live_set() {
    let artifact = V1.artifact();
    let before = scan(&artifact);

    let mut classes = artifact.classes;
    classes.push(class(
        "cd",
        vec![
            method(
                "<clinit>",
                "()V",
                true,
                vec![
                    invoke(Opcode::INVOKESTATIC, "cd", "x", "()V"),
                    op(Opcode::RETURN),
                ],
            ),
            helper(),
        ],
        vec![],
    ));
    // readable classes never seed the scan
    classes.push(class(
        "util/Helper",
        vec![method("<clinit>", "()V", true, vec![op(Opcode::RETURN)])],
        vec![],
    ));
    let after = scan(&Artifact::from_classes(classes));

    assert!(after.is_superset(&before));
    assert!(after.contains(&MethodKey::new("cd", "<clinit>", "()V")));
    assert!(after.contains(&MethodKey::new("cd", "x", "()V")));
    assert!(!after.contains(&MethodKey::new("util/Helper", "<clinit>", "()V")));
    assert_eq!(after.len(), before.len() + 2);
}
