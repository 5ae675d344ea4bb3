use crate::fixtures::{guard_failure, int, jump, method, op, var, GUARD_VALUE, V1, V2};
use remora_analysis::opaque::{analyze, opaque_parameter, resolve};
use remora_analysis::{ReachabilityConfig, ReachabilityScanner};
use remora_core::{MethodDef, MethodKey, Opcode};
use std::collections::BTreeSet;

/// Instance `(Ljava/lang/String;I)V` whose guards bail out when their jump is taken.
fn guarded(guards: &[(Opcode, i32)]) -> MethodDef {
    let mut body = Vec::new();
    for &(opcode, value) in guards {
        body.extend([var(Opcode::ILOAD, 2), int(value), jump(opcode, 9)]);
    }
    body.push(op(Opcode::RETURN));
    body.extend(guard_failure(9));
    method("m", "(Ljava/lang/String;I)V", false, body)
}

#[test]
fn passing_value_of_the_fixture_guard() {
    let artifact = V2.artifact();
    let config = ReachabilityConfig::default();
    let live = ReachabilityScanner::new(&artifact, &config).scan();
    let analysis = analyze(&artifact, &live);

    let log = MethodKey::new(V2.util, V2.log, "(Ljava/lang/String;I)V");
    assert_eq!(analysis.value(&log), Some(i64::from(GUARD_VALUE)));
    assert!(analysis.has_garbage(&log));
    assert_eq!(analysis.opaque_params[&log], BTreeSet::from([1]));
    assert_eq!(analysis.values.len(), 1);
}

#[test]
fn clean_version_has_no_opaque_predicates() {
    let artifact = V1.artifact();
    let config = ReachabilityConfig::default();
    let live = ReachabilityScanner::new(&artifact, &config).scan();
    let analysis = analyze(&artifact, &live);
    assert!(analysis.garbage.is_empty());
    assert!(analysis.values.is_empty());
}

#[test]
fn range_and_exclusions_fold_into_the_smallest_value() {
    // passes when p > 5, p <= 10 and p != 7
    let m = guarded(&[
        (Opcode::IF_ICMPLE, 5),
        (Opcode::IF_ICMPGT, 10),
        (Opcode::IF_ICMPEQ, 7),
    ]);
    assert_eq!(resolve(&m), Some(6));
    assert_eq!(opaque_parameter(&m), Some(1));

    let m = guarded(&[(Opcode::IF_ICMPLE, 5), (Opcode::IF_ICMPEQ, 6)]);
    assert_eq!(resolve(&m), Some(7));
}

#[test]
fn unsatisfiable_guards_have_no_value() {
    // p == 3 and p != 3
    let m = guarded(&[(Opcode::IF_ICMPNE, 3), (Opcode::IF_ICMPEQ, 3)]);
    assert_eq!(resolve(&m), None);
    // still an opaque parameter, only unresolvable
    assert_eq!(opaque_parameter(&m), Some(1));
}

#[test]
fn a_parameter_with_real_uses_is_not_opaque() {
    let mut m = guarded(&[(Opcode::IF_ICMPLT, 0)]);
    assert_eq!(resolve(&m), Some(0));
    m.instructions.insert(0, var(Opcode::ILOAD, 2));
    m.instructions.insert(1, op(Opcode::POP));
    assert_eq!(resolve(&m), None);
    assert_eq!(opaque_parameter(&m), None);
}
