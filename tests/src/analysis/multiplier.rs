use crate::fixtures::{class, field, field_op, int, method, op, var, V1, V2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use remora_analysis::multiplier::{mod_inverse, scan, sign_extend};
use remora_core::{Artifact, Constant, FieldKey, Insn, Opcode};
use std::collections::BTreeSet;

fn all_fields(artifact: &Artifact) -> BTreeSet<FieldKey> {
    artifact.fields().map(|(key, _)| key).collect()
}

#[test]
fn inverses_over_random_keys() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..2_000 {
        let k = rng.random::<i32>() | 1;
        let inverse = mod_inverse(i64::from(k), 32).unwrap();
        assert_eq!(k.wrapping_mul(inverse as i32), 1, "k = {k}");
        assert_eq!(inverse, sign_extend(inverse, 32));

        let even = rng.random::<i32>() & !1;
        assert_eq!(mod_inverse(i64::from(even), 32), None);

        let wide = rng.random::<i64>() | 1;
        let inverse = mod_inverse(wide, 64).unwrap();
        assert_eq!(wide.wrapping_mul(inverse), 1, "k = {wide}");
    }
}

#[test]
fn recovers_both_versions_of_the_counter() {
    for names in [V1, V2] {
        let artifact = names.artifact();
        let pairs = scan(&artifact, &all_fields(&artifact));
        let pair = pairs[&FieldKey::new("client", names.counter, "I")];
        assert_eq!(pair.decode, i64::from(names.decode));
        assert_eq!(pair.encode, i64::from(names.encode));
        assert_eq!(pair.bits, 32);
        assert!(pair.is_consistent());
    }
}

#[test]
fn missing_side_is_derived() {
    // static long read twice, never written
    const K: i64 = 0x5851_f42d_4c95_7f2d;
    let reader = method(
        "r",
        "()J",
        true,
        vec![
            field_op(Opcode::GETSTATIC, "qd", "z", "J"),
            Insn::Ldc {
                constant: Constant::Long(K),
            },
            op(Opcode::LMUL),
            op(Opcode::LRETURN),
        ],
    );
    let mut z = field("z", "J");
    z.is_static = true;
    let artifact = Artifact::from_classes(vec![class("qd", vec![reader], vec![z])]);
    let pair = scan(&artifact, &all_fields(&artifact))[&FieldKey::new("qd", "z", "J")];
    assert_eq!(pair.decode, K);
    assert_eq!(pair.encode.wrapping_mul(K), 1);
    assert_eq!(pair.bits, 64);
}

#[test]
fn disagreeing_constants_are_dropped() {
    let body = vec![
        var(Opcode::ALOAD, 0),
        var(Opcode::ALOAD, 0),
        field_op(Opcode::GETFIELD, "qd", "y", "I"),
        int(3),
        op(Opcode::IMUL),
        int(5),
        op(Opcode::IMUL),
        field_op(Opcode::PUTFIELD, "qd", "y", "I"),
        op(Opcode::RETURN),
    ];
    let artifact = Artifact::from_classes(vec![class(
        "qd",
        vec![method("w", "()V", false, body)],
        vec![field("y", "I")],
    )]);
    assert!(scan(&artifact, &all_fields(&artifact)).is_empty());
}
