use crate::fixtures::{V1, V2};
use remora_core::MethodKey;
use remora_matcher::pipeline::RemapContext;
use remora_matcher::RemapConfig;
use std::collections::BTreeSet;

fn expected() -> Vec<(MethodKey, MethodKey)> {
    vec![
        (
            MethodKey::new(V1.util, V1.log, "(Ljava/lang/String;)V"),
            MethodKey::new(V2.util, V2.log, "(Ljava/lang/String;I)V"),
        ),
        (
            MethodKey::new(V1.util, V1.twice, "(I)I"),
            MethodKey::new(V2.util, V2.twice, "(I)I"),
        ),
        (
            MethodKey::new("client", "<init>", "()V"),
            MethodKey::new("client", "<init>", "()V"),
        ),
        (
            MethodKey::new("client", V1.tick, "()V"),
            MethodKey::new("client", V2.tick, "()V"),
        ),
    ]
}

#[test]
fn refinement_selects_only_candidates_and_converges() {
    let (old, new) = (V1.artifact(), V2.artifact());
    let config = RemapConfig::default();
    let ctx = RemapContext::new(&old, &new, &config).unwrap();
    let pairing = ctx.structural_pairing();
    let candidates = ctx.candidates(&pairing);
    let report = ctx.refine(&candidates).unwrap();

    let offered: BTreeSet<(&MethodKey, &MethodKey)> =
        candidates.iter().map(|m| (&m.old, &m.new)).collect();
    for pair in &report.mapping {
        assert!(offered.contains(&pair), "{} -> {} was never a candidate", pair.0, pair.1);
    }
    let images: BTreeSet<&MethodKey> = report.mapping.values().collect();
    assert_eq!(images.len(), report.mapping.len());

    assert!(report.converged);
    assert!(report.rounds <= config.refine.max_iterations);
    assert!(report.scores.values().all(|s| (0.0..=1.0).contains(s)));
    assert_eq!(
        report.mapping.into_iter().collect::<Vec<_>>(),
        expected()
    );
}

#[test]
fn round_cap_is_respected() {
    let (old, new) = (V1.artifact(), V2.artifact());
    let mut config = RemapConfig::default();
    config.refine.max_iterations = 0;
    let ctx = RemapContext::new(&old, &new, &config).unwrap();
    let candidates = ctx.candidates(&ctx.structural_pairing());
    let report = ctx.refine(&candidates).unwrap();

    // with no rounds the seed stands as the selection
    assert_eq!(report.rounds, 0);
    assert!(!report.converged);
    assert_eq!(report.mapping.len(), 4);
}

#[test]
fn cross_class_candidates_reach_the_same_answer() {
    let (old, new) = (V1.artifact(), V2.artifact());
    let config = RemapConfig::lenient();
    let ctx = RemapContext::new(&old, &new, &config).unwrap();
    let candidates = ctx.candidates(&ctx.structural_pairing());
    let report = ctx.refine(&candidates).unwrap();
    assert_eq!(report.mapping.into_iter().collect::<Vec<_>>(), expected());
}
