use crate::fixtures::{V1, V2};
use remora_core::FieldKey;
use remora_matcher::pipeline::RemapContext;
use remora_matcher::{FieldMapping, FixedClassPairing, MethodMapping, RemapConfig};

#[test]
fn counter_follows_the_method_mapping() {
    let (old, new) = (V1.artifact(), V2.artifact());
    let config = RemapConfig::default();
    let ctx = RemapContext::new(&old, &new, &config).unwrap();
    let pairing = ctx.structural_pairing();
    let methods = ctx.refine(&ctx.candidates(&pairing)).unwrap().mapping;

    let fields = ctx.fields(&methods, &pairing);
    assert_eq!(
        fields,
        FieldMapping::from([(
            FieldKey::new("client", V1.counter, "I"),
            FieldKey::new("client", V2.counter, "I"),
        )])
    );
}

#[test]
fn unpaired_owners_lean_on_the_access_profile() {
    let (old, new) = (V1.artifact(), V2.artifact());

    // identical profiles on both sides carry the counter over the default threshold
    let config = RemapConfig::default();
    let ctx = RemapContext::new(&old, &new, &config).unwrap();
    let profile = ctx.old_analysis.usage.profile(&FieldKey::new("client", V1.counter, "I"));
    assert_eq!(profile, ctx.new_analysis.usage.profile(&FieldKey::new("client", V2.counter, "I")));
    let fields = ctx.fields(&MethodMapping::new(), &FixedClassPairing::new());
    assert_eq!(fields.len(), 1);

    // but not over the strict one
    let strict = RemapConfig::strict();
    let ctx = RemapContext::new(&old, &new, &strict).unwrap();
    assert!(ctx.fields(&MethodMapping::new(), &FixedClassPairing::new()).is_empty());
}
