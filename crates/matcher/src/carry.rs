/// Module for carrying a human-named mapping from an old artifact onto a new one.
///
/// A scaffold lists every class of the new artifact with its live methods and all fields,
/// annotated with opaque-predicate passing values and field multipliers but with no human
/// names. Carrying forward walks the old mapping and copies every name it can resolve through
/// the class pairing and the method and field mappings; whatever cannot be resolved is counted
/// in the [`CarryReport`] and left out.
///
/// # Usage
/// ```rust,ignore
/// let scaffold = build_scaffold(&new, &annotations);
/// let (mapping, report) = carry_forward(&old_mapping, &old, scaffold, &resolution);
/// save_mapping("new.json", &mapping)?;
/// ```
use crate::classes::ClassPairing;
use crate::fields::FieldMapping;
use crate::refine::MethodMapping;
use indexmap::IndexMap;
use remora_analysis::{MultiplierPair, OpaqueAnalysis};
use remora_core::mapping::{MappedClass, MappedField, MappedMethod};
use remora_core::{Artifact, FieldKey, MethodKey};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Per-member facts of the new artifact written into the scaffold.
#[derive(Debug, Clone, Copy)]
pub struct Annotations<'a> {
    pub live: &'a BTreeSet<MethodKey>,
    pub opaque: &'a OpaqueAnalysis,
    pub multipliers: &'a BTreeMap<FieldKey, MultiplierPair>,
}

/// How old names resolve to new members.
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
    pub pairing: &'a dyn ClassPairing,
    pub methods: &'a MethodMapping,
    pub fields: &'a FieldMapping,
}

/// Counts of what was carried and what was not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarryReport {
    pub classes_carried: usize,
    /// Old records naming a class the old artifact does not have
    pub classes_skipped: usize,
    /// Old classes with no paired new class
    pub classes_unmatched: usize,
    pub methods_carried: usize,
    pub methods_skipped: usize,
    pub fields_carried: usize,
    pub fields_skipped: usize,
}

/// Class records for the new artifact keyed by obfuscated name, in declaration order.
pub type Scaffold = IndexMap<String, MappedClass>;

/// One unnamed record per new class holding its live methods and all of its fields.
pub fn build_scaffold(new: &Artifact, annotations: &Annotations<'_>) -> Scaffold {
    let mut scaffold = Scaffold::with_capacity(new.classes.len());
    for class in &new.classes {
        let methods = class
            .methods
            .iter()
            .filter_map(|m| {
                let key = m.key(&class.name);
                annotations.live.contains(&key).then(|| MappedMethod {
                    obfuscated_name: m.name.clone(),
                    owner_obfuscated_name: class.name.clone(),
                    descriptor: m.desc.clone(),
                    garbage_value: annotations.opaque.value(&key),
                    is_static: m.is_static,
                    ..MappedMethod::default()
                })
            })
            .collect();
        let fields = class
            .fields
            .iter()
            .map(|f| {
                let pair = annotations.multipliers.get(&f.key(&class.name));
                MappedField {
                    obfuscated_name: f.name.clone(),
                    owner_obfuscated_name: class.name.clone(),
                    descriptor: f.desc.clone(),
                    getter: pair.map(|p| p.decode),
                    setter: pair.map(|p| p.encode),
                    is_static: f.is_static,
                    ..MappedField::default()
                }
            })
            .collect();
        scaffold.insert(
            class.name.clone(),
            MappedClass {
                name: String::new(),
                obfuscated_name: class.name.clone(),
                fields,
                methods,
            },
        );
    }
    debug!(
        "scaffold: {} classes, {} methods, {} fields",
        scaffold.len(),
        scaffold.values().map(|c| c.methods.len()).sum::<usize>(),
        scaffold.values().map(|c| c.fields.len()).sum::<usize>()
    );
    scaffold
}

fn owner_of<'r>(record_owner: &'r str, class: &'r str) -> &'r str {
    if record_owner.is_empty() {
        class
    } else {
        record_owner
    }
}

/// Copies the names of `old_mapping` onto `scaffold`.
pub fn carry_forward(
    old_mapping: &[MappedClass],
    old: &Artifact,
    mut scaffold: Scaffold,
    resolution: &Resolution<'_>,
) -> (Vec<MappedClass>, CarryReport) {
    let mut report = CarryReport::default();

    for record in old_mapping {
        if old.class(&record.obfuscated_name).is_none() {
            warn!(
                "mapping names class {} which the old artifact does not contain",
                record.obfuscated_name
            );
            report.classes_skipped += 1;
            continue;
        }

        let paired = resolution.pairing.pair(&record.obfuscated_name);
        match paired.and_then(|pair| scaffold.get_index_of(&pair.new)) {
            Some(index) => {
                let target = &mut scaffold[index];
                if !record.name.is_empty() {
                    target.name = record.name.clone();
                    report.classes_carried += 1;
                }
            }
            None => report.classes_unmatched += 1,
        }

        for method in record.methods.iter().filter(|m| m.is_named()) {
            let key = MethodKey::new(
                owner_of(&method.owner_obfuscated_name, &record.obfuscated_name),
                &method.obfuscated_name,
                &method.descriptor,
            );
            let target = match resolution.methods.get(&key) {
                Some(new_key) => scaffold.get_mut(&new_key.owner).and_then(|c| {
                    c.methods
                        .iter_mut()
                        .find(|m| m.obfuscated_name == new_key.name && m.descriptor == new_key.desc)
                }),
                None => None,
            };
            match target {
                Some(target) => {
                    target.name = method.name.clone();
                    report.methods_carried += 1;
                }
                None => {
                    debug!("method {key} ({}) not carried", method.name);
                    report.methods_skipped += 1;
                }
            }
        }

        for field in record.fields.iter().filter(|f| f.is_named()) {
            let key = FieldKey::new(
                owner_of(&field.owner_obfuscated_name, &record.obfuscated_name),
                &field.obfuscated_name,
                &field.descriptor,
            );
            let target = match resolution.fields.get(&key) {
                Some(new_key) => scaffold.get_mut(&new_key.owner).and_then(|c| {
                    c.fields
                        .iter_mut()
                        .find(|f| f.obfuscated_name == new_key.name && f.descriptor == new_key.desc)
                }),
                None => None,
            };
            match target {
                Some(target) => {
                    target.name = field.name.clone();
                    report.fields_carried += 1;
                }
                None => {
                    debug!("field {key} ({}) not carried", field.name);
                    report.fields_skipped += 1;
                }
            }
        }
    }

    // owners follow whatever name their class ended up with
    for class in scaffold.values_mut() {
        for method in &mut class.methods {
            method.owner = class.name.clone();
        }
        for field in &mut class.fields {
            field.owner = class.name.clone();
        }
    }

    debug!(
        "carried {} classes, {} methods, {} fields ({} / {} / {} skipped, {} classes unmatched)",
        report.classes_carried,
        report.methods_carried,
        report.fields_carried,
        report.classes_skipped,
        report.methods_skipped,
        report.fields_skipped,
        report.classes_unmatched
    );
    (scaffold.into_values().collect(), report)
}
