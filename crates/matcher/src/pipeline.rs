/// Module for running a complete remap between two artifact versions.
///
/// Each artifact is analyzed once into an [`ArtifactAnalysis`] (liveness, opaque predicates,
/// normalized methods, call graph, field usage, multipliers). A [`RemapContext`] owns both
/// analyses for the duration of one run; nothing is shared between runs, so several remaps may
/// execute side by side.
///
/// Stage order: class pairing → candidate scoring → seed mapping → refinement → field
/// matching → scaffold and carry-forward.
///
/// # Usage
/// ```rust,ignore
/// let outcome = run(&old, &new, Some(&old_mapping), None, &RemapConfig::default())?;
/// println!("{}", outcome.render());
/// save_mapping("new.json", &outcome.mapping)?;
/// ```
use crate::carry::{build_scaffold, carry_forward, Annotations, CarryReport, Resolution};
use crate::classes::{ClassPairing, FixedClassPairing, StructuralClassMatcher};
use crate::config::RemapConfig;
use crate::fields::{match_fields, FieldMapping, FieldSide};
use crate::refine::{refine, seed_mapping, MethodMapping, RefineReport};
use crate::{scorer, Match};
use remora_analysis::{
    multiplier, normalize, opaque, CallGraph, FieldUsage, MultiplierPair, NormalizedMethod,
    OpaqueAnalysis, ReachabilityScanner,
};
use remora_core::mapping::MappedClass;
use remora_core::{Artifact, FieldKey, MethodKey};
use remora_utils::errors::RemapError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info};

/// Everything derived from one artifact.
#[derive(Debug, Clone)]
pub struct ArtifactAnalysis {
    pub live: BTreeSet<MethodKey>,
    pub opaque: OpaqueAnalysis,
    pub normalized: BTreeMap<MethodKey, NormalizedMethod>,
    pub graph: CallGraph,
    pub usage: FieldUsage,
    pub multipliers: BTreeMap<FieldKey, MultiplierPair>,
}

impl ArtifactAnalysis {
    pub fn analyze(artifact: &Artifact, config: &RemapConfig) -> Self {
        let live = ReachabilityScanner::new(artifact, &config.reachability).scan();
        let opaque = opaque::analyze(artifact, &live);
        let normalized = if config.scoring.elide_opaque_parameters {
            normalize::normalize_all(artifact, &live, &opaque.opaque_params)
        } else {
            normalize::normalize_all(artifact, &live, &BTreeMap::new())
        };
        let graph = CallGraph::extract(artifact, &live);
        let usage = FieldUsage::index(artifact, &live);
        let fields: BTreeSet<FieldKey> = artifact.fields().map(|(key, _)| key).collect();
        let multipliers = multiplier::scan(artifact, &fields);
        Self {
            live,
            opaque,
            normalized,
            graph,
            usage,
            multipliers,
        }
    }

    fn field_side<'a>(&'a self, artifact: &'a Artifact) -> FieldSide<'a> {
        FieldSide {
            artifact,
            usage: &self.usage,
        }
    }
}

/// Per-run state: both artifacts, their analyses and the validated configuration.
#[derive(Debug)]
pub struct RemapContext<'a> {
    pub old: &'a Artifact,
    pub new: &'a Artifact,
    pub config: &'a RemapConfig,
    pub old_analysis: ArtifactAnalysis,
    pub new_analysis: ArtifactAnalysis,
}

impl<'a> RemapContext<'a> {
    pub fn new(
        old: &'a Artifact,
        new: &'a Artifact,
        config: &'a RemapConfig,
    ) -> Result<Self, RemapError> {
        config.validate()?;
        let (old_analysis, new_analysis) = rayon::join(
            || ArtifactAnalysis::analyze(old, config),
            || ArtifactAnalysis::analyze(new, config),
        );
        info!(
            "{:>14} {} old / {} new live methods",
            "reachability",
            old_analysis.live.len(),
            new_analysis.live.len()
        );
        Ok(Self {
            old,
            new,
            config,
            old_analysis,
            new_analysis,
        })
    }

    /// Structural class pairing under the configured threshold.
    pub fn structural_pairing(&self) -> FixedClassPairing {
        StructuralClassMatcher::new(
            self.config.scoring.class_threshold,
            self.config.reachability.max_obfuscated_name_len,
        )
        .pair_artifacts(self.old, self.new)
    }

    /// Scored method candidates under `pairing`.
    pub fn candidates(&self, pairing: &dyn ClassPairing) -> Vec<Match<MethodKey>> {
        scorer::match_all(
            &self.old_analysis.normalized,
            &self.new_analysis.normalized,
            pairing,
            &self.config.scoring,
        )
    }

    /// Seeds and refines `candidates` over the two call graphs.
    pub fn refine(&self, candidates: &[Match<MethodKey>]) -> Result<RefineReport, RemapError> {
        let seed = seed_mapping(candidates, self.config.refine.seed_threshold);
        debug!("seed mapping: {} pairs", seed.len());
        refine(
            candidates,
            &self.old_analysis.graph,
            &self.new_analysis.graph,
            &seed,
            &self.config.refine,
        )
        .map_err(RemapError::from)
    }

    /// Field mapping driven by a resolved method mapping.
    pub fn fields(&self, methods: &MethodMapping, pairing: &dyn ClassPairing) -> FieldMapping {
        match_fields(
            self.old_analysis.field_side(self.old),
            self.new_analysis.field_side(self.new),
            methods,
            pairing,
            &self.config.fields,
        )
    }
}

/// Results of one remap.
#[derive(Debug, Clone)]
pub struct RemapOutcome {
    pub old_live: usize,
    pub new_live: usize,
    /// Old classes with a paired new class
    pub class_pairs: usize,
    pub candidates: Vec<Match<MethodKey>>,
    pub refined: RefineReport,
    pub fields: FieldMapping,
    /// Scaffold of the new artifact with every name that could be carried
    pub mapping: Vec<MappedClass>,
    /// Present when an existing mapping was carried forward
    pub carry: Option<CarryReport>,
}

/// One resolved pair in a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairRecord {
    pub old: String,
    pub new: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Machine-readable summary of a [`RemapOutcome`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemapSummary {
    pub old_live_methods: usize,
    pub new_live_methods: usize,
    pub class_pairs: usize,
    pub candidates: usize,
    pub rounds: usize,
    pub converged: bool,
    pub collisions_dropped: usize,
    pub reassigned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carry: Option<CarryReport>,
    pub methods: Vec<PairRecord>,
    pub fields: Vec<PairRecord>,
}

impl RemapOutcome {
    pub fn summary(&self) -> RemapSummary {
        let methods = self
            .refined
            .mapping
            .iter()
            .map(|(old, new)| PairRecord {
                old: old.to_string(),
                new: new.to_string(),
                score: self.refined.scores.get(old).copied(),
            })
            .collect();
        let fields = self
            .fields
            .iter()
            .map(|(old, new)| PairRecord {
                old: old.to_string(),
                new: new.to_string(),
                score: None,
            })
            .collect();
        RemapSummary {
            old_live_methods: self.old_live,
            new_live_methods: self.new_live,
            class_pairs: self.class_pairs,
            candidates: self.candidates.len(),
            rounds: self.refined.rounds,
            converged: self.refined.converged,
            collisions_dropped: self.refined.collisions_dropped,
            reassigned: self.refined.reassigned,
            carry: self.carry,
            methods,
            fields,
        }
    }

    /// Pretty-printed JSON of [`Self::summary`].
    pub fn report_json(&self) -> Result<String, RemapError> {
        Ok(serde_json::to_string_pretty(&self.summary())?)
    }

    /// Human-readable report.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RemapOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.refined;
        writeln!(f, "{:>14} {} old / {} new", "live", self.old_live, self.new_live)?;
        writeln!(f, "{:>14} {}", "class pairs", self.class_pairs)?;
        writeln!(f, "{:>14} {}", "candidates", self.candidates.len())?;
        writeln!(
            f,
            "{:>14} {} pairs, {} rounds{}",
            "methods",
            r.mapping.len(),
            r.rounds,
            if r.converged { "" } else { " (not converged)" }
        )?;
        writeln!(f, "{:>14} {}", "fields", self.fields.len())?;
        if let Some(c) = &self.carry {
            writeln!(
                f,
                "{:>14} {} classes, {} methods, {} fields ({} / {} / {} skipped)",
                "carried",
                c.classes_carried,
                c.methods_carried,
                c.fields_carried,
                c.classes_skipped,
                c.methods_skipped,
                c.fields_skipped
            )?;
        }
        writeln!(f)?;
        for (old, new) in &r.mapping {
            let score = r.scores.get(old).copied().unwrap_or_default();
            writeln!(f, "{old} -> {new} ({score:.3})")?;
        }
        for (old, new) in &self.fields {
            writeln!(f, "{old} -> {new}")?;
        }
        Ok(())
    }
}

/// Runs every stage on `old` → `new`.
///
/// `pairing` overrides the structural class pairing; `existing` is a mapping of the old
/// artifact whose names are carried onto the new one.
pub fn run(
    old: &Artifact,
    new: &Artifact,
    existing: Option<&[MappedClass]>,
    pairing: Option<&dyn ClassPairing>,
    config: &RemapConfig,
) -> Result<RemapOutcome, RemapError> {
    let ctx = RemapContext::new(old, new, config)?;

    let structural;
    let pairing: &dyn ClassPairing = match pairing {
        Some(p) => p,
        None => {
            structural = ctx.structural_pairing();
            &structural
        }
    };
    let class_pairs = old
        .classes
        .iter()
        .filter(|c| pairing.pair(&c.name).is_some())
        .count();
    info!("{:>14} {} of {} classes", "classes", class_pairs, old.classes.len());

    let candidates = ctx.candidates(pairing);
    info!("{:>14} {}", "candidates", candidates.len());

    let refined = ctx.refine(&candidates)?;
    info!(
        "{:>14} {} pairs in {} rounds",
        "methods",
        refined.mapping.len(),
        refined.rounds
    );

    let fields = ctx.fields(&refined.mapping, pairing);
    info!("{:>14} {}", "fields", fields.len());

    let na = &ctx.new_analysis;
    let scaffold = build_scaffold(
        new,
        &Annotations {
            live: &na.live,
            opaque: &na.opaque,
            multipliers: &na.multipliers,
        },
    );
    let (mapping, carry) = carry_forward(
        existing.unwrap_or(&[]),
        old,
        scaffold,
        &Resolution {
            pairing,
            methods: &refined.mapping,
            fields: &fields,
        },
    );

    Ok(RemapOutcome {
        old_live: ctx.old_analysis.live.len(),
        new_live: na.live.len(),
        class_pairs,
        candidates,
        refined,
        fields,
        mapping,
        carry: existing.map(|_| carry),
    })
}
