//! Run configuration for a remap

use remora_analysis::ReachabilityConfig;
use remora_utils::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Complete configuration of one remap run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemapConfig {
    /// Which methods count as live
    pub reachability: ReachabilityConfig,

    /// Candidate generation and method scoring
    pub scoring: ScoringConfig,

    /// Call-graph refinement
    pub refine: RefineConfig,

    /// Field matching
    pub fields: FieldConfig,
}

/// Relative weights of the method score components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub descriptor: f64,
    pub invoked: f64,
    pub strings: f64,
    pub opcodes: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            descriptor: 1.0,
            invoked: 0.5,
            strings: 0.3,
            opcodes: 0.2,
        }
    }
}

/// Candidate scorer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Candidates kept per old method
    pub top_k: usize,
    /// Candidates scoring below this are dropped
    pub min_score: f64,
    /// Consider new methods outside the paired class
    pub cross_class_candidates: bool,
    /// Boost for candidates in the paired class when crossing classes
    pub class_weight: f64,
    /// Minimum structural similarity for a class pairing
    pub class_threshold: f64,
    /// Strip detected opaque parameters before fingerprinting
    pub elide_opaque_parameters: bool,
    pub weights: ScoreWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            top_k: 50,
            min_score: 0.0,
            cross_class_candidates: false,
            class_weight: 0.5,
            class_threshold: 0.3,
            elide_opaque_parameters: true,
            weights: ScoreWeights::default(),
        }
    }
}

/// Iterative refiner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Hard cap on refinement rounds
    pub max_iterations: usize,
    /// Share of the blended score taken from call-graph agreement
    pub neighbor_weight: f64,
    /// Minimum base score for a seed pair
    pub seed_threshold: f64,
    /// Give collision losers their next free candidate instead of dropping them
    pub reassign_collision_losers: bool,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            neighbor_weight: 0.3,
            seed_threshold: 0.1,
            reassign_collision_losers: false,
        }
    }
}

/// Field matcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Candidates kept per old field
    pub top_k: usize,
    /// Minimum score for a selected field pair
    pub field_threshold: f64,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            field_threshold: 0.25,
        }
    }
}

impl RemapConfig {
    /// Fewer, better-supported pairs
    pub fn strict() -> Self {
        Self {
            reachability: ReachabilityConfig::default(),
            scoring: ScoringConfig {
                top_k: 10,
                min_score: 0.2,
                class_threshold: 0.5, // only clear class pairings
                ..ScoringConfig::default()
            },
            refine: RefineConfig {
                max_iterations: 20,
                seed_threshold: 0.3,
                ..RefineConfig::default()
            },
            fields: FieldConfig {
                top_k: 5,
                field_threshold: 0.4,
            },
        }
    }

    /// More pairs at the cost of precision
    pub fn lenient() -> Self {
        Self {
            reachability: ReachabilityConfig::default(),
            scoring: ScoringConfig {
                top_k: 100,
                cross_class_candidates: true,
                class_threshold: 0.2,
                ..ScoringConfig::default()
            },
            refine: RefineConfig {
                seed_threshold: 0.05,
                reassign_collision_losers: true,
                ..RefineConfig::default()
            },
            fields: FieldConfig {
                top_k: 20,
                field_threshold: 0.15,
            },
        }
    }

    /// Reads a JSON configuration; absent keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = [
            ("scoring.min_score", self.scoring.min_score),
            ("scoring.class_weight", self.scoring.class_weight),
            ("scoring.class_threshold", self.scoring.class_threshold),
            ("refine.neighbor_weight", self.refine.neighbor_weight),
            ("refine.seed_threshold", self.refine.seed_threshold),
            ("fields.field_threshold", self.fields.field_threshold),
        ];
        for (name, value) in unit {
            check_range(name, value, 0.0, 1.0)?;
        }

        let w = &self.scoring.weights;
        for (name, value) in [
            ("scoring.weights.descriptor", w.descriptor),
            ("scoring.weights.invoked", w.invoked),
            ("scoring.weights.strings", w.strings),
            ("scoring.weights.opcodes", w.opcodes),
        ] {
            check_range(name, value, 0.0, f64::MAX)?;
        }
        if w.descriptor + w.invoked + w.strings + w.opcodes <= 0.0 {
            return Err(ConfigError::Zero("scoring.weights"));
        }

        if self.scoring.top_k == 0 {
            return Err(ConfigError::Zero("scoring.top_k"));
        }
        if self.fields.top_k == 0 {
            return Err(ConfigError::Zero("fields.top_k"));
        }
        Ok(())
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    // NaN fails both comparisons
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}
