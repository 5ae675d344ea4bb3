/// Module for the `remap` subcommand, which matches an old artifact against a new one.
///
/// The pipeline runs on a blocking thread; artifacts, mappings, the configuration and every
/// output are read and written through `tokio::fs`. Without `-o` only the report is printed.
use async_trait::async_trait;
use clap::Args;
use remora_core::mapping::{mapping_from_str, mapping_to_string};
use remora_matcher::{run, RemapConfig};
use remora_utils::errors::{ConfigError, MappingError};
use std::error::Error;
use std::path::{Path, PathBuf};

/// Arguments for the `remap` subcommand.
#[derive(Args)]
pub struct RemapArgs {
    /// Artifact the existing mapping describes
    pub old: PathBuf,
    /// Artifact to recover names for
    pub new: PathBuf,
    /// Mapping of the old artifact to carry forward
    #[arg(long)]
    mappings: Option<PathBuf>,
    /// Where to write the new mapping
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// JSON configuration file; absent keys keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Path to emit the machine-readable report as JSON
    #[arg(long)]
    emit: Option<PathBuf>,
    /// Candidates kept per old method
    #[arg(long)]
    top_k: Option<usize>,
    /// Cap on refinement rounds
    #[arg(long)]
    max_iterations: Option<usize>,
    /// Share of the refined score taken from call-graph agreement
    #[arg(long)]
    neighbor_weight: Option<f64>,
}

impl RemapArgs {
    async fn config(&self) -> Result<RemapConfig, Box<dyn Error>> {
        let mut config: RemapConfig = match &self.config {
            Some(path) => {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| ConfigError::FileRead {
                        path: path.display().to_string(),
                        source: e,
                    })?;
                serde_json::from_str(&json).map_err(ConfigError::from)?
            }
            None => RemapConfig::default(),
        };
        if let Some(k) = self.top_k {
            config.scoring.top_k = k;
        }
        if let Some(n) = self.max_iterations {
            config.refine.max_iterations = n;
        }
        if let Some(w) = self.neighbor_weight {
            config.refine.neighbor_weight = w;
        }
        config.validate()?;
        Ok(config)
    }
}

async fn write(path: &Path, contents: String) -> Result<(), MappingError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| MappingError::FileWrite {
            path: path.display().to_string(),
            source: e,
        })
}

#[async_trait]
impl super::Command for RemapArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let config = self.config().await?;
        let old = super::load(&self.old).await?;
        let new = super::load(&self.new).await?;

        let existing = match &self.mappings {
            Some(path) => {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| MappingError::FileRead {
                        path: path.display().to_string(),
                        source: e,
                    })?;
                Some(mapping_from_str(&json)?)
            }
            None => None,
        };

        let outcome = tokio::task::spawn_blocking(move || {
            run(&old, &new, existing.as_deref(), None, &config)
        })
        .await??;

        if let Some(path) = &self.emit {
            write(path, outcome.report_json()?).await?;
            println!("Wrote report to {}", path.display());
        }
        if let Some(path) = &self.output {
            write(path, mapping_to_string(&outcome.mapping)?).await?;
            println!("Wrote mapping to {}", path.display());
        }
        print!("{}", outcome.render());
        Ok(())
    }
}
