use async_trait::async_trait;
use clap::Subcommand;
use remora_core::artifact::{parse_artifact, Artifact};
use remora_utils::errors::ArtifactError;
use std::error::Error;
use std::path::Path;

pub mod callgraph;
pub mod fingerprint;
pub mod remap;

#[derive(Subcommand)]
pub enum Cmd {
    /// Match an old artifact against a new one and carry its mapping forward
    Remap(remap::RemapArgs),

    /// Print the fingerprint of every live method
    Fingerprint(fingerprint::FingerprintArgs),

    /// Write the live call graph as Graphviz DOT
    Callgraph(callgraph::CallgraphArgs),
}

#[async_trait]
pub trait Command {
    async fn execute(self) -> Result<(), Box<dyn Error>>;
}

#[async_trait]
impl Command for Cmd {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        match self {
            Cmd::Remap(args) => args.execute().await,
            Cmd::Fingerprint(args) => args.execute().await,
            Cmd::Callgraph(args) => args.execute().await,
        }
    }
}

/// Reads an artifact file and parses it off the async runtime.
pub(crate) async fn load(path: &Path) -> Result<Artifact, Box<dyn Error>> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ArtifactError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;
    let (artifact, report) = tokio::task::spawn_blocking(move || parse_artifact(&bytes)).await??;
    tracing::debug!(
        "{:>14} {} classes, {} bytes, sha256 {} ({} members skipped)",
        "loaded",
        artifact.classes.len(),
        report.byte_length,
        report.sha256,
        report.skipped.len()
    );
    Ok(artifact)
}
