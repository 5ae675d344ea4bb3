use async_trait::async_trait;
use clap::Args;
use remora_analysis::{CallGraph, ReachabilityConfig, ReachabilityScanner};
use std::error::Error;
use std::path::PathBuf;

#[derive(Args)]
pub struct CallgraphArgs {
    /// Artifact to analyze
    pub artifact: PathBuf,
    /// Output file for Graphviz .dot (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[async_trait]
impl super::Command for CallgraphArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let artifact = super::load(&self.artifact).await?;

        let (dot, methods, edges) = tokio::task::spawn_blocking(move || {
            let config = ReachabilityConfig::default();
            let live = ReachabilityScanner::new(&artifact, &config).scan();
            let graph = CallGraph::extract(&artifact, &live);
            (graph.to_dot(), graph.method_count(), graph.edge_count())
        })
        .await?;
        tracing::info!("{:>14} {} methods, {} edges", "callgraph", methods, edges);

        if let Some(out_path) = self.output {
            tokio::fs::write(out_path, &dot).await?;
        } else {
            println!("{dot}");
        }
        Ok(())
    }
}
