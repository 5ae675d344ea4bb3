use async_trait::async_trait;
use clap::Args;
use remora_analysis::{normalize::normalize_all, opaque, ReachabilityConfig, ReachabilityScanner};
use std::error::Error;
use std::path::PathBuf;

#[derive(Args)]
pub struct FingerprintArgs {
    /// Artifact to fingerprint
    pub artifact: PathBuf,
    /// Keep detected opaque parameters in the descriptor
    #[arg(long)]
    keep_opaque: bool,
}

#[async_trait]
impl super::Command for FingerprintArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let artifact = super::load(&self.artifact).await?;
        let keep_opaque = self.keep_opaque;

        let listing = tokio::task::spawn_blocking(move || {
            let config = ReachabilityConfig::default();
            let live = ReachabilityScanner::new(&artifact, &config).scan();
            let params = if keep_opaque {
                Default::default()
            } else {
                opaque::analyze(&artifact, &live).opaque_params
            };
            normalize_all(&artifact, &live, &params)
                .into_iter()
                .map(|(key, method)| format!("{}  {key}\n", method.fingerprint))
                .collect::<String>()
        })
        .await?;

        print!("{listing}");
        Ok(())
    }
}
