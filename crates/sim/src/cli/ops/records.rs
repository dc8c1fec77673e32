use std::path::PathBuf;

use clap::Args;

use crate::records::synthesize;

#[derive(Args, Debug, Clone)]
pub struct Records {
    /// Number of records to generate (defaults to the configured count)
    #[arg(long)]
    pub count: Option<usize>,

    /// Generator seed (defaults to the configured seed)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write the JSON here instead of printing it
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("config error: {0}")]
    State(#[from] crate::config::StateError),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Records {
    type Error = RecordsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = ctx.state()?.config;
        let count = self.count.unwrap_or(config.record_count);
        let records = synthesize(count, self.seed.unwrap_or(config.seed));
        let json = serde_json::to_string_pretty(&records)?;

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, json).await?;
                Ok(format!("Wrote {} records to {}", count, path.display()))
            }
            None => Ok(json),
        }
    }
}
