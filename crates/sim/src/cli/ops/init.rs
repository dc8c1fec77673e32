use clap::Args;

use crate::config::{SimState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    State(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = SimState::init(ctx.config_path.clone(), None, self.force)?;
        tracing::info!("wrote default config to {}", state.config_path.display());
        Ok(format!(
            "Initialized config at {}",
            state.config_path.display()
        ))
    }
}
