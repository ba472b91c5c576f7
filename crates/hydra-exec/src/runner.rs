use async_trait::async_trait;
use hydra_model::JobSpec;
use tokio_util::sync::CancellationToken;

use crate::error::ExecResult;

/// Executes the attempts of one job kind.
#[async_trait]
pub trait Runner: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn supports(&self, spec: &JobSpec) -> bool;

    /// Run one attempt to completion. Must return [`crate::ExecError::Cancelled`] promptly
    /// once `cancel` fires.
    async fn run(&self, spec: &JobSpec, cancel: CancellationToken) -> ExecResult<Option<Vec<u8>>>;
}
