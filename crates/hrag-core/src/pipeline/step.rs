use std::future::Future;

use super::PipelineError;

/// One stage of a [`Pipeline`](super::Pipeline).
pub trait Step: Send + Sync {
    type Input: Send;
    type Output: Send;

    /// Stage name recorded on the tracing span around each run.
    fn name(&self) -> &'static str;

    fn run(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = Result<Self::Output, PipelineError>> + Send;
}
