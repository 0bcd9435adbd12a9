use std::time::Instant;

use tracing::Instrument;

use super::PipelineError;
use super::step::Step;

pub trait Runnable: Send + Sync {
    type Input: Send;
    type Output: Send;

    fn run(
        &self,
        input: Self::Input,
    ) -> impl std::future::Future<Output = Result<Self::Output, PipelineError>> + Send;
}

async fn run_step<S: Step>(step: &S, input: S::Input) -> Result<S::Output, PipelineError> {
    let name = step.name();
    let started = Instant::now();
    let result = step
        .run(input)
        .instrument(tracing::debug_span!("pipeline_step", step = name))
        .await;
    match &result {
        Ok(_) => {
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            tracing::debug!(step = name, elapsed_ms, "step finished");
        }
        Err(e) => tracing::warn!(step = name, "step failed: {e}"),
    }
    result
}

pub struct Start<S>(S);

impl<S: Step> Runnable for Start<S> {
    type Input = S::Input;
    type Output = S::Output;

    async fn run(&self, input: Self::Input) -> Result<Self::Output, PipelineError> {
        run_step(&self.0, input).await
    }
}

pub struct Chain<Prev, Current> {
    prev: Prev,
    current: Current,
}

impl<Prev, Current> Runnable for Chain<Prev, Current>
where
    Prev: Runnable,
    Current: Step<Input = Prev::Output>,
{
    type Input = Prev::Input;
    type Output = Current::Output;

    async fn run(&self, input: Self::Input) -> Result<Self::Output, PipelineError> {
        let intermediate = self.prev.run(input).await?;
        run_step(&self.current, intermediate).await
    }
}

/// Statically typed chain of [`Step`]s; each step's output feeds the next.
pub struct Pipeline<S> {
    steps: S,
}

impl Pipeline<()> {
    #[must_use]
    pub fn start<S: Step>(step: S) -> Pipeline<Start<S>> {
        Pipeline { steps: Start(step) }
    }
}

impl<S> Pipeline<S> {
    #[must_use]
    pub fn step<T: Step>(self, step: T) -> Pipeline<Chain<S, T>> {
        Pipeline {
            steps: Chain {
                prev: self.steps,
                current: step,
            },
        }
    }
}

impl<S: Runnable> Pipeline<S> {
    /// # Errors
    ///
    /// Returns the error of the first failing step; later steps do not run.
    pub async fn run(&self, input: S::Input) -> Result<S::Output, PipelineError> {
        self.steps.run(input).await
    }
}
