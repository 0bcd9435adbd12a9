//! Query stages: retrieve, rerank, generate.

use std::sync::Arc;

use hrag_index::{FusedResult, HybridRetriever, RerankStage, RerankedResult};
use hrag_llm::{LlmProvider, Reranker};

use super::generator::Generator;
use super::types::{QueryResponse, SourceDocument};
use crate::pipeline::{PipelineError, Step};

#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub query: String,
    pub top_k: usize,
}

#[derive(Debug)]
pub struct Retrieved {
    pub plan: QueryPlan,
    pub candidates: Vec<FusedResult>,
}

#[derive(Debug)]
pub struct Reranked {
    pub query: String,
    pub retrieval_count: usize,
    pub results: Vec<RerankedResult>,
}

pub struct RetrieveStep<P: LlmProvider> {
    retriever: Arc<HybridRetriever<P>>,
}

impl<P: LlmProvider> RetrieveStep<P> {
    #[must_use]
    pub fn new(retriever: Arc<HybridRetriever<P>>) -> Self {
        Self { retriever }
    }
}

impl<P: LlmProvider> Step for RetrieveStep<P> {
    type Input = QueryPlan;
    type Output = Retrieved;

    fn name(&self) -> &'static str {
        "retrieve"
    }

    async fn run(&self, plan: QueryPlan) -> Result<Retrieved, PipelineError> {
        let retrieval = self.retriever.retrieve(&plan.query).await?;
        tracing::info!(
            dense = retrieval.dense_hits,
            sparse = retrieval.sparse_hits,
            fused = retrieval.fused.len(),
            "retrieved candidates"
        );
        Ok(Retrieved {
            plan,
            candidates: retrieval.fused,
        })
    }
}

pub struct RerankStep<R: Reranker> {
    stage: RerankStage<R>,
}

impl<R: Reranker> RerankStep<R> {
    #[must_use]
    pub fn new(reranker: Arc<R>) -> Self {
        Self {
            stage: RerankStage::new(reranker),
        }
    }
}

impl<R: Reranker> Step for RerankStep<R> {
    type Input = Retrieved;
    type Output = Reranked;

    fn name(&self) -> &'static str {
        "rerank"
    }

    async fn run(&self, input: Retrieved) -> Result<Reranked, PipelineError> {
        let results = self
            .stage
            .rerank(&input.plan.query, &input.candidates, input.plan.top_k)
            .await?;
        Ok(Reranked {
            query: input.plan.query,
            retrieval_count: input.candidates.len(),
            results,
        })
    }
}

pub struct GenerateStep<P: LlmProvider> {
    generator: Generator<P>,
}

impl<P: LlmProvider> GenerateStep<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            generator: Generator::new(provider),
        }
    }
}

impl<P: LlmProvider> Step for GenerateStep<P> {
    type Input = Reranked;
    type Output = QueryResponse;

    fn name(&self) -> &'static str {
        "generate"
    }

    async fn run(&self, input: Reranked) -> Result<QueryResponse, PipelineError> {
        let answer = self
            .generator
            .generate(&input.query, &input.results)
            .await
            .map_err(PipelineError::Chat)?;
        Ok(QueryResponse {
            query: input.query,
            answer,
            sources: input.results.iter().map(SourceDocument::from).collect(),
            retrieval_count: input.retrieval_count,
        })
    }
}
