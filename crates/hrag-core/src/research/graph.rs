use std::sync::Arc;
use std::time::Duration;

use hrag_llm::LlmProvider;
use hrag_memory::{MemoryError, ReportId, SqliteStore};
use tokio::sync::mpsc;
use tracing::Instrument;

use super::knowledge::KnowledgeStore;
use super::nodes::{Analyst, NodeCache, ResearchState, Searcher, Writer};
use super::search::WebSearch;
use crate::pipeline::{PipelineError, Step};

const EVENT_BUFFER: usize = 16;

/// Progress of one research run, streamed to the caller as NDJSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResearchEvent {
    NodeFinished {
        node: &'static str,
        field: &'static str,
        value: String,
    },
    Saved {
        report_id: ReportId,
    },
    Failed {
        error: String,
        dependency: Option<&'static str>,
    },
}

impl ResearchEvent {
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::NodeFinished { node, field, value } => {
                let mut data = serde_json::Map::new();
                data.insert((*field).to_owned(), serde_json::Value::String(value.clone()));
                serde_json::json!({ "node": node, "data": data })
            }
            Self::Saved { report_id } => serde_json::json!({ "node": "saved", "report_id": report_id }),
            Self::Failed { error, dependency } => {
                serde_json::json!({ "node": "error", "error": error, "dependency": dependency })
            }
        }
    }

    /// One JSON object terminated by a newline.
    #[must_use]
    pub fn to_ndjson(&self) -> String {
        format!("{}\n", self.to_json())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{node} failed: {source}")]
    Node {
        node: &'static str,
        #[source]
        source: PipelineError,
    },

    #[error("failed to save report: {0}")]
    Database(#[from] MemoryError),
}

impl ResearchError {
    #[must_use]
    pub fn dependency(&self) -> Option<&'static str> {
        match self {
            Self::InvalidInput(_) => None,
            Self::Node { source, .. } => source.dependency(),
            Self::Database(_) => Some("database"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResearchSettings {
    pub search_result_limit: usize,
    pub cache_ttl: Duration,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            search_result_limit: 5,
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

/// Searcher, then analyst, then writer, each feeding the next.
pub struct ResearchGraph<P: LlmProvider, S: WebSearch> {
    searcher: Searcher<P, S>,
    analyst: Analyst<P>,
    writer: Writer<P>,
    store: SqliteStore,
}

impl<P: LlmProvider, S: WebSearch> ResearchGraph<P, S> {
    #[must_use]
    pub fn new(
        chat: Arc<P>,
        search: S,
        knowledge: KnowledgeStore<P>,
        store: SqliteStore,
        settings: &ResearchSettings,
    ) -> Self {
        let knowledge = Arc::new(knowledge);
        let cache = NodeCache::new(store.clone(), settings.cache_ttl);
        Self {
            searcher: Searcher::new(
                Arc::clone(&chat),
                Arc::new(search),
                Arc::clone(&knowledge),
                cache.clone(),
                settings.search_result_limit,
            ),
            analyst: Analyst::new(Arc::clone(&chat), knowledge, cache),
            writer: Writer::new(chat),
            store,
        }
    }

    #[must_use]
    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Run all nodes for `topic`, sending an event after each one.
    ///
    /// Returns the saved report id, or `None` when the writer produced an
    /// empty report. A closed event channel does not stop the run.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::Node`] naming the failing node, or
    /// [`ResearchError::Database`] if the report cannot be saved.
    pub async fn run(
        &self,
        topic: &str,
        events: &mpsc::Sender<ResearchEvent>,
    ) -> Result<Option<ReportId>, ResearchError> {
        let state = ResearchState::new(topic);
        let state = run_node(&self.searcher, state).await?;
        emit(events, "searcher", "research_findings", &state.research_findings).await;
        let state = run_node(&self.analyst, state).await?;
        emit(events, "analyst", "analysis", &state.analysis).await;
        let state = run_node(&self.writer, state).await?;
        emit(events, "writer", "report", &state.report).await;

        if state.report.trim().is_empty() {
            tracing::warn!(topic, "writer produced an empty report, not saving");
            return Ok(None);
        }
        let report_id = self
            .store
            .save_report(topic, &state.report, "completed")
            .await?;
        tracing::info!(topic, %report_id, "research report saved");
        send(events, ResearchEvent::Saved { report_id }).await;
        Ok(Some(report_id))
    }
}

impl<P, S> ResearchGraph<P, S>
where
    P: LlmProvider + 'static,
    S: WebSearch + 'static,
{
    /// Spawn a run in the background and return its event stream.
    ///
    /// A failure is delivered as a final [`ResearchEvent::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::InvalidInput`] for an empty topic, before
    /// anything is spawned.
    pub fn start(self: Arc<Self>, topic: String) -> Result<mpsc::Receiver<ResearchEvent>, ResearchError> {
        let topic = topic.trim().to_owned();
        if topic.is_empty() {
            return Err(ResearchError::InvalidInput("topic must not be empty".into()));
        }
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let span = tracing::info_span!("research", topic = %topic);
        tokio::spawn(
            async move {
                if let Err(e) = self.run(&topic, &tx).await {
                    tracing::error!("research run failed: {e}");
                    send(
                        &tx,
                        ResearchEvent::Failed {
                            error: e.to_string(),
                            dependency: e.dependency(),
                        },
                    )
                    .await;
                }
            }
            .instrument(span),
        );
        Ok(rx)
    }
}

async fn run_node<N>(node: &N, state: ResearchState) -> Result<ResearchState, ResearchError>
where
    N: Step<Input = ResearchState, Output = ResearchState>,
{
    let name = node.name();
    tracing::info!(node = name, "node started");
    node.run(state)
        .instrument(tracing::info_span!("research_node", node = name))
        .await
        .map_err(|source| ResearchError::Node { node: name, source })
}

async fn emit(events: &mpsc::Sender<ResearchEvent>, node: &'static str, field: &'static str, value: &str) {
    send(
        events,
        ResearchEvent::NodeFinished {
            node,
            field,
            value: value.to_owned(),
        },
    )
    .await;
}

async fn send(events: &mpsc::Sender<ResearchEvent>, event: ResearchEvent) {
    if events.send(event).await.is_err() {
        tracing::debug!("research event receiver dropped");
    }
}
