//! Searcher, analyst and writer nodes. Each reads the shared state and fills
//! in one field.

use std::sync::Arc;
use std::time::Duration;

use hrag_llm::LlmProvider;
use hrag_llm::provider::Message;
use hrag_memory::SqliteStore;
use serde::Serialize;

use super::knowledge::KnowledgeStore;
use super::search::WebSearch;
use crate::pipeline::{PipelineError, Step};

/// Characters of each page included in the searcher's prompt.
pub const PROMPT_PAGE_CHARS: usize = 3000;
/// Characters of each related document included in the analyst's prompt.
pub const RELATED_DOC_CHARS: usize = 500;
/// Related documents the analyst pulls from the knowledge store.
pub const RELATED_DOC_LIMIT: usize = 3;

const SEARCHER_PROMPT: &str = "\
You are a research assistant that gathers current, reliable information from the web \
on a given topic.
1. Extract key facts, statistics and expert opinions.
2. Cover multiple perspectives and note where sources disagree.
3. Organize the findings in a clear structure.
4. List the references and sources you used.";

const ANALYST_PROMPT: &str = "\
You are an analyst who turns research findings into actionable insight.
1. Identify key themes, trends and contradictions.
2. Highlight the most important findings and what they imply.
3. Point out gaps that need further investigation.
4. Present the analysis in a structured, readable format.
5. Only cite links that appear in the material provided. Never invent links.
6. If no links were provided, leave out the references section.";

const WRITER_PROMPT: &str = "\
You are a technical writer. Produce the final report in clean Markdown.

Formatting:
- Start with a `# Title`, followed by a short **Executive Summary** paragraph.
- Use `##` headings for major sections and `###` for sub-sections.
- Use **bold** for key terms and figures, `-` bullets for findings and `1.` lists for ranked or sequential items.
- Use tables to compare data and `>` blockquotes for critical takeaways.
- Finish with `## Conclusion & Recommendations` as actionable bullets.
- Add `## References & Sources` as `- [Title](URL)` only when the analysis contains real links. Never invent links.

Content:
- Be comprehensive but concise, with no filler.
- Every section needs specific facts, numbers or insights.
- Group related findings under clear thematic headings and surface opposing viewpoints.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResearchState {
    pub topic: String,
    pub research_findings: String,
    pub analysis: String,
    pub report: String,
}

impl ResearchState {
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }
}

/// Node outputs cached in the `SQLite` store with a fixed time-to-live.
#[derive(Debug, Clone)]
pub struct NodeCache {
    store: SqliteStore,
    ttl: Duration,
}

impl NodeCache {
    #[must_use]
    pub fn new(store: SqliteStore, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, PipelineError> {
        Ok(self.store.cache_get(key).await?)
    }

    /// Store `value` and drop every entry whose time-to-live has passed.
    async fn put(&self, key: &str, value: &str) -> Result<(), PipelineError> {
        self.store.cache_put(key, value, self.ttl).await?;
        let purged = self.store.cache_purge_expired().await?;
        if purged > 0 {
            tracing::debug!(purged, "purged expired node cache entries");
        }
        Ok(())
    }
}

async fn ask<P: LlmProvider>(chat: &P, system: &str, user: String) -> Result<String, PipelineError> {
    chat.chat(&[Message::system(system), Message::user(user)])
        .await
        .map_err(PipelineError::Chat)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub struct Searcher<P: LlmProvider, S: WebSearch> {
    chat: Arc<P>,
    search: Arc<S>,
    knowledge: Arc<KnowledgeStore<P>>,
    cache: NodeCache,
    result_limit: usize,
}

impl<P: LlmProvider, S: WebSearch> Searcher<P, S> {
    #[must_use]
    pub fn new(
        chat: Arc<P>,
        search: Arc<S>,
        knowledge: Arc<KnowledgeStore<P>>,
        cache: NodeCache,
        result_limit: usize,
    ) -> Self {
        Self {
            chat,
            search,
            knowledge,
            cache,
            result_limit,
        }
    }
}

impl<P: LlmProvider, S: WebSearch> Step for Searcher<P, S> {
    type Input = ResearchState;
    type Output = ResearchState;

    fn name(&self) -> &'static str {
        "searcher"
    }

    async fn run(&self, mut state: ResearchState) -> Result<ResearchState, PipelineError> {
        let cache_key = format!("research:{}", state.topic);
        if let Some(cached) = self.cache.get(&cache_key).await? {
            tracing::info!(topic = %state.topic, "using cached research findings");
            state.research_findings = cached;
            return Ok(state);
        }

        let pages = self.search.search(&state.topic, self.result_limit).await?;
        self.knowledge.store(&pages).await?;

        let raw_findings = pages
            .iter()
            .map(|p| {
                let title = if p.title.is_empty() { "Source" } else { p.title.as_str() };
                format!("### [{title}]({})\n{}", p.url, truncate(&p.content, PROMPT_PAGE_CHARS))
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");
        let findings = ask(
            self.chat.as_ref(),
            SEARCHER_PROMPT,
            format!(
                "Topic: {}\n\nRaw web findings:\n{raw_findings}\n\n\
                 Synthesize these findings into a comprehensive research summary.",
                state.topic
            ),
        )
        .await?;

        self.cache.put(&cache_key, &findings).await?;
        state.research_findings = findings;
        Ok(state)
    }
}

pub struct Analyst<P: LlmProvider> {
    chat: Arc<P>,
    knowledge: Arc<KnowledgeStore<P>>,
    cache: NodeCache,
}

impl<P: LlmProvider> Analyst<P> {
    #[must_use]
    pub fn new(chat: Arc<P>, knowledge: Arc<KnowledgeStore<P>>, cache: NodeCache) -> Self {
        Self {
            chat,
            knowledge,
            cache,
        }
    }
}

impl<P: LlmProvider> Step for Analyst<P> {
    type Input = ResearchState;
    type Output = ResearchState;

    fn name(&self) -> &'static str {
        "analyst"
    }

    async fn run(&self, mut state: ResearchState) -> Result<ResearchState, PipelineError> {
        let related = self.knowledge.related(&state.topic, RELATED_DOC_LIMIT).await?;
        let extra_context = related
            .iter()
            .map(|hit| format!("- {}: {}", hit.title, truncate(&hit.content, RELATED_DOC_CHARS)))
            .collect::<Vec<_>>()
            .join("\n");

        let analysis = ask(
            self.chat.as_ref(),
            ANALYST_PROMPT,
            format!(
                "Topic: {}\n\nResearch Findings:\n{}\n\n\
                 Additional Context from Knowledge Base:\n{extra_context}\n\n\
                 Provide a thorough analysis.",
                state.topic, state.research_findings
            ),
        )
        .await?;

        self.cache
            .put(&format!("analysis:{}", state.topic), &analysis)
            .await?;
        state.analysis = analysis;
        Ok(state)
    }
}

pub struct Writer<P: LlmProvider> {
    chat: Arc<P>,
}

impl<P: LlmProvider> Writer<P> {
    #[must_use]
    pub fn new(chat: Arc<P>) -> Self {
        Self { chat }
    }
}

impl<P: LlmProvider> Step for Writer<P> {
    type Input = ResearchState;
    type Output = ResearchState;

    fn name(&self) -> &'static str {
        "writer"
    }

    async fn run(&self, mut state: ResearchState) -> Result<ResearchState, PipelineError> {
        state.report = ask(
            self.chat.as_ref(),
            WRITER_PROMPT,
            format!(
                "Topic: {}\n\nAnalysis:\n{}\n\n\
                 Write a comprehensive, well-structured research report.",
                state.topic, state.analysis
            ),
        )
        .await?;
        Ok(state)
    }
}
