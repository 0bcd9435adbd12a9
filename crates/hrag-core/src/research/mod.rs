//! Multi-step web research producing a persisted Markdown report.

pub mod graph;
pub mod knowledge;
pub mod nodes;
pub mod search;

pub use graph::{ResearchError, ResearchEvent, ResearchGraph, ResearchSettings};
pub use knowledge::KnowledgeStore;
pub use nodes::ResearchState;
pub use search::{DuckDuckGoSearch, SearchError, WebPage, WebSearch};
