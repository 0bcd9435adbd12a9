//! Configuration, the retrieval-augmented query pipeline and the research
//! agent graph.

pub mod bootstrap;
pub mod config;
pub mod pipeline;
pub mod rag;
pub mod research;

pub use config::Config;
