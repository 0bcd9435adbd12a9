//! HTTP gateway for the RAG pipeline and the research graph, with bearer auth,
//! per-IP rate limiting and a health endpoint.

mod error;
mod handlers;
mod router;
mod server;

pub use error::{ApiError, GatewayError};
pub use server::GatewayServer;
