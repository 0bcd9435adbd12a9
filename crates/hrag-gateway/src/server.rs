use std::net::SocketAddr;
use std::sync::Arc;

use hrag_core::rag::RagPipeline;
use hrag_core::research::{ResearchGraph, WebSearch};
use hrag_llm::{LlmProvider, Reranker};
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;

pub(crate) struct AppState<P: LlmProvider, R: Reranker, S: WebSearch> {
    pub rag: Arc<RagPipeline<P, R>>,
    pub research: Arc<ResearchGraph<P, S>>,
}

impl<P: LlmProvider, R: Reranker, S: WebSearch> Clone for AppState<P, R, S> {
    fn clone(&self) -> Self {
        Self {
            rag: Arc::clone(&self.rag),
            research: Arc::clone(&self.research),
        }
    }
}

pub struct GatewayServer<P: LlmProvider, R: Reranker, S: WebSearch> {
    addr: SocketAddr,
    auth_token: Option<String>,
    rate_limit: u32,
    max_body_size: usize,
    state: AppState<P, R, S>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<P, R, S> GatewayServer<P, R, S>
where
    P: LlmProvider + 'static,
    R: Reranker + 'static,
    S: WebSearch + 'static,
{
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        rag: Arc<RagPipeline<P, R>>,
        research: Arc<ResearchGraph<P, S>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        if bind == "0.0.0.0" {
            tracing::warn!("gateway binding to 0.0.0.0, reachable from other hosts");
        }

        Self {
            addr,
            auth_token: None,
            rate_limit: 120,
            max_body_size: 1_048_576,
            state: AppState { rag, research },
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.rate_limit = limit;
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the HTTP gateway server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let router = build_router(
            self.state,
            self.auth_token,
            self.rate_limit,
            self.max_body_size,
        );

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!("gateway listening on {}", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
            tracing::info!("gateway shutting down");
        })
        .await
        .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}
