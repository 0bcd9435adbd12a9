use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hrag_core::rag::RagError;
use hrag_core::research::ResearchError;
use hrag_memory::MemoryError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// Error returned from a route handler.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{message}")]
    Upstream {
        message: String,
        dependency: &'static str,
    },
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dependency: Option<&'static str>,
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn dependency(&self) -> Option<&'static str> {
        match self {
            Self::Upstream { dependency, .. } => Some(*dependency),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), dependency = ?self.dependency(), "{self}");
        } else {
            tracing::debug!(status = status.as_u16(), "{self}");
        }
        let message = self.to_string();
        let body = ErrorBody {
            error: &message,
            dependency: self.dependency(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RagError> for ApiError {
    fn from(e: RagError) -> Self {
        let message = e.to_string();
        if let Some(dependency) = e.dependency() {
            return Self::Upstream { message, dependency };
        }
        match e {
            RagError::InvalidInput(_) => Self::Unprocessable(message),
            RagError::Document(_) => Self::BadRequest(message),
            RagError::IngestInProgress => Self::Conflict(message),
            _ => Self::Internal(message),
        }
    }
}

impl From<ResearchError> for ApiError {
    fn from(e: ResearchError) -> Self {
        let message = e.to_string();
        match (e.dependency(), e) {
            (Some(dependency), _) => Self::Upstream { message, dependency },
            (None, ResearchError::InvalidInput(_)) => Self::Unprocessable(message),
            (None, _) => Self::Internal(message),
        }
    }
}

impl From<MemoryError> for ApiError {
    fn from(e: MemoryError) -> Self {
        Self::Upstream {
            message: format!("database error: {e}"),
            dependency: "database",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        if rejection.status() == StatusCode::UNPROCESSABLE_ENTITY {
            Self::Unprocessable(message)
        } else {
            Self::BadRequest(message)
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use hrag_core::pipeline::PipelineError;
    use hrag_core::research::SearchError;

    use super::*;

    #[test]
    fn ingest_in_progress_is_conflict() {
        assert_eq!(ApiError::from(RagError::IngestInProgress).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_query_is_unprocessable() {
        let err = ApiError::from(RagError::InvalidInput("query must not be empty".into()));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.dependency(), None);
    }

    #[test]
    fn catalog_failure_names_dependency() {
        let err = ApiError::from(RagError::Catalog(MemoryError::Other("locked".into())));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.dependency(), Some("catalog"));
    }

    #[test]
    fn research_search_failure_is_bad_gateway() {
        let err = ApiError::from(ResearchError::Node {
            node: "searcher",
            source: PipelineError::Search(SearchError::Status(503)),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.dependency(), Some("web_search"));
    }

    #[test]
    fn internal_error_is_500() {
        let err = ApiError::from(RagError::Internal("join failed".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
