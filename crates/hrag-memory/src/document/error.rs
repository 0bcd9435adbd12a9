#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTML parse error: {0}")]
    Html(String),

    #[error("DOCX error: {0}")]
    Docx(String),

    #[cfg(feature = "pdf")]
    #[error("PDF error: {0}")]
    Pdf(String),
}
