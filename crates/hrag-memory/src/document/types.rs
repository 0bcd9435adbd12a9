#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// File name the document was loaded from.
    pub source: String,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    #[must_use]
    pub fn new(source: impl Into<String>, content_type: &str, content: String) -> Self {
        Self {
            content,
            metadata: DocumentMetadata {
                source: source.into(),
                content_type: content_type.to_owned(),
            },
        }
    }
}

/// Fixed-size window of a document. `position` counts from 0 within its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub source: String,
    pub position: usize,
}
