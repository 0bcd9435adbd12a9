use std::path::Path;
use std::pin::Pin;

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader};
use super::{read_text, source_name};

/// Loads a JSON file and re-serializes it pretty-printed so keys and values
/// split on line boundaries.
pub struct JsonLoader {
    pub max_file_size: u64,
}

impl Default for JsonLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for JsonLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Document, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let raw = read_text(&path, max_size).await?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            let content = serde_json::to_string_pretty(&value)?;
            Ok(Document::new(source_name(&path), "application/json", content))
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["json"]
    }
}
