mod docx;
mod html;
mod json;
#[cfg(feature = "pdf")]
mod pdf;
mod text;

use std::path::Path;

pub use docx::{DocxLoader, extract_docx_text};
pub use html::{HtmlLoader, extract_html_text};
pub use json::JsonLoader;
#[cfg(feature = "pdf")]
pub use pdf::PdfLoader;
pub use text::TextLoader;

use super::DocumentError;

#[cfg(test)]
pub(crate) use docx::tests::write_docx;

/// Name recorded as a chunk's `source`: the file name, or the full path when
/// it has none.
pub(crate) fn source_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    )
}

pub(crate) async fn check_size(path: &Path, max_size: u64) -> Result<(), DocumentError> {
    let meta = tokio::fs::metadata(path).await?;
    if meta.len() > max_size {
        return Err(DocumentError::FileTooLarge(meta.len()));
    }
    Ok(())
}

pub(crate) async fn read_text(path: &Path, max_size: u64) -> Result<String, DocumentError> {
    check_size(path, max_size).await?;
    Ok(tokio::fs::read_to_string(path).await?)
}
