use std::path::{Path, PathBuf};

use super::{
    Document, DocumentError, DocumentLoader, DocxLoader, HtmlLoader, JsonLoader, TextLoader,
};

fn loader_for(path: &Path, max_file_size: u64) -> Option<Box<dyn DocumentLoader>> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "txt" | "md" | "markdown" => Some(Box::new(TextLoader { max_file_size })),
        "json" => Some(Box::new(JsonLoader { max_file_size })),
        "html" | "htm" => Some(Box::new(HtmlLoader { max_file_size })),
        "docx" | "doc" => Some(Box::new(DocxLoader { max_file_size })),
        #[cfg(feature = "pdf")]
        "pdf" => Some(Box::new(super::PdfLoader { max_file_size })),
        _ => None,
    }
}

/// Load one file, choosing the loader by extension.
///
/// # Errors
///
/// Returns [`DocumentError::UnsupportedFormat`] for extensions without a loader,
/// or the loader's error.
pub async fn load_file(path: &Path, max_file_size: u64) -> Result<Document, DocumentError> {
    let loader = loader_for(path, max_file_size)
        .ok_or_else(|| DocumentError::UnsupportedFormat(path.display().to_string()))?;
    loader.load(path).await
}

/// Load every supported file at the top level of `dir`, in file-name order.
///
/// A missing directory yields no documents. Unsupported files and files that
/// fail to load are skipped with a warning.
///
/// # Errors
///
/// Returns an error only if an existing directory cannot be listed.
pub async fn load_directory(dir: &Path, max_file_size: u64) -> Result<Vec<Document>, DocumentError> {
    if !tokio::fs::try_exists(dir).await? {
        tracing::warn!(dir = %dir.display(), "data directory does not exist");
        return Ok(Vec::new());
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(loader) = loader_for(&path, max_file_size) else {
            tracing::warn!(file = %path.display(), "skipping unsupported file");
            continue;
        };
        match loader.load(&path).await {
            Ok(doc) => documents.push(doc),
            Err(e) => tracing::warn!(file = %path.display(), "failed to load document: {e}"),
        }
    }

    tracing::info!(dir = %dir.display(), documents = documents.len(), "loaded documents");
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DEFAULT_MAX_FILE_SIZE;
    use crate::document::loader::write_docx;

    #[tokio::test]
    async fn missing_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let docs = load_directory(&dir.path().join("absent"), DEFAULT_MAX_FILE_SIZE)
            .await
            .unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn loads_supported_files_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "# B").unwrap();
        std::fs::write(dir.path().join("a.txt"), "A").unwrap();
        std::fs::write(dir.path().join("c.json"), "[1, 2]").unwrap();
        std::fs::write(dir.path().join("slides.pptx"), "binary").unwrap();
        std::fs::write(dir.path().join("broken.docx"), "binary").unwrap();
        std::fs::write(dir.path().join("bad.json"), "{").unwrap();
        write_docx(
            &dir.path().join("d.docx"),
            "<w:p><w:r><w:t>Word notes</w:t></w:r></w:p>",
        );
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("deep.txt"), "deep").unwrap();

        let docs = load_directory(dir.path(), DEFAULT_MAX_FILE_SIZE)
            .await
            .unwrap();
        let sources: Vec<&str> = docs.iter().map(|d| d.metadata.source.as_str()).collect();
        assert_eq!(sources, ["a.txt", "b.md", "c.json", "d.docx"]);
        assert_eq!(docs[3].content, "Word notes");
    }

    #[tokio::test]
    async fn oversized_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.txt"), "0123456789").unwrap();
        std::fs::write(dir.path().join("small.txt"), "ok").unwrap();

        let docs = load_directory(dir.path(), 5).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.source, "small.txt");
    }

    #[tokio::test]
    async fn explicit_unsupported_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("slides.pptx");
        std::fs::write(&file, "x").unwrap();

        assert!(matches!(
            load_file(&file, DEFAULT_MAX_FILE_SIZE).await,
            Err(DocumentError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn extension_match_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("NOTES.TXT");
        std::fs::write(&file, "shout").unwrap();

        let doc = load_file(&file, DEFAULT_MAX_FILE_SIZE).await.unwrap();
        assert_eq!(doc.content, "shout");
    }
}
