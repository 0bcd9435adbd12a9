use std::path::Path;
use std::pin::Pin;

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader};
use super::{read_text, source_name};

const CONTENT_SELECTOR: &str = "title, h1, h2, h3, h4, h5, h6, p, li, td, th, pre, blockquote";

/// Collect the trimmed text of every element matching `selector`, one element
/// per line. Script and style bodies never match a content selector.
///
/// # Errors
///
/// Returns [`DocumentError::Html`] if the selector is invalid.
pub fn extract_html_text(html: &str, selector: &str) -> Result<String, DocumentError> {
    let soup = scrape_core::Soup::parse(html);
    let tags = soup
        .find_all(selector)
        .map_err(|e| DocumentError::Html(format!("invalid selector: {e}")))?;

    let lines: Vec<String> = tags
        .into_iter()
        .map(|tag| tag.text().trim().to_owned())
        .filter(|text| !text.is_empty())
        .collect();
    Ok(lines.join("\n"))
}

pub struct HtmlLoader {
    pub max_file_size: u64,
}

impl Default for HtmlLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for HtmlLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Document, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let raw = read_text(&path, max_size).await?;
            let content = extract_html_text(&raw, CONTENT_SELECTOR)?;
            Ok(Document::new(source_name(&path), "text/html", content))
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["html", "htm"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<html><head><title>Guide</title><style>p { color: red; }</style>\
        <script>var secret = 1;</script></head>\
        <body><h1>Install</h1><p>Run the installer.</p><ul><li>Step one</li></ul></body></html>";

    #[test]
    fn extracts_content_elements() {
        let text = extract_html_text(PAGE, CONTENT_SELECTOR).unwrap();
        assert!(text.contains("Install"));
        assert!(text.contains("Run the installer."));
        assert!(text.contains("Step one"));
        assert!(!text.contains("secret"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn no_matches_gives_empty_text() {
        assert!(extract_html_text("<div></div>", "p").unwrap().is_empty());
    }

    #[tokio::test]
    async fn loads_html_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("guide.htm");
        std::fs::write(&file, PAGE).unwrap();

        let doc = HtmlLoader::default().load(&file).await.unwrap();
        assert_eq!(doc.metadata.source, "guide.htm");
        assert_eq!(doc.metadata.content_type, "text/html");
        assert!(doc.content.contains("Run the installer."));
    }
}
