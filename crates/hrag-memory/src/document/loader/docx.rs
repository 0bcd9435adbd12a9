use std::io::{Cursor, Read};
use std::path::Path;
use std::pin::Pin;

use quick_xml::Reader;
use quick_xml::events::Event;

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader};
use super::{check_size, source_name};

const DOCUMENT_PART: &str = "word/document.xml";
const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Loads Word documents. Body paragraphs come first, then every table row
/// with its non-empty cells joined by `" | "`.
pub struct DocxLoader {
    pub max_file_size: u64,
}

impl Default for DocxLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for DocxLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Document, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            check_size(&path, max_size).await?;
            let bytes = tokio::fs::read(&path).await?;
            let content = tokio::task::spawn_blocking(move || extract_docx_text(&bytes, max_size))
                .await
                .map_err(|e| DocumentError::Io(std::io::Error::other(e)))??;
            Ok(Document::new(source_name(&path), DOCX_CONTENT_TYPE, content))
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["docx", "doc"]
    }
}

/// Text of a `.docx` archive held in memory.
///
/// # Errors
///
/// Returns [`DocumentError::Docx`] if `bytes` is not a Word archive or its
/// document part is malformed, and [`DocumentError::FileTooLarge`] if the
/// uncompressed document part exceeds `max_size`.
pub fn extract_docx_text(bytes: &[u8], max_size: u64) -> Result<String, DocumentError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| DocumentError::Docx(e.to_string()))?;
    let part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| DocumentError::Docx(format!("{DOCUMENT_PART}: {e}")))?;
    if part.size() > max_size {
        return Err(DocumentError::FileTooLarge(part.size()));
    }
    let mut xml = String::new();
    part.take(max_size).read_to_string(&mut xml)?;
    parse_document_xml(&xml)
}

fn parse_document_xml(xml: &str) -> Result<String, DocumentError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut rows: Vec<String> = Vec::new();

    let mut table_depth = 0usize;
    let mut in_text = false;
    let mut paragraph: Option<String> = None;
    let mut cell: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();

    loop {
        match reader
            .read_event()
            .map_err(|e| DocumentError::Docx(e.to_string()))?
        {
            Event::Start(e) => match e.local_name().as_ref() {
                b"tbl" => table_depth += 1,
                b"tr" if table_depth == 1 => row.clear(),
                b"tc" if table_depth == 1 => cell.clear(),
                b"p" => paragraph = Some(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => {
                if let Some(text) = paragraph.as_mut() {
                    match e.local_name().as_ref() {
                        b"tab" => text.push('\t'),
                        b"br" | b"cr" => text.push('\n'),
                        _ => {}
                    }
                }
            }
            Event::Text(t) if in_text => {
                if let Some(text) = paragraph.as_mut() {
                    let unescaped = t.unescape().map_err(|e| DocumentError::Docx(e.to_string()))?;
                    text.push_str(&unescaped);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if let Some(text) = paragraph.take() {
                        if table_depth == 0 {
                            if !text.trim().is_empty() {
                                paragraphs.push(text);
                            }
                        } else {
                            cell.push(text);
                        }
                    }
                }
                b"tc" if table_depth == 1 => {
                    row.push(cell.join("\n").trim().to_owned());
                    cell.clear();
                }
                b"tr" if table_depth == 1 => {
                    let joined = row
                        .iter()
                        .filter(|c| !c.is_empty())
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join(" | ");
                    if !joined.is_empty() {
                        rows.push(joined);
                    }
                    row.clear();
                }
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    paragraphs.extend(rows);
    Ok(paragraphs.join("\n"))
}
