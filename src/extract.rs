//! Paragraph extraction for handbook documents.
//!
//! `.docx` files are OOXML ZIP containers; paragraphs are the `<w:p>`
//! elements of `word/document.xml`. Plain-text files (`.txt`, `.md`) use one
//! paragraph per line. Blank paragraphs are dropped in both cases.

use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use thiserror::Error;

/// Maximum decompressed bytes to read from `word/document.xml` (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported document type: {0}")]
    UnsupportedType(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

/// The document formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Docx,
    Text,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "docx" => Ok(DocumentKind::Docx),
            "txt" | "md" => Ok(DocumentKind::Text),
            _ => Err(ExtractError::UnsupportedType(path.display().to_string())),
        }
    }
}

/// Read a file and return its non-blank paragraphs in order.
pub fn extract_file(path: &Path) -> Result<Vec<String>, ExtractError> {
    let kind = DocumentKind::from_path(path)?;
    let bytes = std::fs::read(path)?;
    extract_paragraphs(&bytes, kind)
}

pub fn extract_paragraphs(bytes: &[u8], kind: DocumentKind) -> Result<Vec<String>, ExtractError> {
    let paragraphs = match kind {
        DocumentKind::Docx => extract_docx(bytes)?,
        DocumentKind::Text => String::from_utf8_lossy(bytes)
            .lines()
            .map(|l| l.to_string())
            .collect(),
    };
    Ok(paragraphs
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect())
}

fn extract_docx(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Ooxml("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    read_w_paragraphs(&doc_xml)
}

/// Walk the body XML, collecting the `<w:t>` text of each `<w:p>`.
fn read_w_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut paragraphs = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    // Open paragraphs, innermost last. Text boxes nest `<w:p>` inside a run.
    let mut open: Vec<String> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => open.push(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"p" => paragraphs.push(String::new()),
                b"tab" => {
                    if let Some(p) = open.last_mut() {
                        p.push('\t');
                    }
                }
                b"br" | b"cr" => {
                    if let Some(p) = open.last_mut() {
                        p.push('\n');
                    }
                }
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                if let Some(p) = open.last_mut() {
                    let text = te
                        .unescape()
                        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                    p.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if let Some(p) = open.pop() {
                        paragraphs.push(p);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Build a minimal `.docx` with one `<w:p>` per entry.
    pub(crate) fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| {
                if p.is_empty() {
                    "<w:p/>".to_string()
                } else {
                    format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p)
                }
            })
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn docx_paragraphs_in_order_without_blanks() {
        let bytes = docx_with_paragraphs(&["Vacation Policy", "", "   ", "Employees accrue."]);
        let paras = extract_paragraphs(&bytes, DocumentKind::Docx).unwrap();
        assert_eq!(paras, vec!["Vacation Policy", "Employees accrue."]);
    }

    #[test]
    fn docx_runs_are_concatenated_within_paragraph() {
        let xml = r#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>Paid </w:t></w:r><w:r><w:t>holidays</w:t></w:r><w:r><w:tab/><w:t>list</w:t></w:r></w:p></w:body></w:document>"#;
        let paras = read_w_paragraphs(xml.as_bytes()).unwrap();
        assert_eq!(paras, vec!["Paid holidays\tlist"]);
    }

    #[test]
    fn text_box_paragraph_keeps_surrounding_text() {
        let xml = r#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>Before </w:t></w:r><w:r><w:pict><w:txbxContent><w:p><w:r><w:t>Boxed note</w:t></w:r></w:p></w:txbxContent></w:pict></w:r><w:r><w:t>after.</w:t></w:r></w:p></w:body></w:document>"#;
        let paras = read_w_paragraphs(xml.as_bytes()).unwrap();
        assert_eq!(paras, vec!["Boxed note", "Before after."]);
    }

    #[test]
    fn escaped_entities_are_decoded() {
        let bytes = docx_with_paragraphs(&["Health &amp; Dental"]);
        let paras = extract_paragraphs(&bytes, DocumentKind::Docx).unwrap();
        assert_eq!(paras, vec!["Health & Dental"]);
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_paragraphs(b"not a zip", DocumentKind::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn text_files_split_on_lines() {
        let paras =
            extract_paragraphs(b"First line\n\nSecond line\n", DocumentKind::Text).unwrap();
        assert_eq!(paras, vec!["First line", "Second line"]);
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = DocumentKind::from_path(Path::new("handbook.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedType(_)));
    }
}
