//! File type detection and text extraction.
//!
//! Type detection is by extension: `.pdf`, `.docx`, common image formats,
//! and everything else as text. Text, PDF and DOCX files are extracted;
//! image files are detected and recorded but fail extraction since there
//! is no OCR.
//!
//! Text decoding is UTF-8 first, then falls back to Latin-1 so legacy
//! encodings never fail outright.

use async_trait::async_trait;
use std::io::Read;
use std::path::Path;

use docchat_core::extract::{ExtractedText, TextExtractor};
use docchat_core::models::FileType;
use docchat_core::{Error, Result};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp", "tif", "tiff"];

/// Maximum decompressed bytes read from `word/document.xml` (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Guess a file's type from its extension.
pub fn detect_type(path: &Path) -> FileType {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => FileType::Pdf,
        "docx" => FileType::Docx,
        e if IMAGE_EXTENSIONS.contains(&e) => FileType::Image,
        _ => FileType::Txt,
    }
}

/// Decode bytes as UTF-8, falling back to Latin-1.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Extract the text layer of an in-memory PDF.
pub fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::Extraction(format!("PDF extraction failed: {}", e)))
}

/// Extract paragraph text from an in-memory DOCX (OOXML) file.
///
/// Reads `<w:t>` runs from `word/document.xml`; each `<w:p>` ends a line.
pub fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(docx_error)?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| docx_error("word/document.xml not found"))?;
    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(docx_error)?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(docx_error(format!(
            "word/document.xml exceeds size limit ({} bytes)",
            MAX_XML_ENTRY_BYTES
        )));
    }

    paragraph_text(&xml).map_err(docx_error)
}

fn docx_error(e: impl std::fmt::Display) -> Error {
    Error::Extraction(format!("DOCX extraction failed: {}", e))
}

fn paragraph_text(xml: &[u8]) -> std::result::Result<String, quick_xml::Error> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::Text(te) if in_text => out.push_str(&te.unescape()?),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"tab" => out.push('\t'),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Reads text, PDF and DOCX files from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExtractor;

#[async_trait]
impl TextExtractor for FileExtractor {
    async fn extract(&self, path: &Path, forced_type: Option<FileType>) -> Result<ExtractedText> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| Error::Extraction(format!("File not found: {} ({})", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(Error::Extraction(format!(
                "Path is not a file: {}",
                path.display()
            )));
        }

        let file_type = forced_type.unwrap_or_else(|| detect_type(path));
        if file_type == FileType::Image {
            return Err(Error::Extraction(format!(
                "unsupported file type '{}' for {}: image text recognition is not available",
                file_type,
                path.display()
            )));
        }

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            Error::Extraction(format!(
                "Failed to read {} file {}: {}",
                file_type,
                path.display(),
                e
            ))
        })?;

        let text = match file_type {
            FileType::Pdf => tokio::task::spawn_blocking(move || extract_pdf(&bytes))
                .await
                .map_err(|e| Error::Extraction(format!("PDF extraction task failed: {}", e)))??,
            FileType::Docx => extract_docx(&bytes)?,
            FileType::Txt | FileType::Image => decode_text(&bytes),
        };

        Ok(ExtractedText {
            text: text.trim().to_string(),
            file_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_type() {
        assert_eq!(detect_type(Path::new("a/report.PDF")), FileType::Pdf);
        assert_eq!(detect_type(Path::new("memo.docx")), FileType::Docx);
        assert_eq!(detect_type(Path::new("scan.jpeg")), FileType::Image);
        assert_eq!(detect_type(Path::new("notes.md")), FileType::Txt);
        assert_eq!(detect_type(Path::new("README")), FileType::Txt);
    }

    #[test]
    fn test_decode_latin1_fallback() {
        assert_eq!(decode_text("café".as_bytes()), "café");
        assert_eq!(decode_text(&[0x63, 0x61, 0x66, 0xE9]), "café");
    }

    #[tokio::test]
    async fn test_extracts_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "  # Notes\n\nRemember the milk.  \n").unwrap();

        let out = FileExtractor.extract(&path, None).await.unwrap();
        assert_eq!(out.file_type, FileType::Txt);
        assert_eq!(out.text, "# Notes\n\nRemember the milk.");
    }

    #[tokio::test]
    async fn test_forced_txt_reads_any_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.pdf");
        std::fs::write(&path, "actually plain text").unwrap();

        let out = FileExtractor
            .extract(&path, Some(FileType::Txt))
            .await
            .unwrap();
        assert_eq!(out.text, "actually plain text");
    }

    fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
        use std::io::Write;
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
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

    /// Single-page PDF whose content stream shows `phrase` in Helvetica.
    fn pdf_with_phrase(phrase: &str) -> Vec<u8> {
        let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
            format!("<< /Length {} >> stream\n{}\nendstream", stream.len(), stream),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj {} endobj\n", i + 1, body).as_bytes());
        }
        let xref_start = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_start
            )
            .as_bytes(),
        );
        out
    }

    #[test]
    fn test_extract_docx_paragraphs() {
        let bytes = docx_with_paragraphs(&["Refunds take 14 days.", "Fish &amp; chips"]);
        let text = extract_docx(&bytes).unwrap();
        assert_eq!(text, "Refunds take 14 days.\nFish & chips\n");
    }

    #[test]
    fn test_docx_without_document_part() {
        use std::io::Write;
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/styles.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<w:styles/>").unwrap();
            zip.finish().unwrap();
        }
        let err = extract_docx(&buf).unwrap_err();
        assert!(err.to_string().contains("word/document.xml not found"), "{}", err);
    }

    #[test]
    fn test_invalid_binaries_fail_extraction() {
        let err = extract_pdf(b"not a pdf").unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
        assert!(err.to_string().contains("PDF extraction failed"));

        let err = extract_docx(b"not a zip").unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
        assert!(err.to_string().contains("DOCX extraction failed"));
    }

    #[tokio::test]
    async fn test_extracts_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handbook.pdf");
        std::fs::write(&path, pdf_with_phrase("refunds take fourteen days")).unwrap();

        let out = FileExtractor.extract(&path, None).await.unwrap();
        assert_eq!(out.file_type, FileType::Pdf);
        assert!(out.text.contains("refunds take fourteen days"), "{:?}", out.text);
    }

    #[tokio::test]
    async fn test_extracts_docx_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.docx");
        std::fs::write(&path, docx_with_paragraphs(&["Warranty lasts two years."])).unwrap();

        let out = FileExtractor.extract(&path, None).await.unwrap();
        assert_eq!(out.file_type, FileType::Docx);
        assert_eq!(out.text, "Warranty lasts two years.");
    }

    #[tokio::test]
    async fn test_forced_pdf_on_text_fails_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "plain words, not a PDF").unwrap();

        let err = FileExtractor
            .extract(&path, Some(FileType::Pdf))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("PDF extraction failed"), "{}", err);
    }

    #[tokio::test]
    async fn test_image_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let err = FileExtractor.extract(&path, None).await.unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
        assert!(err.to_string().contains("unsupported file type 'image'"));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = FileExtractor
            .extract(Path::new("/definitely/not/here.txt"), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }
}
