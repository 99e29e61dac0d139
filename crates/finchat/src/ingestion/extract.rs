//! Format-specific text extraction

use crate::error::{Error, Result};
use crate::types::document::FileType;

/// Extract plain text from an uploaded file
pub fn extract_text(filename: &str, file_type: FileType, data: &[u8]) -> Result<String> {
    let text = match file_type {
        FileType::Pdf => extract_pdf(filename, data)?,
        FileType::Docx => extract_docx(filename, data)?,
        FileType::Txt => extract_txt(filename, data)?,
    };

    if text.trim().is_empty() {
        return Err(Error::extraction(
            filename,
            "No text content could be extracted",
        ));
    }
    Ok(text)
}

/// PDF extraction: per-page text concatenation
fn extract_pdf(filename: &str, data: &[u8]) -> Result<String> {
    match pdf_extract::extract_text_from_mem(data) {
        Ok(text) => {
            tracing::info!("Extracted {} characters from PDF '{}'", text.len(), filename);
            Ok(text)
        }
        Err(e) => {
            tracing::warn!("pdf-extract failed for '{}': {e}, trying fallback", filename);
            extract_pdf_fallback(filename, data)
        }
    }
}

/// Fallback PDF extraction using lopdf directly
fn extract_pdf_fallback(filename: &str, data: &[u8]) -> Result<String> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| Error::extraction(filename, format!("Failed to parse PDF: {e}")))?;

    let pages = doc.get_pages();
    let mut page_texts = Vec::with_capacity(pages.len());
    for page_num in pages.keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(text) if !text.trim().is_empty() => page_texts.push(text),
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Could not extract text from page {page_num}: {e}");
            }
        }
    }

    if page_texts.is_empty() {
        return Err(Error::extraction(
            filename,
            "PDF appears to be image-based or has no extractable text",
        ));
    }
    Ok(page_texts.join("\n\n"))
}

/// DOCX extraction: paragraph concatenation
fn extract_docx(filename: &str, data: &[u8]) -> Result<String> {
    let doc = docx_rs::read_docx(data)
        .map_err(|e| Error::extraction(filename, format!("Failed to parse DOCX: {e}")))?;

    let mut paragraphs = Vec::new();
    for child in doc.document.children {
        if let docx_rs::DocumentChild::Paragraph(p) = child {
            let mut paragraph = String::new();
            for child in p.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(t) = child {
                            paragraph.push_str(&t.text);
                        }
                    }
                }
            }
            if !paragraph.trim().is_empty() {
                paragraphs.push(paragraph);
            }
        }
    }

    tracing::info!(
        "Extracted {} paragraphs from DOCX '{}'",
        paragraphs.len(),
        filename
    );
    Ok(paragraphs.join("\n\n"))
}

/// TXT extraction: strict UTF-8 decode
fn extract_txt(filename: &str, data: &[u8]) -> Result<String> {
    String::from_utf8(data.to_vec())
        .map_err(|e| Error::extraction(filename, format!("File is not valid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txt_decodes_utf8() {
        let text = extract_text("notes.txt", FileType::Txt, "Q4 revenue was $2.5M".as_bytes())
            .unwrap();
        assert_eq!(text, "Q4 revenue was $2.5M");
    }

    #[test]
    fn txt_rejects_invalid_utf8() {
        let err = extract_text("bad.txt", FileType::Txt, &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }

    #[test]
    fn empty_content_is_an_extraction_error() {
        let err = extract_text("empty.txt", FileType::Txt, b"   \n ").unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }
}
