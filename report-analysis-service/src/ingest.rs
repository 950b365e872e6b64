//! Report ingestion: PDF bytes in, plain text out.
//!
//! Only PDF input is accepted, and the format check happens before any other
//! processing. Page extraction is delegated to the `pdf-extract` crate and
//! runs on the blocking pool.

use thiserror::Error;
use tracing::info;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid file format. Please upload a PDF file.")]
    UnsupportedFormat,

    #[error("This PDF appears to be empty or contains only images.")]
    EmptyDocument,

    #[error("Could not read the PDF file. It might be corrupted or password-protected.")]
    Unreadable(String),
}

/// Pre-flight format check on the raw upload bytes.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Extract the full text of a report, page by page in document order, pages
/// separated by a blank line.
pub async fn extract_report_text(bytes: Vec<u8>) -> Result<String, IngestError> {
    if !looks_like_pdf(&bytes) {
        return Err(IngestError::UnsupportedFormat);
    }

    let pages = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem_by_pages(&bytes)
    })
    .await
    .map_err(|err| IngestError::Unreadable(err.to_string()))?
    .map_err(|err| IngestError::Unreadable(err.to_string()))?;

    let text = pages.join("\n\n");
    if text.trim().is_empty() {
        return Err(IngestError::EmptyDocument);
    }

    info!(
        pages = pages.len(),
        characters = text.len(),
        "extracted report text"
    );
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_pdf_bytes_are_rejected_before_processing() {
        let result = extract_report_text(b"GIF89a not a report".to_vec()).await;
        assert!(matches!(result, Err(IngestError::UnsupportedFormat)));
    }

    #[tokio::test]
    async fn truncated_pdf_bytes_fail_without_panicking() {
        // Carries the magic but no document structure; extraction must fail
        // as unreadable or empty, never panic across the boundary.
        let result = extract_report_text(b"%PDF-1.4 garbage".to_vec()).await;
        assert!(matches!(
            result,
            Err(IngestError::Unreadable(_)) | Err(IngestError::EmptyDocument)
        ));
    }

    #[test]
    fn magic_check_requires_the_full_prefix() {
        assert!(looks_like_pdf(b"%PDF-1.7\n..."));
        assert!(!looks_like_pdf(b"%PD"));
        assert!(!looks_like_pdf(b""));
    }
}
