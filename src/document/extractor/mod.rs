
use lopdf::Document;
use tracing::{debug, warn};

use crate::{RagError, Result};

/// Leading text of the marker inserted ahead of every page
pub const PAGE_MARKER_PREFIX: &str = "--- Page";

/// Extract the text of every page of a PDF, prefixing each page with
/// `--- Page N ---`. Any page that fails to decode fails the whole document.
#[inline]
pub fn extract_text(pdf_content: &[u8]) -> Result<String> {
    let document = Document::load_mem(pdf_content)
        .map_err(|e| RagError::Extraction(format!("not a readable PDF: {}", e)))?;

    if document.is_encrypted() {
        warn!("Encrypted PDF rejected");
        return Err(RagError::Extraction(
            "encrypted PDFs are not supported".to_string(),
        ));
    }

    let pages = document.get_pages();
    debug!("Extracting text from {} pages", pages.len());

    let mut text = String::new();
    for page_number in pages.keys() {
        let page_text = document.extract_text(&[*page_number]).map_err(|e| {
            RagError::Extraction(format!("page {} could not be decoded: {}", page_number, e))
        })?;

        text.push('\n');
        text.push_str(&page_marker(*page_number));
        text.push('\n');
        text.push_str(&page_text);
    }

    debug!("Extracted {} characters of text", text.len());
    Ok(text)
}

/// Extract text on tokio's blocking pool so large documents don't stall the runtime
#[inline]
pub async fn extract_text_blocking(pdf_content: Vec<u8>) -> Result<String> {
    tokio::task::spawn_blocking(move || extract_text(&pdf_content))
        .await
        .map_err(|e| RagError::Extraction(format!("extraction task failed: {}", e)))?
}

#[inline]
pub fn page_marker(page: u32) -> String {
    format!("{} {} ---", PAGE_MARKER_PREFIX, page)
}
