use lopdf::Document;
use tracing::{debug, warn};

use super::{
    ExtractedDocument, ExtractionError, ExtractionMeta, Extractor, SourceType, extension_of,
};

/// Page-by-page PDF text extraction using lopdf
pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    #[inline]
    fn name(&self) -> &'static str {
        "pdf"
    }

    #[inline]
    fn can_handle(&self, filename: &str, content_type: Option<&str>) -> bool {
        content_type == Some("application/pdf")
            || extension_of(filename).is_some_and(|ext| ext == "pdf")
    }

    #[inline]
    fn extract(
        &self,
        filename: &str,
        _content_type: Option<&str>,
        content: &[u8],
    ) -> Result<ExtractedDocument, ExtractionError> {
        let document =
            Document::load_mem(content).map_err(|e| ExtractionError::malformed("pdf", e))?;

        let pages = document.get_pages();
        let page_count = pages.len();
        let mut texts = Vec::with_capacity(page_count);

        for page_number in pages.keys() {
            match document.extract_text(&[*page_number]) {
                Ok(text) if !text.trim().is_empty() => texts.push(text),
                Ok(_) => debug!("Skipping empty page {} of '{}'", page_number, filename),
                Err(e) => warn!(
                    "Could not extract text from page {} of '{}': {}",
                    page_number, filename, e
                ),
            }
        }

        debug!(
            "Extracted {} of {} pages with text from '{}'",
            texts.len(),
            page_count,
            filename
        );

        let mut meta = ExtractionMeta::new(SourceType::Pdf, filename);
        meta.page_count = Some(page_count);

        Ok(ExtractedDocument {
            text: texts.join("\n\n"),
            meta,
        })
    }
}
