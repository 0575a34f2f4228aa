use super::{
    ExtractedDocument, ExtractionError, ExtractionMeta, Extractor, SourceType, extension_of,
};

const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown"];

/// Plain text and markdown, decoded as UTF-8 with lossy substitution
pub struct PlaintextExtractor;

impl Extractor for PlaintextExtractor {
    #[inline]
    fn name(&self) -> &'static str {
        "plaintext"
    }

    #[inline]
    fn can_handle(&self, filename: &str, content_type: Option<&str>) -> bool {
        if content_type.is_some_and(|ct| ct.starts_with("text/")) {
            return true;
        }
        extension_of(filename).is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
    }

    #[inline]
    fn extract(
        &self,
        filename: &str,
        _content_type: Option<&str>,
        content: &[u8],
    ) -> Result<ExtractedDocument, ExtractionError> {
        let text = String::from_utf8_lossy(content).into_owned();
        Ok(ExtractedDocument {
            text,
            meta: ExtractionMeta::new(SourceType::Plaintext, filename),
        })
    }
}
