// Extraction module
// Turns uploaded bytes into plain text plus structural metadata

#[cfg(test)]
mod tests;

pub mod html;
pub mod pdf;
pub mod plaintext;
pub mod structured;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

pub use html::HtmlExtractor;
pub use pdf::PdfExtractor;
pub use plaintext::PlaintextExtractor;
pub use structured::{JsonExtractor, YamlExtractor};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Malformed {format} content: {message}")]
    Malformed {
        format: &'static str,
        message: String,
    },
    #[error("No retrievable text in {filename}")]
    Empty { filename: String },
    #[error("Extraction task failed: {0}")]
    Task(String),
}

impl ExtractionError {
    #[inline]
    pub fn malformed(format: &'static str, message: impl ToString) -> Self {
        Self::Malformed {
            format,
            message: message.to_string(),
        }
    }
}

/// Which strategy produced the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Plaintext,
    Html,
    Pdf,
    Json,
    Yaml,
    FallbackText,
}

impl SourceType {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match *self {
            SourceType::Plaintext => "plaintext",
            SourceType::Html => "html",
            SourceType::Pdf => "pdf",
            SourceType::Json => "json",
            SourceType::Yaml => "yaml",
            SourceType::FallbackText => "fallback_text",
        }
    }
}

impl std::fmt::Display for SourceType {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata recorded alongside extracted text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionMeta {
    pub source_type: SourceType,
    /// Human-readable name used when citing this source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl ExtractionMeta {
    #[inline]
    pub fn new(source_type: SourceType, filename: &str) -> Self {
        Self {
            source_type,
            source_name: (!filename.trim().is_empty()).then(|| filename.to_string()),
            title: None,
            page_count: None,
            encoding: None,
        }
    }

    /// Flatten into a JSON object for chunk payloads and document records
    #[inline]
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub text: String,
    pub meta: ExtractionMeta,
}

/// A format-specific extraction strategy
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this handler claims the file. `content_type` is already normalized.
    fn can_handle(&self, filename: &str, content_type: Option<&str>) -> bool;

    fn extract(
        &self,
        filename: &str,
        content_type: Option<&str>,
        content: &[u8],
    ) -> Result<ExtractedDocument, ExtractionError>;
}

/// Ordered chain of extractors; the first handler that claims a file wins
pub struct ExtractorDispatcher {
    extractors: Vec<Box<dyn Extractor>>,
}

impl Default for ExtractorDispatcher {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorDispatcher {
    #[inline]
    pub fn new() -> Self {
        Self {
            extractors: vec![
                Box::new(JsonExtractor),
                Box::new(YamlExtractor),
                Box::new(PdfExtractor),
                Box::new(HtmlExtractor),
                Box::new(PlaintextExtractor),
            ],
        }
    }

    /// Names of the registered handlers in priority order
    #[inline]
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// Extract text from raw bytes.
    ///
    /// Once a handler claims the file its errors are returned as-is; the
    /// byte-decoding fallback only runs when nothing claims it.
    #[inline]
    pub fn extract(
        &self,
        filename: &str,
        content_type: Option<&str>,
        content: &[u8],
    ) -> Result<ExtractedDocument, ExtractionError> {
        let content_type = content_type.and_then(normalize_content_type);
        let content_type = content_type.as_deref();

        if let Some(extractor) = self
            .extractors
            .iter()
            .find(|e| e.can_handle(filename, content_type))
        {
            debug!(
                "Extracting '{}' ({:?}) with {} extractor",
                filename,
                content_type,
                extractor.name()
            );
            return extractor.extract(filename, content_type, content);
        }

        debug!(
            "No extractor claimed '{}' ({:?}), decoding bytes as text",
            filename, content_type
        );
        Ok(fallback_decode(filename, content))
    }
}

/// Strip parameters and lower-case a MIME type; empty values become `None`
#[inline]
pub fn normalize_content_type(content_type: &str) -> Option<String> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    (!essence.is_empty()).then_some(essence)
}

/// Lower-cased extension of a filename, without the dot
#[inline]
pub fn extension_of(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn fallback_decode(filename: &str, content: &[u8]) -> ExtractedDocument {
    let (text, encoding) = match std::str::from_utf8(content) {
        Ok(text) => (text.to_string(), "utf-8"),
        // Latin-1 maps every byte to the code point of the same value
        Err(_) => (content.iter().map(|&b| char::from(b)).collect(), "latin-1"),
    };

    let mut meta = ExtractionMeta::new(SourceType::FallbackText, filename);
    meta.encoding = Some(encoding.to_string());
    ExtractedDocument { text, meta }
}
