use scraper::{Html, Node, Selector};

use super::{
    ExtractedDocument, ExtractionError, ExtractionMeta, Extractor, SourceType, extension_of,
};

/// Elements whose text never reaches the index
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript"];

pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    #[inline]
    fn name(&self) -> &'static str {
        "html"
    }

    #[inline]
    fn can_handle(&self, filename: &str, content_type: Option<&str>) -> bool {
        if matches!(content_type, Some("text/html" | "application/xhtml+xml")) {
            return true;
        }
        extension_of(filename).is_some_and(|ext| matches!(ext.as_str(), "html" | "htm" | "xhtml"))
    }

    #[inline]
    fn extract(
        &self,
        filename: &str,
        _content_type: Option<&str>,
        content: &[u8],
    ) -> Result<ExtractedDocument, ExtractionError> {
        let source = String::from_utf8_lossy(content);
        let document = Html::parse_document(&source);

        let title = extract_title(&document)?;
        let text = flatten_text(&document);

        let mut meta = ExtractionMeta::new(SourceType::Html, filename);
        if let Some(title) = &title {
            meta.source_name = Some(title.clone());
        }
        meta.title = title;

        Ok(ExtractedDocument { text, meta })
    }
}

fn extract_title(document: &Html) -> Result<Option<String>, ExtractionError> {
    let selector =
        Selector::parse("title").map_err(|e| ExtractionError::malformed("html", e.to_string()))?;

    Ok(document
        .select(&selector)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty()))
}

/// Collect visible text, one trimmed non-empty line per output line
fn flatten_text(document: &Html) -> String {
    let mut lines = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| NON_CONTENT_TAGS.contains(&el.name()))
        });
        if hidden {
            continue;
        }

        lines.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }

    lines.join("\n")
}
