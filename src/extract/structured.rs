// Structured data is parsed and re-serialized so that semantically identical
// inputs always produce identical text (and therefore identical chunks).

use std::cmp::Ordering;

use super::{
    ExtractedDocument, ExtractionError, ExtractionMeta, Extractor, SourceType, extension_of,
};

pub struct JsonExtractor;

impl Extractor for JsonExtractor {
    #[inline]
    fn name(&self) -> &'static str {
        "json"
    }

    #[inline]
    fn can_handle(&self, filename: &str, content_type: Option<&str>) -> bool {
        matches!(content_type, Some("application/json" | "text/json"))
            || extension_of(filename).is_some_and(|ext| ext == "json")
    }

    #[inline]
    fn extract(
        &self,
        filename: &str,
        _content_type: Option<&str>,
        content: &[u8],
    ) -> Result<ExtractedDocument, ExtractionError> {
        let value: serde_json::Value =
            serde_json::from_slice(content).map_err(|e| ExtractionError::malformed("json", e))?;
        let text = serde_json::to_string_pretty(&sort_keys(value))
            .map_err(|e| ExtractionError::malformed("json", e))?;

        Ok(ExtractedDocument {
            text,
            meta: ExtractionMeta::new(SourceType::Json, filename),
        })
    }
}

pub struct YamlExtractor;

impl Extractor for YamlExtractor {
    #[inline]
    fn name(&self) -> &'static str {
        "yaml"
    }

    #[inline]
    fn can_handle(&self, filename: &str, content_type: Option<&str>) -> bool {
        matches!(
            content_type,
            Some("application/yaml" | "application/x-yaml" | "text/yaml" | "text/x-yaml")
        ) || extension_of(filename).is_some_and(|ext| ext == "yaml" || ext == "yml")
    }

    #[inline]
    fn extract(
        &self,
        filename: &str,
        _content_type: Option<&str>,
        content: &[u8],
    ) -> Result<ExtractedDocument, ExtractionError> {
        let value: serde_yaml::Value =
            serde_yaml::from_slice(content).map_err(|e| ExtractionError::malformed("yaml", e))?;
        let text = serde_yaml::to_string(&sort_mapping_keys(value))
            .map_err(|e| ExtractionError::malformed("yaml", e))?;

        Ok(ExtractedDocument {
            text,
            meta: ExtractionMeta::new(SourceType::Yaml, filename),
        })
    }
}

/// Rebuild every object with its keys in lexicographic order
fn sort_keys(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort_keys(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// YAML counterpart of [`sort_keys`]; mapping keys need not be strings
fn sort_mapping_keys(value: serde_yaml::Value) -> serde_yaml::Value {
    use serde_yaml::Value;

    match value {
        Value::Mapping(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            Value::Mapping(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort_mapping_keys(value)))
                    .collect(),
            )
        }
        Value::Sequence(items) => {
            Value::Sequence(items.into_iter().map(sort_mapping_keys).collect())
        }
        Value::Tagged(mut tagged) => {
            tagged.value = sort_mapping_keys(tagged.value);
            Value::Tagged(tagged)
        }
        other => other,
    }
}
