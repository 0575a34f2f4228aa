// CLI command handlers
// Each handler opens the pipeline from the loaded configuration and prints its result


use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::completion::{AnswerService, AskOptions, OpenAiCompatibleClient};
use crate::config::{Config, ConfigError};
use crate::database::vector::{CollectionStatus, PayloadFilter, VectorIndex};
use crate::indexer::{IndexCleanup, IngestRequest, Indexer};
use crate::retrieval::{Citation, make_snippet};

/// Options shared by `search` and `ask`
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    pub top_k: Option<usize>,
    pub filter: Option<String>,
}

impl QueryArgs {
    fn payload_filter(&self) -> Result<Option<PayloadFilter>> {
        self.filter
            .as_deref()
            .map(|raw| {
                parse_json_object(raw, "--filter").map(|map| PayloadFilter::from_json(&map))
            })
            .transpose()
    }

    fn validated_top_k(&self) -> Result<Option<usize>> {
        match self.top_k {
            Some(k) if !(1..=50).contains(&k) => {
                bail!("--top-k must be between 1 and 50, got {}", k)
            }
            other => Ok(other),
        }
    }
}

fn validated_temperature(temperature: Option<f64>) -> Result<Option<f64>> {
    match temperature {
        Some(t) if !(0.0..=2.0).contains(&t) => Err(ConfigError::InvalidTemperature(t).into()),
        other => Ok(other),
    }
}

/// Parse a command-line JSON argument that must be an object
#[inline]
pub fn parse_json_object(raw: &str, flag: &str) -> Result<Map<String, Value>> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("{} is not valid JSON", flag))?;
    match value {
        Value::Object(map) => Ok(map),
        other => bail!("{} must be a JSON object, got {}", flag, other),
    }
}

async fn open_indexer(config: &Config) -> Result<Indexer> {
    Indexer::from_config(config)
        .await
        .context("Failed to open the knowledge store")
}

/// Write the effective configuration to `config.toml`
#[inline]
pub fn init_config(config: &Config) -> Result<()> {
    config.save()?;
    println!(
        "✅ Configuration written to {}",
        config.config_file_path().display()
    );
    println!("Edit the file to point at your embedding and completion services.");
    Ok(())
}

#[inline]
pub async fn create_knowledge_base(
    config: &Config,
    name: &str,
    description: Option<String>,
) -> Result<()> {
    let indexer = open_indexer(config).await?;
    let kb = indexer.create_knowledge_base(name, description).await?;
    println!("Created knowledge base: {} (ID: {})", kb.name, kb.id);
    Ok(())
}

#[inline]
pub async fn list_knowledge_bases(config: &Config) -> Result<()> {
    let indexer = open_indexer(config).await?;
    let knowledge_bases = indexer.list_knowledge_bases().await?;

    if knowledge_bases.is_empty() {
        println!("No knowledge bases have been created yet.");
        println!("Use 'lorekeeper kb create <name>' to create one.");
        return Ok(());
    }

    println!("Knowledge Bases ({} total):", knowledge_bases.len());
    println!();

    for kb in &knowledge_bases {
        println!("📚 {} (ID: {})", kb.name, kb.id);
        if let Some(description) = &kb.description {
            println!("   {}", description);
        }

        let documents = indexer.database().list_documents(&kb.id).await?;
        let chunks = indexer
            .database()
            .count_chunks_for_knowledge_base(&kb.id)
            .await?;
        println!("   Documents: {}", documents.len());
        println!("   Chunks: {}", chunks);

        println!("   Vectors: {}", vector_summary(indexer.index().as_ref(), &kb.id).await);
        println!("   Created: {}", kb.created_date.format("%Y-%m-%d %H:%M:%S"));
        println!();
    }

    Ok(())
}

#[inline]
pub async fn delete_knowledge_base(config: &Config, kb_id: &str) -> Result<()> {
    let indexer = open_indexer(config).await?;
    let deletion = indexer.delete_knowledge_base(kb_id).await?;

    println!(
        "Deleted knowledge base {} and {} documents",
        deletion.kb_id, deletion.documents_removed
    );
    report_cleanup(&deletion.index_cleanup);
    Ok(())
}

#[inline]
pub async fn ingest_file(
    config: &Config,
    kb_id: &str,
    path: &Path,
    content_type: Option<String>,
    metadata: Option<&str>,
) -> Result<()> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?;

    let mut request = IngestRequest::new(filename, content);
    if let Some(content_type) = content_type {
        request = request.with_content_type(content_type);
    }
    if let Some(raw) = metadata {
        request = request.with_metadata(parse_json_object(raw, "--meta")?);
    }

    let indexer = open_indexer(config).await?;
    info!("Ingesting {} into knowledge base {}", path.display(), kb_id);
    let outcome = indexer.ingest(kb_id, request).await?;

    println!("✅ Ingested {} (document ID: {})", filename, outcome.document_id);
    println!("   Chunks: {}", outcome.chunk_count);
    println!("   Vector dimensions: {}", outcome.vector_dimension);
    if let CollectionStatus::Recreated { previous } = outcome.collection_status {
        println!(
            "⚠️  The embedding dimensionality changed from {} to {}; earlier vectors were discarded and need re-ingestion.",
            previous, outcome.vector_dimension
        );
    }
    Ok(())
}

#[inline]
pub async fn list_documents(config: &Config, kb_id: &str) -> Result<()> {
    let indexer = open_indexer(config).await?;
    let documents = indexer.list_documents(kb_id).await?;

    if documents.is_empty() {
        println!("No documents in knowledge base {}.", kb_id);
        return Ok(());
    }

    println!("Documents ({} total):", documents.len());
    for document in &documents {
        let chunks = indexer
            .database()
            .count_chunks_for_document(&document.id)
            .await?;
        println!(
            "📄 {} (ID: {}) - {} bytes, {} chunks",
            document.filename, document.id, document.size_bytes, chunks
        );
    }
    Ok(())
}

#[inline]
pub async fn show_document(config: &Config, document_id: &str) -> Result<()> {
    let indexer = open_indexer(config).await?;
    let document = indexer.database().require_document(document_id).await?;
    let chunks = indexer.database().list_chunks(document_id).await?;

    println!("📄 {} (ID: {})", document.filename, document.id);
    println!("   Knowledge base: {}", document.kb_id);
    if let Some(content_type) = &document.content_type {
        println!("   Content type: {}", content_type);
    }
    println!("   SHA-256: {}", document.sha256);
    println!("   Size: {} bytes", document.size_bytes);
    println!("   Stored at: {}", document.storage_path);
    println!(
        "   Extraction: {}",
        Value::Object(document.extraction_meta.clone())
    );
    if !document.user_meta.is_empty() {
        println!("   Metadata: {}", Value::Object(document.user_meta.clone()));
    }
    println!("   Chunks: {}", chunks.len());
    for chunk in &chunks {
        let span = match (chunk.start_offset, chunk.end_offset) {
            (Some(start), Some(end)) => format!("{}..{}", start, end),
            _ => "window".to_string(),
        };
        println!(
            "   [{}] ({}) {}",
            chunk.chunk_index,
            span,
            make_snippet(&chunk.text, 80).replace('\n', " ")
        );
    }
    Ok(())
}

#[inline]
pub async fn delete_document(config: &Config, document_id: &str) -> Result<()> {
    let indexer = open_indexer(config).await?;
    let deletion = indexer.delete_document(document_id).await?;

    println!(
        "Deleted document {} and {} chunks",
        deletion.document_id, deletion.chunks_removed
    );
    report_cleanup(&deletion.index_cleanup);
    Ok(())
}

#[inline]
pub async fn search(config: &Config, kb_id: &str, question: &str, args: &QueryArgs) -> Result<()> {
    let filter = args.payload_filter()?;
    let top_k = args.validated_top_k()?;

    let indexer = open_indexer(config).await?;
    indexer.database().require_knowledge_base(kb_id).await?;
    let retriever = indexer.retriever(&config.retrieval);
    let chunks = retriever
        .retrieve(kb_id, question, top_k, filter.as_ref())
        .await?;

    if chunks.is_empty() {
        println!("No matching chunks found.");
        return Ok(());
    }

    print_citations(&retriever.to_citations(&chunks));
    Ok(())
}

#[inline]
pub async fn ask(
    config: &Config,
    kb_id: &str,
    question: &str,
    args: &QueryArgs,
    system_preamble: Option<String>,
    temperature: Option<f64>,
) -> Result<()> {
    let options = AskOptions {
        top_k: args.validated_top_k()?,
        filter: args.payload_filter()?,
        system_preamble,
        temperature: validated_temperature(temperature)?,
    };

    let indexer = open_indexer(config).await?;
    indexer.database().require_knowledge_base(kb_id).await?;
    let provider = OpenAiCompatibleClient::new(&config.completion)?;
    let service = AnswerService::new(
        indexer.retriever(&config.retrieval),
        Arc::new(provider),
        config.completion.temperature,
        config.completion.system_preamble.clone(),
    );

    let answer = service.ask(kb_id, question, &options).await?;

    println!("{}", answer.answer.trim());
    if !answer.citations.is_empty() {
        println!();
        println!("Sources:");
        print_citations(&answer.citations);
    }
    Ok(())
}

fn print_citations(citations: &[Citation]) {
    for (position, citation) in citations.iter().enumerate() {
        let source = ["source_name", "filename"]
            .iter()
            .find_map(|key| citation.metadata.get(*key).and_then(Value::as_str))
            .unwrap_or(&citation.doc_id);
        println!(
            "[{}] {} (score {:.3}, chunk {})",
            position + 1,
            source,
            citation.score,
            citation.chunk_id
        );
        println!("    {}", citation.snippet.replace('\n', " "));
    }
}

async fn vector_summary(index: &dyn VectorIndex, kb_id: &str) -> String {
    let dimension = match index.collection_dimension(kb_id).await {
        Ok(Some(dimension)) => dimension,
        Ok(None) => return "none".to_string(),
        Err(e) => return format!("Error - {}", e),
    };
    match index.count_points(kb_id).await {
        Ok(points) => format!("{} ({} dimensions)", points, dimension),
        Err(e) => format!("Error - {}", e),
    }
}

fn report_cleanup(cleanup: &IndexCleanup) {
    if let IndexCleanup::Failed(reason) = cleanup {
        println!("⚠️  Vector index cleanup failed, some vectors may remain: {}", reason);
    }
}
