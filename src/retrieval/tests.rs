use super::*;
use crate::database::memory::MemoryVectorIndex;
use crate::database::vector::IndexPoint;
use crate::embeddings::HashingEmbedder;
use serde_json::json;

fn chunk(id: &str, text: &str, score: f32) -> RetrievedChunk {
    RetrievedChunk {
        chunk_id: id.to_string(),
        doc_id: "doc".to_string(),
        kb_id: "kb".to_string(),
        score,
        text: text.to_string(),
        payload: Payload::new(),
    }
}

fn payload_for(id: &str, doc_id: &str, text: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert("chunk_id".to_string(), json!(id));
    payload.insert("doc_id".to_string(), json!(doc_id));
    payload.insert("kb_id".to_string(), json!("kb"));
    payload.insert("text".to_string(), json!(text));
    payload.insert("filename".to_string(), json!(format!("{}.txt", doc_id)));
    payload
}

async fn seeded_retriever(texts: &[(&str, &str, &str)]) -> Retriever {
    let embedder = Arc::new(HashingEmbedder::new(256).expect("embedder"));
    let index = Arc::new(MemoryVectorIndex::new());
    index.ensure_collection("kb", 256).await.expect("collection");

    let points = texts
        .iter()
        .map(|(id, doc_id, text)| IndexPoint {
            id: (*id).to_string(),
            vector: embedder.embed_text(text),
            payload: payload_for(id, doc_id, text),
        })
        .collect();
    index.upsert("kb", points).await.expect("upsert");

    Retriever::new(embedder, index, &RetrievalConfig::default())
}

#[test]
fn budget_stops_at_first_overflow() {
    let chunks = vec![
        chunk("a", &"a".repeat(50), 0.9),
        chunk("b", &"b".repeat(40), 0.8),
        chunk("c", &"c".repeat(5), 0.7),
    ];

    let kept = apply_context_budget(chunks, 80);

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].chunk_id, "a");
}

#[test]
fn budget_keeps_everything_that_fits() {
    let chunks = vec![chunk("a", "12345", 0.9), chunk("b", "67890", 0.8)];
    assert_eq!(apply_context_budget(chunks, 10).len(), 2);
}

#[test]
fn budget_drops_a_first_result_larger_than_the_budget() {
    let chunks = vec![chunk("a", &"x".repeat(20), 0.9)];
    assert!(apply_context_budget(chunks, 10).is_empty());
}

#[test]
fn snippets_are_capped_with_ellipsis() {
    assert_eq!(make_snippet("short", 400), "short");
    assert_eq!(make_snippet("abcdef", 3), "abc…");
    assert_eq!(make_snippet("ééééé", 5), "ééééé");
    assert_eq!(make_snippet(&"x".repeat(401), 400).chars().count(), 401);
}

#[test]
fn citations_echo_metadata_and_score() {
    let mut retrieved = chunk("a", &"y".repeat(500), 0.42);
    retrieved
        .payload
        .insert("source_type".to_string(), json!("pdf"));

    let citations = build_citations(&[retrieved], 400);

    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0].chunk_id, "a");
    assert_eq!(citations[0].doc_id, "doc");
    assert!((citations[0].score - 0.42).abs() < f32::EPSILON);
    assert!(citations[0].snippet.ends_with('…'));
    assert_eq!(citations[0].metadata.get("source_type"), Some(&json!("pdf")));
}

#[test]
fn source_label_prefers_source_name_then_filename() {
    let mut retrieved = chunk("c1", "text", 1.0);
    assert_eq!(retrieved.source_label(), "c1");

    retrieved
        .payload
        .insert("filename".to_string(), json!("atlas.pdf"));
    assert_eq!(retrieved.source_label(), "atlas.pdf");

    retrieved
        .payload
        .insert("source_name".to_string(), json!("The Atlas"));
    assert_eq!(retrieved.source_label(), "The Atlas");
}

#[tokio::test]
async fn retrieve_ranks_relevant_chunks_first() {
    let retriever = seeded_retriever(&[
        ("c1", "d1", "the lighthouse keeper lit the lamp at dusk"),
        ("c2", "d2", "dragons hoard gold beneath the mountain"),
        ("c3", "d3", "tide tables for the harbor"),
    ])
    .await;

    let results = retriever
        .retrieve("kb", "where do dragons hoard gold", Some(2), None)
        .await
        .expect("retrieve");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk_id, "c2");
    assert_eq!(results[0].doc_id, "d2");
    assert_eq!(results[0].kb_id, "kb");
    assert_eq!(results[0].text, "dragons hoard gold beneath the mountain");
    assert!(results[0].score >= results[1].score);
}

#[tokio::test]
async fn retrieve_honors_filters() {
    let retriever = seeded_retriever(&[
        ("c1", "d1", "dragons hoard gold"),
        ("c2", "d2", "dragons sleep in caves"),
    ])
    .await;

    let filter = PayloadFilter::new().exact("doc_id", "d2");
    let results = retriever
        .retrieve("kb", "dragons hoard gold", None, Some(&filter))
        .await
        .expect("retrieve");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_id, "c2");
}

#[tokio::test]
async fn retrieve_from_unknown_knowledge_base_is_empty() {
    let retriever = seeded_retriever(&[]).await;
    let results = retriever
        .retrieve("other", "anything", None, None)
        .await
        .expect("retrieve");
    assert!(results.is_empty());
}

#[tokio::test]
async fn budgeted_retrieval_uses_configured_limit() {
    let embedder = Arc::new(HashingEmbedder::new(64).expect("embedder"));
    let index = Arc::new(MemoryVectorIndex::new());
    index.ensure_collection("kb", 64).await.expect("collection");
    index
        .upsert(
            "kb",
            vec![
                IndexPoint {
                    id: "long".to_string(),
                    vector: embedder.embed_text("storm"),
                    payload: payload_for("long", "d1", &"storm ".repeat(10)),
                },
                IndexPoint {
                    id: "other".to_string(),
                    vector: embedder.embed_text("calm"),
                    payload: payload_for("other", "d2", "calm"),
                },
            ],
        )
        .await
        .expect("upsert");

    let config = RetrievalConfig {
        max_context_chars: Some(30),
        ..RetrievalConfig::default()
    };
    let retriever = Retriever::new(embedder, index, &config);

    let unbounded = retriever
        .retrieve("kb", "storm", None, None)
        .await
        .expect("retrieve");
    let bounded = retriever
        .retrieve_within_budget("kb", "storm", None, None)
        .await
        .expect("retrieve within budget");

    assert_eq!(unbounded.len(), 2);
    assert!(bounded.is_empty());
}
