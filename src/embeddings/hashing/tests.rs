use super::*;

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn rejects_zero_dimension() {
    assert!(HashingEmbedder::new(0).is_err());
}

#[test]
fn vectors_have_configured_dimension_and_unit_length() {
    let embedder = HashingEmbedder::new(384).expect("embedder");
    let vector = embedder.embed_text("The keeper trimmed the lamp wick at dusk.");

    assert_eq!(vector.len(), 384);
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}

#[test]
fn identical_text_is_deterministic() {
    let embedder = HashingEmbedder::new(128).expect("embedder");
    assert_eq!(
        embedder.embed_text("Harbor lights"),
        embedder.embed_text("Harbor lights")
    );
}

#[test]
fn case_and_punctuation_are_ignored() {
    let embedder = HashingEmbedder::new(128).expect("embedder");
    assert_eq!(
        embedder.embed_text("Harbor, LIGHTS!"),
        embedder.embed_text("harbor lights")
    );
}

#[test]
fn shared_words_score_higher_than_unrelated_text() {
    let embedder = HashingEmbedder::new(384).expect("embedder");
    let query = embedder.embed_text("dragon hoard gold");
    let related = embedder.embed_text("the dragon sleeps on a hoard of gold coins");
    let unrelated = embedder.embed_text("tide tables for the northern harbor");

    assert!(cosine(&query, &related) > cosine(&query, &unrelated));
}

#[test]
fn empty_text_yields_zero_vector() {
    let embedder = HashingEmbedder::new(16).expect("embedder");
    assert!(embedder.embed_text("  ...  ").iter().all(|v| *v == 0.0));
}

#[tokio::test]
async fn batch_preserves_order() {
    let embedder = HashingEmbedder::new(64).expect("embedder");
    let texts = vec!["first".to_string(), "second".to_string()];

    let vectors = embedder.embed(&texts).await.expect("embed");

    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[0], embedder.embed_text("first"));
    assert_eq!(vectors[1], embedder.embed_text("second"));
}
