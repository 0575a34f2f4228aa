use super::*;
use crate::database::sqlite::Database;
use serde_json::{Map, json};
use tempfile::TempDir;

async fn create_test_database() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let database = Database::initialize_from_config_dir(temp_dir.path()).await?;
    Ok((temp_dir, database))
}

fn new_document(kb_id: &str, filename: &str) -> NewDocument {
    NewDocument {
        id: Uuid::new_v4().to_string(),
        kb_id: kb_id.to_string(),
        filename: filename.to_string(),
        content_type: Some("text/plain".to_string()),
        sha256: "0".repeat(64),
        size_bytes: 10,
        storage_path: "/tmp/files/00/00/0000".to_string(),
        extraction_meta: Map::new(),
        user_meta: Map::new(),
    }
}

fn new_chunk(index: i64, text: &str) -> NewChunk {
    let mut payload = Map::new();
    payload.insert("chunk_index".to_string(), json!(index));
    NewChunk {
        id: Uuid::new_v4().to_string(),
        chunk_index: index,
        text: text.to_string(),
        start_offset: Some(0),
        end_offset: Some(i64::try_from(text.len()).unwrap_or_default()),
        payload,
    }
}

#[tokio::test]
async fn knowledge_base_crud() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    let pool = database.pool();

    let kb = KnowledgeBaseQueries::create(
        pool,
        NewKnowledgeBase {
            name: "Realm".to_string(),
            description: Some("World notes".to_string()),
        },
    )
    .await?;

    assert_eq!(kb.name, "Realm");
    assert_eq!(
        KnowledgeBaseQueries::get_by_id(pool, &kb.id).await?,
        Some(kb.clone())
    );
    assert_eq!(KnowledgeBaseQueries::list_all(pool).await?.len(), 1);

    assert!(KnowledgeBaseQueries::delete(pool, &kb.id).await?);
    assert!(!KnowledgeBaseQueries::delete(pool, &kb.id).await?);
    assert_eq!(KnowledgeBaseQueries::get_by_id(pool, &kb.id).await?, None);

    Ok(())
}

#[tokio::test]
async fn document_with_chunks_round_trip() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    let pool = database.pool();
    let kb = KnowledgeBaseQueries::create(
        pool,
        NewKnowledgeBase {
            name: "Realm".to_string(),
            description: None,
        },
    )
    .await?;

    let mut doc = new_document(&kb.id, "tale.txt");
    doc.user_meta.insert("author".to_string(), json!("Mira"));
    let chunks = vec![new_chunk(1, "second"), new_chunk(0, "first")];

    let created = DocumentQueries::create_with_chunks(pool, &doc, &chunks).await?;

    assert_eq!(created.id, doc.id);
    assert_eq!(created.user_meta.get("author"), Some(&json!("Mira")));

    let listed = ChunkQueries::list_by_document(pool, &doc.id).await?;
    assert_eq!(
        listed.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
        vec!["first", "second"]
    );
    assert_eq!(listed[0].kb_id, kb.id);
    assert_eq!(listed[0].payload.get("chunk_index"), Some(&json!(0)));

    let fetched = ChunkQueries::get_by_id(pool, &chunks[0].id).await?;
    assert_eq!(fetched.map(|c| c.chunk_index), Some(1));

    assert_eq!(ChunkQueries::count_by_document(pool, &doc.id).await?, 2);
    assert_eq!(ChunkQueries::count_by_knowledge_base(pool, &kb.id).await?, 2);
    assert_eq!(
        DocumentQueries::list_by_knowledge_base(pool, &kb.id)
            .await?
            .len(),
        1
    );

    Ok(())
}

#[tokio::test]
async fn duplicate_chunk_index_rolls_back_document() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    let pool = database.pool();
    let kb = KnowledgeBaseQueries::create(
        pool,
        NewKnowledgeBase {
            name: "Realm".to_string(),
            description: None,
        },
    )
    .await?;

    let doc = new_document(&kb.id, "dup.txt");
    let chunks = vec![new_chunk(0, "a"), new_chunk(0, "b")];

    assert!(
        DocumentQueries::create_with_chunks(pool, &doc, &chunks)
            .await
            .is_err()
    );
    assert_eq!(DocumentQueries::get_by_id(pool, &doc.id).await?, None);
    assert_eq!(ChunkQueries::count_by_knowledge_base(pool, &kb.id).await?, 0);

    Ok(())
}

#[tokio::test]
async fn deletes_cascade_to_chunks() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    let pool = database.pool();
    let kb = KnowledgeBaseQueries::create(
        pool,
        NewKnowledgeBase {
            name: "Realm".to_string(),
            description: None,
        },
    )
    .await?;

    let first = new_document(&kb.id, "one.txt");
    let second = new_document(&kb.id, "two.txt");
    DocumentQueries::create_with_chunks(pool, &first, &[new_chunk(0, "a")]).await?;
    DocumentQueries::create_with_chunks(pool, &second, &[new_chunk(0, "b")]).await?;

    assert!(DocumentQueries::delete(pool, &first.id).await?);
    assert_eq!(ChunkQueries::count_by_document(pool, &first.id).await?, 0);
    assert_eq!(ChunkQueries::count_by_knowledge_base(pool, &kb.id).await?, 1);

    assert!(KnowledgeBaseQueries::delete(pool, &kb.id).await?);
    assert_eq!(DocumentQueries::get_by_id(pool, &second.id).await?, None);
    assert_eq!(ChunkQueries::count_by_knowledge_base(pool, &kb.id).await?, 0);

    Ok(())
}

#[tokio::test]
async fn documents_require_existing_knowledge_base() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let orphan = new_document("missing-kb", "lost.txt");
    let result =
        DocumentQueries::create_with_chunks(database.pool(), &orphan, &[new_chunk(0, "x")]).await;

    assert!(result.is_err());
    Ok(())
}
