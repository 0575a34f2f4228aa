// Database module
// SQLite holds the records, a vector index holds the embeddings

pub mod lancedb;
pub mod memory;
pub mod sqlite;
pub mod vector;

pub use lancedb::VectorStore;
pub use memory::MemoryVectorIndex;
pub use sqlite::Database;
pub use vector::{
    CollectionStatus, FilterCondition, IndexPoint, Payload, PayloadFilter, ScoredPoint,
    VectorIndex,
};
