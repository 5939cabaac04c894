#![allow(dead_code)]

use engram::db;
use engram::embedding::EMBEDDING_DIM;
use engram::memory::store::add_memory;
use engram::memory::types::{NewMemory, Source};
use rusqlite::Connection;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// Deterministic embedding with a spike at position `seed`.
/// Each seed produces a distinct, orthogonal vector.
pub fn test_embedding(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[seed % EMBEDDING_DIM] = 1.0;
    v
}

/// An embedding with high cosine similarity (~0.95) to `test_embedding(seed)`.
pub fn similar_embedding(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[seed % EMBEDDING_DIM] = 0.95;
    v[(seed + 1) % EMBEDDING_DIM] = 0.31;
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter_mut().for_each(|x| *x /= norm);
    v
}

/// Insert a memory with the given content and embedding. Returns the id.
pub fn insert_memory(conn: &mut Connection, content: &str, embedding: &[f32]) -> String {
    add_memory(conn, NewMemory::new(content, Source::Manual), embedding)
        .unwrap()
        .id
}

/// Insert a memory dated `days_ago` days in the past.
pub fn insert_aged_memory(
    conn: &mut Connection,
    content: &str,
    days_ago: u64,
    embedding: &[f32],
) -> String {
    let date = (chrono::Utc::now().date_naive() - chrono::Days::new(days_ago))
        .format("%Y-%m-%d")
        .to_string();
    let mut new = NewMemory::new(content, Source::Manual);
    new.date = Some(date);
    add_memory(conn, new, embedding).unwrap().id
}
