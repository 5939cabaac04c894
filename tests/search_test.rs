mod helpers;

use helpers::{insert_memory, test_db};

use engram::config::RetrievalConfig;
use engram::embedding::hashed::HashedEmbeddingProvider;
use engram::embedding::EmbeddingProvider;
use engram::memory::search::{search, SearchParams};
use engram::memory::store::add_memory;
use engram::memory::types::{NewMemory, Source};

fn config() -> RetrievalConfig {
    RetrievalConfig::default()
}

/// Add followed by search with the exact content retrieves that record with
/// near-1.0 similarity.
#[test]
fn self_retrieval_property() {
    let mut conn = test_db();
    let provider = HashedEmbeddingProvider::new();

    let contents = [
        "Implemented exponential backoff for the sync client",
        "Rewrote the CSV importer to stream rows instead of buffering",
        "Chased down a timezone bug in the report scheduler",
    ];
    let mut ids = Vec::new();
    for content in &contents {
        let emb = provider.embed(content).unwrap();
        ids.push(insert_memory(&mut conn, content, &emb));
    }

    for (content, id) in contents.iter().zip(&ids) {
        let query_emb = provider.embed(content).unwrap();
        let params = SearchParams::new(*content, &config());
        let hits = search(&conn, &query_emb, &params, &config()).unwrap();
        assert!(!hits.is_empty(), "no hit for {content:?}");
        assert_eq!(&hits[0].id, id);
        assert!(
            hits[0].similarity > 0.99,
            "self-similarity was {}",
            hits[0].similarity
        );
    }
}

/// A threshold above any achievable similarity always yields zero results.
#[test]
fn unreachable_threshold_yields_empty() {
    let mut conn = test_db();
    let provider = HashedEmbeddingProvider::new();
    let content = "Stored entry that can never pass the threshold";
    let emb = provider.embed(content).unwrap();
    insert_memory(&mut conn, content, &emb);

    let mut params = SearchParams::new(content, &config());
    params.similarity_threshold = 1.1;
    let hits = search(&conn, &emb, &params, &config()).unwrap();
    assert!(hits.is_empty());
}

/// The documented retrieval scenario, end to end with real embeddings.
#[test]
fn null_pointer_auth_scenario() {
    let mut conn = test_db();
    let provider = HashedEmbeddingProvider::new();

    let content = "Fixed null pointer in auth module by adding a guard clause";
    let emb = provider.embed(content).unwrap();
    let mut new = NewMemory::new(content, Source::Manual);
    new.title = Some("Auth Fix".into());
    new.technologies = vec!["auth".into()];
    let id = add_memory(&mut conn, new, &emb).unwrap().id;

    // Distractor
    let other = "Tweaked css spacing on the dashboard cards";
    let other_emb = provider.embed(other).unwrap();
    insert_memory(&mut conn, other, &other_emb);

    let query_emb = provider.embed("null pointer auth").unwrap();
    let mut params = SearchParams::new("null pointer auth", &config());
    params.max_results = 3;
    params.similarity_threshold = 0.3;
    let hits = search(&conn, &query_emb, &params, &config()).unwrap();

    assert!(hits.len() >= 1);
    assert_eq!(hits[0].id, id);
    assert_eq!(hits[0].title, "Auth Fix");
}

/// Retrieval never mutates records.
#[test]
fn search_is_read_only() {
    let mut conn = test_db();
    let provider = HashedEmbeddingProvider::new();
    let content = "Read only retrieval check";
    let emb = provider.embed(content).unwrap();
    let id = insert_memory(&mut conn, content, &emb);

    let before = engram::memory::store::get_memory(&conn, &id).unwrap();
    let params = SearchParams::new(content, &config());
    search(&conn, &emb, &params, &config()).unwrap();
    let after = engram::memory::store::get_memory(&conn, &id).unwrap();

    assert_eq!(before.updated_at, after.updated_at);
    assert_eq!(before.quality_score, after.quality_score);
}
