//! Tests for `src/memory/search.rs`: recency listing and FTS5 search.

use skymate::memory::{MemoryBackend, MemoryEngine};

async fn seeded_engine() -> MemoryEngine {
    let pool = skymate::db::open_in_memory()
        .await
        .expect("in-memory database should open");
    let engine = MemoryEngine::new(pool);
    for (user, content) in [
        ("alice", "prefers window seats on long flights"),
        ("alice", "booked JFK -> LHR in March"),
        ("alice", "avoids red-eye departures"),
        ("bob", "prefers window seats too"),
    ] {
        engine.remember(user, content).await.expect("save should succeed");
    }
    engine.flush().await.expect("flush should succeed");
    engine
}

#[tokio::test]
async fn recall_is_newest_first_and_limited() {
    let engine = seeded_engine().await;

    let all = engine.recall("alice", 10).await.expect("recall");
    assert_eq!(
        all,
        vec![
            "avoids red-eye departures",
            "booked JFK -> LHR in March",
            "prefers window seats on long flights",
        ]
    );

    let limited = engine.recall("alice", 1).await.expect("recall");
    assert_eq!(limited, vec!["avoids red-eye departures"]);
}

#[tokio::test]
async fn search_matches_words_for_one_user() {
    let engine = seeded_engine().await;

    let hits = engine.search("alice", "window", 10).await.expect("search");
    assert_eq!(hits, vec!["prefers window seats on long flights"]);

    let bob = engine.search("bob", "window", 10).await.expect("search");
    assert_eq!(bob, vec!["prefers window seats too"]);
}

#[tokio::test]
async fn search_tolerates_fts_operators() {
    let engine = seeded_engine().await;

    let hits = engine
        .search("alice", "red-eye OR \"departures\"", 10)
        .await
        .expect("operators must not cause a syntax error");
    assert_eq!(hits, vec!["avoids red-eye departures"]);

    let none = engine.search("alice", "NOT AND", 10).await.expect("search");
    assert!(none.is_empty());
}

#[tokio::test]
async fn deleted_memories_leave_the_index() {
    let engine = seeded_engine().await;

    engine.forget("alice", "window seats").await.expect("forget");
    engine.flush().await.expect("flush should succeed");

    assert!(engine.search("alice", "window", 10).await.expect("search").is_empty());
}
