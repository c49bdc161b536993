//! Tests for `src/preferences/store.rs`: persistence, exclusivity, and
//! deletion commands.

use skymate::preferences::{PreferenceCategory, PreferenceError, PreferenceStore};

async fn setup_store() -> PreferenceStore {
    let pool = skymate::db::open_in_memory()
        .await
        .expect("in-memory database should open");
    PreferenceStore::new(pool)
}

#[tokio::test]
async fn add_canonicalizes_and_infers_category() {
    let store = setup_store().await;

    let record = store
        .add("alice", None, "I prefer business class")
        .await
        .expect("add should succeed");

    assert_eq!(record.category, PreferenceCategory::CabinClass);
    assert_eq!(record.canonical_text, "Cabin class: Business");
    assert_eq!(record.raw_text, "I prefer business class");
    assert_eq!(record.user_id, "alice");
}

#[tokio::test]
async fn exclusive_category_keeps_only_latest() {
    let store = setup_store().await;

    for text in ["economy class", "business class", "first class"] {
        store
            .add("alice", Some(PreferenceCategory::CabinClass), text)
            .await
            .expect("add should succeed");
    }

    let rows = store
        .list_category("alice", PreferenceCategory::CabinClass)
        .await
        .expect("list should succeed");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].canonical_text, "Cabin class: First");
}

#[tokio::test]
async fn exclusivity_holds_for_every_exclusive_category() {
    let store = setup_store().await;
    let writes = [
        (PreferenceCategory::DepartureTime, "morning departures"),
        (PreferenceCategory::DepartureTime, "avoid evening flights"),
        (PreferenceCategory::TripType, "one-way"),
        (PreferenceCategory::TripType, "round trip"),
        (PreferenceCategory::Passenger, "traveling solo"),
        (PreferenceCategory::Passenger, "with my partner"),
        (PreferenceCategory::CabinClass, "economy class"),
        (PreferenceCategory::CabinClass, "economy class"),
    ];
    for (category, text) in writes {
        store
            .add("alice", Some(category), text)
            .await
            .expect("add should succeed");
    }

    for category in PreferenceCategory::ALL.into_iter().filter(|c| c.is_exclusive()) {
        let rows = store
            .list_category("alice", category)
            .await
            .expect("list should succeed");
        assert!(rows.len() <= 1, "{category:?} has {} rows", rows.len());
    }
    let passenger = store
        .latest("alice", PreferenceCategory::Passenger)
        .await
        .expect("latest should succeed");
    assert_eq!(
        passenger.map(|r| r.canonical_text),
        Some("Travel: With partner".to_owned())
    );
}

#[tokio::test]
async fn non_exclusive_categories_accumulate() {
    let store = setup_store().await;

    store
        .add("alice", Some(PreferenceCategory::Seat), "window seat")
        .await
        .expect("add window");
    store
        .add("alice", Some(PreferenceCategory::Seat), "avoid middle seats")
        .await
        .expect("add middle");

    let rows = store
        .list_category("alice", PreferenceCategory::Seat)
        .await
        .expect("list should succeed");
    let texts: Vec<&str> = rows.iter().map(|r| r.canonical_text.as_str()).collect();
    assert_eq!(texts, vec!["Seat: Avoid middle", "Seat: Window"]);
}

#[tokio::test]
async fn users_are_isolated() {
    let store = setup_store().await;

    store
        .add("alice", Some(PreferenceCategory::CabinClass), "business class")
        .await
        .expect("add alice");
    store
        .add("bob", Some(PreferenceCategory::CabinClass), "economy class")
        .await
        .expect("add bob");

    let alice = store.list("alice").await.expect("list alice");
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].canonical_text, "Cabin class: Business");
}

#[tokio::test]
async fn blank_and_oversized_input_is_rejected() {
    let store = setup_store().await;

    let blank = store.add("alice", None, "   ").await;
    assert!(matches!(blank, Err(PreferenceError::EmptyText)));

    let huge = "x".repeat(skymate::preferences::MAX_PREFERENCE_SIZE + 1);
    let too_large = store.add("alice", None, &huge).await;
    assert!(matches!(too_large, Err(PreferenceError::TooLarge { .. })));

    assert!(store.list("alice").await.expect("list").is_empty());
}

#[tokio::test]
async fn stored_wrapper_text_is_stripped() {
    let store = setup_store().await;

    let record = store
        .add("alice", None, "Travel Preference: aisle seat (Type: seat)")
        .await
        .expect("add should succeed");

    assert_eq!(record.category, PreferenceCategory::Seat);
    assert_eq!(record.canonical_text, "Seat: Aisle");
}

#[tokio::test]
async fn delete_matching_accepts_raw_or_canonical_text() {
    let store = setup_store().await;

    store
        .add("alice", None, "I prefer business class")
        .await
        .expect("add cabin");
    store.add("alice", None, "window seat").await.expect("add seat");

    let removed = store
        .delete_matching("alice", "business class")
        .await
        .expect("delete should succeed");
    assert_eq!(removed, 1);

    let removed = store
        .delete_matching("alice", "SEAT: WINDOW")
        .await
        .expect("delete should succeed");
    assert_eq!(removed, 1);

    assert!(store.list("alice").await.expect("list").is_empty());
}

#[tokio::test]
async fn delete_by_id_and_category_and_all() {
    let store = setup_store().await;

    let seat = store.add("alice", None, "window seat").await.expect("seat");
    store.add("alice", None, "aisle seat").await.expect("seat 2");
    store.add("alice", None, "no layovers").await.expect("stops");
    store.add("alice", None, "avoid red-eye").await.expect("red-eye");
    store.add("bob", None, "window seat").await.expect("bob");

    assert!(store.delete_by_id("alice", &seat.id).await.expect("by id"));
    assert!(!store.delete_by_id("alice", &seat.id).await.expect("by id again"));
    assert!(!store.delete_by_id("bob", "missing").await.expect("unknown id"));

    let removed = store
        .delete_category("alice", PreferenceCategory::Seat)
        .await
        .expect("by category");
    assert_eq!(removed, 1);

    let removed = store.clear_all("alice").await.expect("clear all");
    assert_eq!(removed, 2);

    assert!(store.list("alice").await.expect("list alice").is_empty());
    assert_eq!(store.list("bob").await.expect("list bob").len(), 1);
}

#[tokio::test]
async fn list_is_newest_first() {
    let store = setup_store().await;

    store.add("alice", None, "window seat").await.expect("first");
    store.add("alice", None, "carry-on only").await.expect("second");
    store.add("alice", None, "no layovers").await.expect("third");

    let texts: Vec<String> = store
        .list("alice")
        .await
        .expect("list")
        .into_iter()
        .map(|r| r.canonical_text)
        .collect();
    assert_eq!(
        texts,
        vec!["Stops: Avoid layovers", "Baggage: Carry-on only", "Seat: Window"]
    );
}

#[tokio::test]
async fn on_disk_database_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("skymate.db");

    {
        let pool = skymate::db::open(&path, 2).await.expect("open");
        let store = PreferenceStore::new(pool.clone());
        store.add("alice", None, "window seat").await.expect("add");
        pool.close().await;
    }

    let pool = skymate::db::open(&path, 2).await.expect("reopen");
    let store = PreferenceStore::new(pool);
    let rows = store.list("alice").await.expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].canonical_text, "Seat: Window");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_exclusive_writes_leave_one_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = skymate::db::open(&dir.path().join("prefs.db"), 4)
        .await
        .expect("on-disk database should open");
    let store = PreferenceStore::new(pool);

    let texts = ["economy class", "business class", "first class", "premium economy class"];
    let handles: Vec<_> = (0..40)
        .map(|i| {
            let store = store.clone();
            let text = texts[i % texts.len()];
            tokio::spawn(async move {
                store
                    .add_superseding("alice", Some(PreferenceCategory::CabinClass), text)
                    .await
            })
        })
        .collect();

    let mut replaced_counts = Vec::new();
    for handle in handles {
        let (_, replaced) = handle
            .await
            .expect("task should not panic")
            .expect("concurrent add should succeed");
        replaced_counts.push(replaced.len());
    }

    let rows = store
        .list_category("alice", PreferenceCategory::CabinClass)
        .await
        .expect("list should succeed");
    assert_eq!(rows.len(), 1);
    // Every write but the first superseded exactly one live row.
    assert_eq!(replaced_counts.iter().sum::<usize>(), 39);
}

#[tokio::test]
async fn add_superseding_returns_replaced_rows() {
    let store = setup_store().await;
    let (first, replaced) = store
        .add_superseding("alice", None, "economy class")
        .await
        .expect("first add");
    assert!(replaced.is_empty());

    let (_, replaced) = store
        .add_superseding("alice", None, "business class")
        .await
        .expect("second add");
    let replaced_ids: Vec<&str> = replaced.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(replaced_ids, vec![first.id.as_str()]);

    let (_, replaced) = store
        .add_superseding("alice", None, "window seat")
        .await
        .expect("non-exclusive add");
    assert!(replaced.is_empty());
}

#[tokio::test]
async fn get_is_scoped_to_user() {
    let store = setup_store().await;
    let record = store.add("alice", None, "aisle seat").await.expect("add");

    let found = store.get("alice", &record.id).await.expect("get");
    assert_eq!(found.map(|r| r.canonical_text), Some("Seat: Aisle".to_owned()));
    assert!(store.get("bob", &record.id).await.expect("get").is_none());
}
