//! End-to-end tests of the preference engine: learn, resolve, compile,
//! search, filter, rank.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use skymate::config::SkymateConfig;
use skymate::engine::{FlightSearch, PreferenceEngine, SearchError};
use skymate::flights::offer::{Endpoint, Itinerary, Price, Segment};
use skymate::flights::{FilterSpec, FlightOffer, OfferTag, SearchParams, SearchRequest, TravelClass};
use skymate::memory::{MemoryBackend, MemoryEngine};
use skymate::preferences::{PreferenceCategory, PreferenceStore, UiPreferences};

/// Returns canned offers and records the parameters it was called with.
struct StubSearch {
    offers: Vec<FlightOffer>,
    error: Option<String>,
    calls: Mutex<Vec<SearchParams>>,
}

impl StubSearch {
    fn returning(offers: Vec<FlightOffer>) -> Self {
        Self {
            offers,
            error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            offers: Vec::new(),
            error: Some(message.to_owned()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn last_params(&self) -> SearchParams {
        let calls = self.calls.lock().expect("lock");
        calls.last().cloned().expect("search should have been called")
    }
}

#[async_trait]
impl FlightSearch for StubSearch {
    async fn search(
        &self,
        params: &SearchParams,
        _filter: &FilterSpec,
    ) -> Result<Vec<FlightOffer>, SearchError> {
        self.calls.lock().expect("lock").push(params.clone());
        match &self.error {
            Some(message) => Err(SearchError::Upstream(message.clone())),
            None => Ok(self.offers.clone()),
        }
    }
}

fn offer(id: &str, carrier: &str, price: &str, duration: &str, hour: u32) -> FlightOffer {
    FlightOffer {
        id: id.to_owned(),
        price: Some(Price {
            total: price.to_owned(),
            currency: "USD".to_owned(),
        }),
        itineraries: vec![Itinerary {
            duration: Some(duration.to_owned()),
            segments: vec![Segment {
                departure: Endpoint {
                    iata_code: "JFK".to_owned(),
                    at: Some(format!("2026-03-15T{hour:02}:00:00")),
                },
                arrival: Endpoint {
                    iata_code: "LHR".to_owned(),
                    at: None,
                },
                carrier_code: carrier.to_owned(),
                carrier_name: None,
                number: None,
                number_of_stops: 0,
            }],
        }],
        travel_class: None,
        tags: Vec::new(),
    }
}

fn request() -> SearchRequest {
    SearchRequest {
        origin: "JFK".to_owned(),
        destination: "LHR".to_owned(),
        departure_date: "2026-03-15".to_owned(),
        ..SearchRequest::default()
    }
}

async fn setup_engine() -> (PreferenceEngine, Arc<MemoryEngine>) {
    let pool = skymate::db::open_in_memory()
        .await
        .expect("in-memory database should open");
    let memory = Arc::new(MemoryEngine::new(pool.clone()));
    let engine = PreferenceEngine::new(PreferenceStore::new(pool))
        .with_memory(Arc::clone(&memory) as Arc<dyn MemoryBackend>, 50);
    (engine, memory)
}

#[tokio::test]
async fn learning_persists_canonical_preferences() {
    let (engine, memory) = setup_engine().await;

    let stored = engine
        .learn_from_message("alice", "I want a window seat and I hate red-eye flights")
        .await
        .expect("learn should succeed");
    let texts: Vec<&str> = stored.iter().map(|r| r.canonical_text.as_str()).collect();
    assert_eq!(texts, vec!["Seat: Window", "Red-eye: Avoid"]);

    memory.flush().await.expect("flush");
    let mirrored = memory.recall("alice", 10).await.expect("recall");
    assert!(mirrored.contains(&"Travel Preference: Seat: Window (Type: seat)".to_owned()));
}

#[tokio::test]
async fn transient_budget_words_are_not_learned() {
    let (engine, _memory) = setup_engine().await;

    let stored = engine
        .learn_from_message("alice", "looking for cheap flights")
        .await
        .expect("learn should succeed");
    assert!(stored.is_empty());

    let stored = engine
        .learn_from_message("alice", "I'm on a tight budget")
        .await
        .expect("learn should succeed");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].category, PreferenceCategory::Budget);
}

#[tokio::test]
async fn relearning_an_exclusive_category_replaces_it() {
    let (engine, _memory) = setup_engine().await;

    engine
        .learn_from_message("alice", "I usually fly economy")
        .await
        .expect("learn economy");
    engine
        .learn_from_message("alice", "this time business class please")
        .await
        .expect("learn business");

    let cabin: Vec<String> = engine
        .preferences("alice")
        .await
        .expect("list")
        .into_iter()
        .filter(|r| r.category == PreferenceCategory::CabinClass)
        .map(|r| r.canonical_text)
        .collect();
    assert_eq!(cabin, vec!["Cabin class: Business"]);
}

#[tokio::test]
async fn ui_cabin_wins_in_the_search_plan() {
    let (engine, _memory) = setup_engine().await;
    engine.remember("alice", "economy class").await.expect("remember");

    let ui = UiPreferences {
        cabin_class: Some("Business".to_owned()),
        ..UiPreferences::default()
    };
    let (params, _) = engine
        .plan_search("alice", &request(), &ui)
        .await
        .expect("plan");
    assert_eq!(params.travel_class, Some(TravelClass::Business));
}

#[tokio::test]
async fn search_applies_stored_preferences_then_ranks() {
    let (engine, _memory) = setup_engine().await;
    engine
        .learn_from_message("alice", "I don't like Delta and I avoid red-eye flights")
        .await
        .expect("learn");
    engine.remember("alice", "direct flights").await.expect("remember");

    let searcher = StubSearch::returning(vec![
        offer("dl", "DL", "200", "PT6H", 9),
        offer("late", "UA", "250", "PT6H", 23),
        offer("ua", "UA", "450", "PT6H30M", 10),
        offer("ba", "BA", "500", "PT5H", 14),
    ]);
    let outcome = engine
        .search_flights("alice", &request(), &UiPreferences::default(), &searcher)
        .await
        .expect("search should succeed");

    let params = searcher.last_params();
    assert!(params.non_stop);
    assert_eq!(outcome.returned, 4);
    assert!(outcome.error.is_none());

    let ids: Vec<&str> = outcome.offers.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["ua", "ba"]);
    assert!(outcome.offers[0].has_tag(OfferTag::Cheapest));
    assert!(outcome.offers[1].has_tag(OfferTag::Fastest));
}

#[tokio::test]
async fn explicit_non_stop_false_overrides_direct_preference() {
    let (engine, _memory) = setup_engine().await;
    engine.remember("alice", "no layovers").await.expect("remember");

    let req = SearchRequest {
        non_stop: Some(false),
        ..request()
    };
    let (params, filter) = engine
        .plan_search("alice", &req, &UiPreferences::default())
        .await
        .expect("plan");
    assert!(!params.non_stop);
    assert_eq!(filter.max_stops, None);
}

#[tokio::test]
async fn upstream_failure_yields_empty_offers_and_error() {
    let (engine, _memory) = setup_engine().await;
    let searcher = StubSearch::failing("rate limited");

    let outcome = engine
        .search_flights("alice", &request(), &UiPreferences::default(), &searcher)
        .await
        .expect("upstream failure is not an engine error");

    assert!(outcome.offers.is_empty());
    assert_eq!(outcome.returned, 0);
    let error = outcome.error.expect("error should be reported");
    assert!(error.contains("rate limited"), "{error}");
}

#[tokio::test]
async fn forgetting_clears_store_and_memory() {
    let (engine, memory) = setup_engine().await;
    engine.remember("alice", "window seat").await.expect("seat");
    engine.remember("alice", "no red-eye").await.expect("red-eye");

    let removed = engine.forget("alice", "window seat").await.expect("forget");
    assert_eq!(removed, 1);
    memory.flush().await.expect("flush");
    let left = memory.recall("alice", 10).await.expect("recall");
    assert_eq!(left, vec!["Travel Preference: Red-eye: Avoid (Type: red_eye)"]);

    let removed = engine
        .forget_category("alice", PreferenceCategory::RedEye)
        .await
        .expect("forget category");
    assert_eq!(removed, 1);
    memory.flush().await.expect("flush");
    assert!(memory.recall("alice", 10).await.expect("recall").is_empty());

    engine.remember("alice", "aisle seat").await.expect("aisle");
    assert_eq!(engine.forget_all("alice").await.expect("forget all"), 1);
    memory.flush().await.expect("flush");
    assert!(engine.preferences("alice").await.expect("list").is_empty());
    assert!(memory.recall("alice", 10).await.expect("recall").is_empty());
}

#[tokio::test]
async fn memory_layer_fills_gaps_when_store_is_empty() {
    let (engine, memory) = setup_engine().await;
    memory
        .remember("alice", "Travel Preference: morning departures (Type: departure_time)")
        .await
        .expect("seed memory");
    memory.flush().await.expect("flush");

    let resolved = engine
        .resolve("alice", &UiPreferences::default())
        .await
        .expect("resolve");
    assert_eq!(
        resolved.first(PreferenceCategory::DepartureTime),
        Some("Departure time: Morning")
    );
}

#[tokio::test]
async fn memory_disabled_by_config_is_ignored() {
    let pool = skymate::db::open_in_memory()
        .await
        .expect("in-memory database should open");
    let memory = Arc::new(MemoryEngine::new(pool.clone()));
    memory
        .remember("alice", "Travel Preference: business class (Type: cabin_class)")
        .await
        .expect("seed memory");
    memory.flush().await.expect("flush");

    let mut config = SkymateConfig::default();
    config.memory.enabled = false;
    let engine = PreferenceEngine::from_config(
        PreferenceStore::new(pool),
        Some(Arc::clone(&memory) as Arc<dyn MemoryBackend>),
        &config,
    );

    let resolved = engine
        .resolve("alice", &UiPreferences::default())
        .await
        .expect("resolve");
    assert!(resolved.is_empty());
    assert!(engine.search_memory("alice", "business", 5).await.is_empty());
}

#[tokio::test]
async fn search_memory_finds_mirrored_preferences() {
    let (engine, memory) = setup_engine().await;
    engine.remember("alice", "aisle seat").await.expect("remember");
    memory.flush().await.expect("flush");

    let hits = engine.search_memory("alice", "aisle", 5).await;
    assert_eq!(hits, vec!["Travel Preference: Seat: Aisle (Type: seat)"]);
}

#[tokio::test]
async fn forget_by_id_also_removes_the_memory_copy() {
    let (engine, memory) = setup_engine().await;
    let record = engine.remember("alice", "business class").await.expect("remember");

    assert!(engine.forget_by_id("alice", &record.id).await.expect("forget by id"));
    assert!(!engine.forget_by_id("alice", &record.id).await.expect("second forget"));
    memory.flush().await.expect("flush");

    assert!(memory.recall("alice", 10).await.expect("recall").is_empty());
    let resolved = engine
        .resolve("alice", &UiPreferences::default())
        .await
        .expect("resolve");
    assert!(!resolved.contains(PreferenceCategory::CabinClass));
}

#[tokio::test]
async fn superseded_exclusive_value_does_not_return_from_memory() {
    let (engine, memory) = setup_engine().await;
    engine.remember("alice", "business class").await.expect("business");
    engine.remember("alice", "economy class").await.expect("economy");
    memory.flush().await.expect("flush");

    let mirrored = memory.recall("alice", 10).await.expect("recall");
    assert_eq!(
        mirrored,
        vec!["Travel Preference: Cabin class: Economy (Type: cabin_class)"]
    );

    assert_eq!(engine.forget("alice", "economy class").await.expect("forget"), 1);
    memory.flush().await.expect("flush");

    let resolved = engine
        .resolve("alice", &UiPreferences::default())
        .await
        .expect("resolve");
    assert!(!resolved.contains(PreferenceCategory::CabinClass));
    let (params, _) = engine
        .plan_search("alice", &request(), &UiPreferences::default())
        .await
        .expect("plan");
    assert_eq!(params.travel_class, None);
}

#[tokio::test]
async fn learned_supersede_keeps_one_memory_copy() {
    let (engine, memory) = setup_engine().await;
    engine
        .learn_from_message("alice", "I usually fly economy")
        .await
        .expect("learn economy");
    engine
        .learn_from_message("alice", "this time business class please")
        .await
        .expect("learn business");
    memory.flush().await.expect("flush");

    let cabin_copies: Vec<String> = memory
        .recall("alice", 10)
        .await
        .expect("recall")
        .into_iter()
        .filter(|m| m.contains("(Type: cabin_class)"))
        .collect();
    assert_eq!(
        cabin_copies,
        vec!["Travel Preference: Cabin class: Business (Type: cabin_class)"]
    );
}
