//! Request-scoped orchestration of the preference and flight pipeline.
//!
//! Write path: utterance -> extractor -> call-site budget filter -> store.
//! Read path: resolver -> compiler -> [`FlightSearch`] -> filter -> ranker.
//!
//! The engine owns no per-request state. Fuzzy memory receives best-effort
//! mirror writes; its failures are logged and never surface to callers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::SkymateConfig;
use crate::flights::{
    compile_with, filter_offers, rank_offers, FilterSpec, FlightOffer, PassengerDefaults,
    RankingWeights, SearchParams, SearchRequest,
};
use crate::memory::MemoryBackend;
use crate::preferences::{
    persistable_preferences, PatternExtractor, PreferenceCategory, PreferenceError,
    PreferenceRecord, PreferenceStore, ResolvedPreferences, Resolver, UiPreferences,
};

// ---------------------------------------------------------------------------
// Flight search seam
// ---------------------------------------------------------------------------

/// Errors reported by a flight-search collaborator.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The upstream API failed or returned an error.
    #[error("flight search failed: {0}")]
    Upstream(String),

    /// The request was rejected before reaching the upstream.
    #[error("invalid search request: {0}")]
    InvalidRequest(String),
}

/// External flight-search collaborator.
///
/// Implementations own their timeout and retry policy.
#[async_trait]
pub trait FlightSearch: Send + Sync {
    /// Search for offers. `filter` is advisory; the engine filters again.
    async fn search(
        &self,
        params: &SearchParams,
        filter: &FilterSpec,
    ) -> Result<Vec<FlightOffer>, SearchError>;
}

/// Result of a preference-aware search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    /// Parameters sent upstream.
    pub params: SearchParams,
    /// Filter applied to the returned offers.
    pub filter: FilterSpec,
    /// Filtered, tagged offers. Empty on upstream failure.
    pub offers: Vec<FlightOffer>,
    /// Offers returned upstream before filtering.
    pub returned: usize,
    /// Upstream error, if the search failed.
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Preference resolution and flight ranking engine.
pub struct PreferenceEngine {
    store: PreferenceStore,
    memory: Option<Arc<dyn MemoryBackend>>,
    extractor: PatternExtractor,
    weights: RankingWeights,
    passengers: PassengerDefaults,
    recall_limit: usize,
}

impl std::fmt::Debug for PreferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceEngine")
            .field("memory", &self.memory.is_some())
            .field("weights", &self.weights)
            .finish_non_exhaustive()
    }
}

impl PreferenceEngine {
    /// Engine over a structured store with default settings and no fuzzy memory.
    pub fn new(store: PreferenceStore) -> Self {
        Self {
            store,
            memory: None,
            extractor: PatternExtractor::new(),
            weights: RankingWeights::default(),
            passengers: PassengerDefaults::default(),
            recall_limit: 50,
        }
    }

    /// Engine configured from `config`. Memory is attached only when enabled.
    pub fn from_config(
        store: PreferenceStore,
        memory: Option<Arc<dyn MemoryBackend>>,
        config: &SkymateConfig,
    ) -> Self {
        let mut engine = Self::new(store)
            .with_weights(config.ranking.weights())
            .with_passengers(config.search.passengers());
        if let Some(memory) = memory.filter(|_| config.memory.enabled) {
            engine = engine.with_memory(memory, config.memory.recall_limit);
        }
        engine
    }

    /// Attach the fuzzy memory layer.
    pub fn with_memory(mut self, memory: Arc<dyn MemoryBackend>, recall_limit: usize) -> Self {
        self.memory = Some(memory);
        self.recall_limit = recall_limit;
        self
    }

    /// Override ranking weights.
    pub fn with_weights(mut self, weights: RankingWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Override passenger defaults.
    pub fn with_passengers(mut self, passengers: PassengerDefaults) -> Self {
        self.passengers = passengers;
        self
    }

    /// The structured store.
    pub fn store(&self) -> &PreferenceStore {
        &self.store
    }

    /// The pattern extractor.
    pub fn extractor(&self) -> &PatternExtractor {
        &self.extractor
    }

    // -- write path ---------------------------------------------------------

    /// Extract preferences from a chat message and persist them.
    ///
    /// Budget labels without a stable marker ("tight budget", "as cheap as
    /// possible") are dropped before storage.
    #[instrument(skip(self, message))]
    pub async fn learn_from_message(
        &self,
        user_id: &str,
        message: &str,
    ) -> Result<Vec<PreferenceRecord>, PreferenceError> {
        let extracted = self.extractor.extract_detailed(message);
        let candidates = extracted.len();
        let persistable = persistable_preferences(message, extracted);
        if persistable.len() < candidates {
            debug!(dropped = candidates.saturating_sub(persistable.len()), "transient preferences not persisted");
        }

        let mut stored = Vec::with_capacity(persistable.len());
        for item in persistable {
            let (record, replaced) = self
                .store
                .add_superseding(user_id, Some(item.category), &item.label)
                .await?;
            self.mirror_supersede(&record, &replaced).await;
            stored.push(record);
        }
        Ok(stored)
    }

    /// Persist an explicit preference statement, inferring its category.
    #[instrument(skip(self, preference))]
    pub async fn remember(
        &self,
        user_id: &str,
        preference: &str,
    ) -> Result<PreferenceRecord, PreferenceError> {
        let (record, replaced) = self.store.add_superseding(user_id, None, preference).await?;
        self.mirror_supersede(&record, &replaced).await;
        Ok(record)
    }

    /// Stored preferences, newest first.
    pub async fn preferences(&self, user_id: &str) -> Result<Vec<PreferenceRecord>, PreferenceError> {
        self.store.list(user_id).await
    }

    /// Forget preferences matching `text` (raw or canonical form).
    pub async fn forget(&self, user_id: &str, text: &str) -> Result<u64, PreferenceError> {
        let removed = self.store.delete_matching(user_id, text).await?;
        let canonical = crate::preferences::canonicalize(&crate::preferences::strip_wrappers(text));
        self.mirror_forget(user_id, &canonical).await;
        Ok(removed)
    }

    /// Forget one preference by id.
    pub async fn forget_by_id(&self, user_id: &str, id: &str) -> Result<bool, PreferenceError> {
        let Some(record) = self.store.get(user_id, id).await? else {
            return Ok(false);
        };
        let removed = self.store.delete_by_id(user_id, id).await?;
        if removed {
            self.mirror_forget(user_id, &record.canonical_text).await;
        }
        Ok(removed)
    }

    /// Forget every preference of a category.
    pub async fn forget_category(
        &self,
        user_id: &str,
        category: PreferenceCategory,
    ) -> Result<u64, PreferenceError> {
        let records = self.store.list_category(user_id, category).await?;
        let removed = self.store.delete_category(user_id, category).await?;
        for record in records {
            self.mirror_forget(user_id, &record.canonical_text).await;
        }
        Ok(removed)
    }

    /// Forget everything about a user's preferences, fuzzy memory included.
    pub async fn forget_all(&self, user_id: &str) -> Result<u64, PreferenceError> {
        let removed = self.store.clear_all(user_id).await?;
        if let Some(memory) = &self.memory {
            if let Err(err) = memory.forget_all(user_id).await {
                warn!(user_id, error = %err, "failed to clear fuzzy memory");
            }
        }
        Ok(removed)
    }

    // -- read path ----------------------------------------------------------

    /// Resolve preferences for one request.
    #[instrument(skip(self, ui))]
    pub async fn resolve(
        &self,
        user_id: &str,
        ui: &UiPreferences,
    ) -> Result<ResolvedPreferences, PreferenceError> {
        let mut resolver = Resolver::new(&self.store);
        if let Some(memory) = &self.memory {
            resolver = resolver.with_memory(memory.as_ref(), self.recall_limit);
        }
        resolver.resolve(user_id, ui).await
    }

    /// Resolve and compile without searching.
    pub async fn plan_search(
        &self,
        user_id: &str,
        request: &SearchRequest,
        ui: &UiPreferences,
    ) -> Result<(SearchParams, FilterSpec), PreferenceError> {
        let resolved = self.resolve(user_id, ui).await?;
        Ok(compile_with(request, &resolved, &self.passengers))
    }

    /// Run a preference-aware search: resolve, compile, search, filter, rank.
    ///
    /// Upstream failure is reported in [`SearchOutcome::error`] with no offers.
    ///
    /// # Errors
    ///
    /// Returns an error only if the structured store cannot be read.
    #[instrument(skip(self, request, ui, searcher))]
    pub async fn search_flights(
        &self,
        user_id: &str,
        request: &SearchRequest,
        ui: &UiPreferences,
        searcher: &dyn FlightSearch,
    ) -> Result<SearchOutcome, PreferenceError> {
        let (params, filter) = self.plan_search(user_id, request, ui).await?;

        match searcher.search(&params, &filter).await {
            Ok(offers) => {
                let returned = offers.len();
                let offers = self.filter_and_rank(offers, &filter);
                info!(returned, kept = offers.len(), "flight search complete");
                Ok(SearchOutcome {
                    params,
                    filter,
                    offers,
                    returned,
                    error: None,
                })
            }
            Err(err) => {
                warn!(error = %err, "flight search failed");
                Ok(SearchOutcome {
                    params,
                    filter,
                    offers: Vec::new(),
                    returned: 0,
                    error: Some(err.to_string()),
                })
            }
        }
    }

    /// Filter then rank offers with the engine's weights.
    pub fn filter_and_rank(&self, offers: Vec<FlightOffer>, filter: &FilterSpec) -> Vec<FlightOffer> {
        let mut offers = filter_offers(offers, filter);
        rank_offers(&mut offers, &self.weights);
        offers
    }

    /// Full-text search over the user's fuzzy memory. Empty when disabled
    /// or unavailable.
    pub async fn search_memory(&self, user_id: &str, query: &str, limit: usize) -> Vec<String> {
        let Some(memory) = &self.memory else {
            return Vec::new();
        };
        match memory.search(user_id, query, limit).await {
            Ok(found) => found,
            Err(err) => {
                warn!(user_id, error = %err, "fuzzy memory search failed");
                Vec::new()
            }
        }
    }

    // -- fuzzy mirror -------------------------------------------------------

    async fn mirror_remember(&self, record: &PreferenceRecord) {
        let Some(memory) = &self.memory else {
            return;
        };
        let content = format!(
            "Travel Preference: {} (Type: {})",
            record.canonical_text, record.category
        );
        if let Err(err) = memory.remember(&record.user_id, &content).await {
            warn!(user_id = %record.user_id, error = %err, "failed to mirror preference to fuzzy memory");
        }
    }

    /// Drop the fuzzy copies of values an exclusive write replaced, then
    /// mirror the new value. The writer applies both in queue order.
    async fn mirror_supersede(&self, record: &PreferenceRecord, replaced: &[PreferenceRecord]) {
        for old in replaced {
            self.mirror_forget(&old.user_id, &old.canonical_text).await;
        }
        self.mirror_remember(record).await;
    }

    async fn mirror_forget(&self, user_id: &str, text: &str) {
        let Some(memory) = &self.memory else {
            return;
        };
        if let Err(err) = memory.forget(user_id, text).await {
            warn!(user_id, error = %err, "failed to remove preference from fuzzy memory");
        }
    }
}
