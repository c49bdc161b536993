//! Request-scoped preference resolution.
//!
//! Three layers are merged, highest precedence first:
//!
//! 1. UI selections sent with the current request.
//! 2. The structured store: latest row for exclusive categories, the
//!    case-insensitive union for the rest.
//! 3. Legacy fuzzy memory, only for categories still empty after 1 and 2.
//!
//! A layer that supplies a category replaces it wholesale; lower layers
//! never add values to a category a higher layer already owns.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::canonical::{canonicalize, contains_word, infer_category, label_value, strip_wrappers};
use super::{PreferenceCategory, PreferenceError, PreferenceRecord, PreferenceStore};
use crate::memory::MemoryBackend;

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Preferences selected in the UI for the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiPreferences {
    /// Cabin class, e.g. `"Business"` or `"PREMIUM_ECONOMY"`.
    pub cabin_class: Option<String>,
    /// Only show direct flights. `false` expresses no preference.
    pub direct_flights_only: Option<bool>,
    /// Hide red-eye departures. `false` expresses no preference.
    pub avoid_red_eye: Option<bool>,
    /// Departure bucket: morning, afternoon or evening.
    pub preferred_time: Option<String>,
    /// `"one-way"` or `"round-trip"`.
    pub trip_type: Option<String>,
}

impl UiPreferences {
    /// Canonical `(category, label)` pairs for every recognisable selection.
    ///
    /// Unrecognised values are ignored.
    pub fn canonical_values(&self) -> Vec<(PreferenceCategory, String)> {
        let mut out = Vec::new();
        if let Some(cabin) = non_blank(&self.cabin_class) {
            let label = canonicalize(&format!("{} class", cabin.replace('_', " ")));
            push_if_category(&mut out, PreferenceCategory::CabinClass, label);
        }
        if self.direct_flights_only == Some(true) {
            out.push((PreferenceCategory::FlightType, "Stops: Direct only".to_owned()));
        }
        if self.avoid_red_eye == Some(true) {
            out.push((PreferenceCategory::RedEye, "Red-eye: Avoid".to_owned()));
        }
        if let Some(time) = non_blank(&self.preferred_time) {
            let label = canonicalize(&format!("{time} departures"));
            push_if_category(&mut out, PreferenceCategory::DepartureTime, label);
        }
        if let Some(trip) = non_blank(&self.trip_type) {
            let label = canonicalize(&trip.replace('_', " "));
            push_if_category(&mut out, PreferenceCategory::TripType, label);
        }
        out
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn push_if_category(
    out: &mut Vec<(PreferenceCategory, String)>,
    category: PreferenceCategory,
    label: String,
) {
    if super::canonical::category_of_label(&label) == Some(category) {
        out.push((category, label));
    } else {
        debug!(category = category.as_str(), value = %label, "ignoring unrecognised UI value");
    }
}

/// Which layer supplied a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceLayer {
    /// Current-request UI selection.
    Ui,
    /// Structured preference store.
    Stored,
    /// Legacy fuzzy memory.
    Memory,
}

/// One resolved value and its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedValue {
    /// Canonical label.
    pub text: String,
    /// Layer that supplied it.
    pub layer: PreferenceLayer,
}

/// Winning preference values per category for a single request.
///
/// Exclusive categories hold exactly one value when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedPreferences {
    values: BTreeMap<PreferenceCategory, Vec<ResolvedValue>>,
}

impl ResolvedPreferences {
    /// Values for a category, empty when absent.
    pub fn get(&self, category: PreferenceCategory) -> &[ResolvedValue] {
        self.values.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    /// Canonical labels for a category.
    pub fn texts(&self, category: PreferenceCategory) -> impl Iterator<Item = &str> {
        self.get(category).iter().map(|v| v.text.as_str())
    }

    /// The first (for exclusive categories, the only) label of a category.
    pub fn first(&self, category: PreferenceCategory) -> Option<&str> {
        self.texts(category).next()
    }

    /// Whether any layer supplied the category.
    pub fn contains(&self, category: PreferenceCategory) -> bool {
        self.values.contains_key(&category)
    }

    /// Whether nothing was resolved.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Categories present, in display order.
    pub fn categories(&self) -> impl Iterator<Item = PreferenceCategory> + '_ {
        self.values.keys().copied()
    }

    /// One display line per category, e.g. `"Cabin Class: Business"`.
    ///
    /// Used to brief the assistant or answer "what are my preferences".
    pub fn summary_lines(&self) -> Vec<String> {
        self.values
            .iter()
            .map(|(category, values)| {
                let shown: Vec<&str> = values.iter().map(|v| label_value(&v.text)).collect();
                format!("{}: {}", category.title(), shown.join("; "))
            })
            .collect()
    }

    /// Fill `category` from `layer` unless a higher layer already owns it.
    ///
    /// Exclusive categories keep only the first value offered; the rest are
    /// deduplicated case-insensitively in arrival order.
    fn fill(
        &mut self,
        category: PreferenceCategory,
        texts: impl IntoIterator<Item = String>,
        layer: PreferenceLayer,
    ) {
        if self.values.contains_key(&category) {
            return;
        }
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for text in texts {
            if !seen.insert(text.to_lowercase()) {
                continue;
            }
            values.push(ResolvedValue { text, layer });
            if category.is_exclusive() {
                break;
            }
        }
        if !values.is_empty() {
            self.values.insert(category, values);
        }
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Merge the three layers into one [`ResolvedPreferences`].
///
/// `stored` must be ordered newest first, as returned by
/// [`PreferenceStore::list`]. `memories` are raw memory contents, newest
/// first; travel-history entries among them are skipped.
pub fn merge_layers(
    ui: &UiPreferences,
    stored: &[PreferenceRecord],
    memories: &[String],
) -> ResolvedPreferences {
    let mut resolved = ResolvedPreferences::default();

    for (category, values) in group_by_category(ui.canonical_values()) {
        resolved.fill(category, values, PreferenceLayer::Ui);
    }

    let stored_pairs = stored
        .iter()
        .map(|r| (r.category, r.canonical_text.clone()))
        .collect();
    for (category, values) in group_by_category(stored_pairs) {
        resolved.fill(category, values, PreferenceLayer::Stored);
    }

    let memory_pairs = memories
        .iter()
        .filter(|m| !looks_like_history(m))
        .filter_map(|m| {
            let stripped = strip_wrappers(m);
            if stripped.is_empty() {
                return None;
            }
            Some((infer_category(&stripped), canonicalize(&stripped)))
        })
        .collect();
    for (category, values) in group_by_category(memory_pairs) {
        resolved.fill(category, values, PreferenceLayer::Memory);
    }

    resolved
}

/// Group pairs by category, keeping arrival order inside each group.
fn group_by_category(
    pairs: Vec<(PreferenceCategory, String)>,
) -> BTreeMap<PreferenceCategory, Vec<String>> {
    let mut grouped: BTreeMap<PreferenceCategory, Vec<String>> = BTreeMap::new();
    for (category, text) in pairs {
        grouped.entry(category).or_default().push(text);
    }
    grouped
}

/// Whether a memory records travel history rather than a preference.
///
/// Matches "booked", "searched", "traveled"/"travelled", and route arrows
/// accompanied by a price.
pub fn looks_like_history(memory: &str) -> bool {
    let lower = memory.to_lowercase();
    if ["booked", "searched", "traveled", "travelled"]
        .iter()
        .any(|w| contains_word(&lower, w))
    {
        return true;
    }
    let has_arrow = ["->", "\u{2192}", "=>"].iter().any(|a| lower.contains(a));
    has_arrow && has_price(&lower)
}

fn has_price(lower: &str) -> bool {
    let symbol_then_digit = lower
        .char_indices()
        .filter(|(_, c)| matches!(c, '$' | '\u{20ac}' | '\u{a3}'))
        .any(|(i, c)| {
            lower
                .get(i..)
                .and_then(|rest| rest.get(c.len_utf8()..))
                .is_some_and(|rest| rest.trim_start().starts_with(|d: char| d.is_ascii_digit()))
        });
    symbol_then_digit || ["usd", "eur", "gbp"].iter().any(|code| contains_word(lower, code))
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Reads the store and memory layers for one request.
pub struct Resolver<'a> {
    store: &'a PreferenceStore,
    memory: Option<&'a dyn MemoryBackend>,
    recall_limit: usize,
}

impl<'a> Resolver<'a> {
    /// Resolver over the structured store only.
    pub fn new(store: &'a PreferenceStore) -> Self {
        Self {
            store,
            memory: None,
            recall_limit: 50,
        }
    }

    /// Add the fuzzy memory fallback layer.
    pub fn with_memory(mut self, memory: &'a dyn MemoryBackend, recall_limit: usize) -> Self {
        self.memory = Some(memory);
        self.recall_limit = recall_limit;
        self
    }

    /// Resolve preferences for `user_id` given this request's UI selections.
    ///
    /// Fuzzy memory failures are logged and treated as an empty layer.
    ///
    /// # Errors
    ///
    /// Returns an error only if the structured store cannot be read.
    pub async fn resolve(
        &self,
        user_id: &str,
        ui: &UiPreferences,
    ) -> Result<ResolvedPreferences, PreferenceError> {
        let stored = self.store.list(user_id).await?;

        let memories = match self.memory {
            Some(memory) => match memory.recall(user_id, self.recall_limit).await {
                Ok(memories) => memories,
                Err(err) => {
                    warn!(user_id, error = %err, "fuzzy memory unavailable; continuing without it");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let resolved = merge_layers(ui, &stored, &memories);
        debug!(
            user_id,
            stored = stored.len(),
            memories = memories.len(),
            categories = resolved.values.len(),
            "preferences resolved"
        );
        Ok(resolved)
    }
}
