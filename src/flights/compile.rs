//! Compilation of resolved preferences into search parameters and a
//! post-hoc [`FilterSpec`].
//!
//! Values the caller set explicitly on the request are never overwritten.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::offer::TravelClass;
use crate::preferences::airlines::carrier_codes_in;
use crate::preferences::canonical::{label_value, max_stops_in};
use crate::preferences::{PreferenceCategory, ResolvedPreferences};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A flight search as requested by the caller. `None` means "not specified".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Origin IATA code.
    pub origin: String,
    /// Destination IATA code.
    pub destination: String,
    /// Departure date, `YYYY-MM-DD`.
    pub departure_date: String,
    /// Return date for round trips.
    #[serde(default)]
    pub return_date: Option<String>,
    /// Adult passengers.
    #[serde(default)]
    pub adults: Option<u32>,
    /// Cabin class.
    #[serde(default)]
    pub travel_class: Option<TravelClass>,
    /// Direct flights only.
    #[serde(default)]
    pub non_stop: Option<bool>,
}

/// Parameters handed to the flight-search collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Origin IATA code.
    pub origin: String,
    /// Destination IATA code.
    pub destination: String,
    /// Departure date, `YYYY-MM-DD`.
    pub departure_date: String,
    /// Return date for round trips.
    pub return_date: Option<String>,
    /// Adult passengers.
    pub adults: u32,
    /// Cabin class, if any.
    pub travel_class: Option<TravelClass>,
    /// Direct flights only.
    pub non_stop: bool,
}

/// Departure-time bucket in local hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepartureWindow {
    /// 05:00 to 11:59.
    Morning,
    /// 12:00 to 16:59.
    Afternoon,
    /// 17:00 to 22:59.
    Evening,
}

impl DepartureWindow {
    /// Returns the lowercase bucket name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
        }
    }

    /// Whether a local departure hour falls inside the window.
    pub fn contains(&self, hour: u32) -> bool {
        match self {
            Self::Morning => (5..12).contains(&hour),
            Self::Afternoon => (12..17).contains(&hour),
            Self::Evening => (17..23).contains(&hour),
        }
    }

    /// The bucket named anywhere in `text`.
    pub fn find_in(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        [Self::Morning, Self::Afternoon, Self::Evening]
            .into_iter()
            .find(|w| lower.contains(w.as_str()))
    }
}

/// Predicates applied to returned offers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    /// Drop offers with any segment on these carriers.
    pub avoided_airlines: BTreeSet<String>,
    /// When non-empty, keep only offers with a segment on these carriers.
    pub preferred_airlines: BTreeSet<String>,
    /// Maximum connections per itinerary.
    pub max_stops: Option<u32>,
    /// When non-empty, first departure must fall in one of these windows.
    pub departure_windows: BTreeSet<DepartureWindow>,
    /// First departure must not fall in any of these windows.
    pub avoided_windows: BTreeSet<DepartureWindow>,
    /// Drop offers departing at 22:00 or later, or before 06:00.
    pub avoid_red_eye: bool,
}

impl FilterSpec {
    /// Whether every predicate is a no-op.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Adult counts used for passenger preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerDefaults {
    /// Adults when nothing else says otherwise.
    pub default_adults: u32,
    /// Adults for "Travel: With family".
    pub family_adults: u32,
    /// Adults for "Travel: With partner".
    pub partner_adults: u32,
}

impl Default for PassengerDefaults {
    fn default() -> Self {
        Self {
            default_adults: 1,
            family_adults: 4,
            partner_adults: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Compile with the default passenger counts.
pub fn compile(request: &SearchRequest, prefs: &ResolvedPreferences) -> (SearchParams, FilterSpec) {
    compile_with(request, prefs, &PassengerDefaults::default())
}

/// Compile `prefs` into search parameters and a filter spec.
///
/// Explicit request values always win over compiled ones. An explicit
/// `non_stop = false` also disables stop-count filtering.
pub fn compile_with(
    request: &SearchRequest,
    prefs: &ResolvedPreferences,
    passengers: &PassengerDefaults,
) -> (SearchParams, FilterSpec) {
    let travel_class = request.travel_class.or_else(|| {
        prefs
            .first(PreferenceCategory::CabinClass)
            .and_then(TravelClass::from_label)
    });

    let adults = request
        .adults
        .or_else(|| {
            prefs
                .first(PreferenceCategory::Passenger)
                .and_then(|label| adults_for(label, passengers))
        })
        .unwrap_or(passengers.default_adults);

    let flight_types: Vec<String> = prefs
        .texts(PreferenceCategory::FlightType)
        .map(str::to_lowercase)
        .collect();
    let wants_direct = flight_types
        .iter()
        .any(|t| t.contains("direct") || t.contains("non-stop") || t.contains("nonstop"));
    let non_stop = request.non_stop.unwrap_or(wants_direct);

    let mut filter = FilterSpec {
        max_stops: if request.non_stop == Some(false) {
            None
        } else {
            stop_threshold(&flight_types)
        },
        ..FilterSpec::default()
    };

    for label in prefs.texts(PreferenceCategory::Airline) {
        let codes = carrier_codes_in(label);
        let target = if is_avoidance(label) {
            &mut filter.avoided_airlines
        } else {
            &mut filter.preferred_airlines
        };
        target.extend(codes.into_iter().map(str::to_owned));
    }
    let avoided = filter.avoided_airlines.clone();
    filter.preferred_airlines.retain(|code| !avoided.contains(code));

    for label in prefs.texts(PreferenceCategory::DepartureTime) {
        let Some(window) = DepartureWindow::find_in(label_value(label)) else {
            continue;
        };
        if is_avoidance(label) {
            filter.avoided_windows.insert(window);
        } else {
            filter.departure_windows.insert(window);
        }
    }

    filter.avoid_red_eye = prefs.contains(PreferenceCategory::RedEye);

    let params = SearchParams {
        origin: request.origin.clone(),
        destination: request.destination.clone(),
        departure_date: request.departure_date.clone(),
        return_date: request.return_date.clone(),
        adults,
        travel_class,
        non_stop,
    };

    debug!(
        adults = params.adults,
        travel_class = params.travel_class.map(|c| c.as_str()),
        non_stop = params.non_stop,
        ?filter,
        "search compiled"
    );
    (params, filter)
}

fn adults_for(label: &str, passengers: &PassengerDefaults) -> Option<u32> {
    match label {
        "Travel: Solo" => Some(1),
        "Travel: With family" => Some(passengers.family_adults),
        "Travel: With partner" => Some(passengers.partner_adults),
        _ => None,
    }
}

/// Tightest stop limit implied by flight-type labels.
fn stop_threshold(flight_types: &[String]) -> Option<u32> {
    flight_types
        .iter()
        .filter_map(|t| {
            if t.contains("avoid layovers") {
                Some(0)
            } else if let Some(count) = t.strip_prefix("stops: at most ") {
                count.trim().parse().ok()
            } else {
                max_stops_in(t)
            }
        })
        .min()
}

fn is_avoidance(label: &str) -> bool {
    let lower = label_value(label).to_lowercase();
    ["avoid", "no ", "not ", "never", "hate", "don't", "dislike"]
        .iter()
        .any(|w| lower.starts_with(w) || lower.contains(&format!(" {w}")))
}
