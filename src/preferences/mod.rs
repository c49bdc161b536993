//! Travel preference domain: categories, stored records, and the pipeline
//! from a raw utterance to a canonical, persisted fact.
//!
//! - [`extractor`] classifies utterances with an ordered rule table.
//! - [`canonical`] maps phrases to one fixed label per category.
//! - [`store`] persists records, enforcing single-value exclusive categories.
//! - [`resolver`] merges UI overrides, stored rows, and legacy memory.

pub mod airlines;
pub mod canonical;
pub mod extractor;
pub mod resolver;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use self::canonical::{canonicalize, infer_category, strip_wrappers};
pub use self::extractor::{
    has_stable_budget_marker, persistable_preferences, Extracted, PatternExtractor,
};
pub use self::resolver::{
    PreferenceLayer, ResolvedPreferences, ResolvedValue, Resolver, UiPreferences,
};
pub use self::store::PreferenceStore;

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// Category of a travel preference.
///
/// Ordering follows declaration order and drives display order in summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceCategory {
    /// Seat position (window, aisle, exit row, avoid middle).
    Seat,
    /// Preferred or avoided airlines.
    Airline,
    /// Departure-time bucket.
    DepartureTime,
    /// Stops and layovers.
    FlightType,
    /// Cabin class.
    CabinClass,
    /// Red-eye avoidance.
    RedEye,
    /// Baggage needs.
    Baggage,
    /// One-way or round trip.
    TripType,
    /// Who the user travels with.
    Passenger,
    /// Budget sensitivity.
    Budget,
    /// Anything without a recognised category.
    Other,
}

impl PreferenceCategory {
    /// Every category, in display order.
    pub const ALL: [Self; 11] = [
        Self::Seat,
        Self::Airline,
        Self::DepartureTime,
        Self::FlightType,
        Self::CabinClass,
        Self::RedEye,
        Self::Baggage,
        Self::TripType,
        Self::Passenger,
        Self::Budget,
        Self::Other,
    ];

    /// Returns the string representation stored in SQLite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seat => "seat",
            Self::Airline => "airline",
            Self::DepartureTime => "departure_time",
            Self::FlightType => "flight_type",
            Self::CabinClass => "cabin_class",
            Self::RedEye => "red_eye",
            Self::Baggage => "baggage",
            Self::TripType => "trip_type",
            Self::Passenger => "passenger",
            Self::Budget => "budget",
            Self::Other => "other",
        }
    }

    /// Parse from a SQLite text value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a recognised category.
    pub fn parse(s: &str) -> Result<Self, PreferenceError> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| PreferenceError::InvalidEnum {
                field: "category",
                value: s.to_owned(),
            })
    }

    /// Whether at most one live value may exist per user.
    pub fn is_exclusive(&self) -> bool {
        matches!(
            self,
            Self::CabinClass | Self::DepartureTime | Self::TripType | Self::Passenger
        )
    }

    /// Human-facing section title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Seat => "Seat",
            Self::Airline => "Airline",
            Self::DepartureTime => "Departure Time",
            Self::FlightType => "Flight Type",
            Self::CabinClass => "Cabin Class",
            Self::RedEye => "Red-Eye",
            Self::Baggage => "Baggage",
            Self::TripType => "Trip Type",
            Self::Passenger => "Travel Party",
            Self::Budget => "Budget",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for PreferenceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored preference statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    /// UUID v4 row id.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Category the statement was filed under.
    pub category: PreferenceCategory,
    /// Text as supplied by the caller.
    pub raw_text: String,
    /// Canonical label used for dedup and display.
    pub canonical_text: String,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Maximum accepted size of a single preference statement, in bytes.
pub const MAX_PREFERENCE_SIZE: usize = 1024;

/// Errors from preference store and resolver operations.
#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An invalid enum value was read from the database.
    #[error("invalid {field} value: {value:?}")]
    InvalidEnum {
        /// Which field contained the bad value.
        field: &'static str,
        /// The unexpected value.
        value: String,
    },

    /// A stored timestamp could not be parsed.
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    /// The preference text was empty after stripping wrappers.
    #[error("preference text is empty")]
    EmptyText,

    /// The preference text exceeds [`MAX_PREFERENCE_SIZE`].
    #[error("preference too large: {size} bytes exceeds {max} byte limit")]
    TooLarge {
        /// Actual size in bytes.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },
}
