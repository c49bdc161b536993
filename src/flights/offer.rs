//! Flight offer model and the derived values ranking and filtering need.
//!
//! Field names serialize in camelCase to match the flight-offers API shape.

use chrono::{DateTime, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::OfferError;

/// Cabin class accepted by the flight-search API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravelClass {
    /// Economy.
    Economy,
    /// Premium economy.
    PremiumEconomy,
    /// Business.
    Business,
    /// First.
    First,
}

impl TravelClass {
    /// API representation, e.g. `"PREMIUM_ECONOMY"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Economy => "ECONOMY",
            Self::PremiumEconomy => "PREMIUM_ECONOMY",
            Self::Business => "BUSINESS",
            Self::First => "FIRST",
        }
    }

    /// Parse an API code or a spoken form, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`OfferError::InvalidTravelClass`] for anything else.
    pub fn parse(s: &str) -> Result<Self, OfferError> {
        let normalised = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalised.as_str() {
            "ECONOMY" | "COACH" => Ok(Self::Economy),
            "PREMIUM_ECONOMY" | "PREMIUM" => Ok(Self::PremiumEconomy),
            "BUSINESS" => Ok(Self::Business),
            "FIRST" => Ok(Self::First),
            _ => Err(OfferError::InvalidTravelClass(s.to_owned())),
        }
    }

    /// Class named by a `"Cabin class: <Value>"` label.
    pub fn from_label(label: &str) -> Option<Self> {
        let value = label.strip_prefix("Cabin class: ")?;
        Self::parse(value).ok()
    }
}

/// Ranking tag assigned to an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferTag {
    /// Lowest price.
    Cheapest,
    /// Shortest total duration.
    Fastest,
    /// Lowest weighted price/duration score.
    Best,
}

/// Offer price. `total` is kept as the API's decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Decimal total, e.g. `"412.50"`.
    pub total: String,
    /// ISO 4217 currency code.
    pub currency: String,
}

/// One end of a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Airport IATA code.
    pub iata_code: String,
    /// Local date-time, e.g. `"2025-03-14T08:35:00"`.
    #[serde(default)]
    pub at: Option<String>,
}

/// A single flight leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Departure airport and time.
    pub departure: Endpoint,
    /// Arrival airport and time.
    pub arrival: Endpoint,
    /// Marketing carrier IATA code.
    pub carrier_code: String,
    /// Carrier display name, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier_name: Option<String>,
    /// Flight number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Technical stops within the segment.
    #[serde(default)]
    pub number_of_stops: u32,
}

/// One direction of travel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Itinerary {
    /// ISO-8601 duration, e.g. `"PT7H25M"`.
    #[serde(default)]
    pub duration: Option<String>,
    /// Legs in travel order.
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl Itinerary {
    /// Connections in this itinerary (`segments - 1`).
    pub fn stops(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }
}

/// A bookable flight offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightOffer {
    /// Upstream offer id.
    pub id: String,
    /// Price, absent when the upstream omitted it.
    #[serde(default)]
    pub price: Option<Price>,
    /// Outbound and, for round trips, return itineraries.
    #[serde(default)]
    pub itineraries: Vec<Itinerary>,
    /// Cabin of the first traveler's first segment.
    #[serde(default)]
    pub travel_class: Option<TravelClass>,
    /// Ranking tags; rewritten on every ranking pass.
    #[serde(default)]
    pub tags: Vec<OfferTag>,
}

impl FlightOffer {
    /// Numeric price, or `None` if missing, unparseable, or negative.
    pub fn price_value(&self) -> Option<f64> {
        let total: f64 = self.price.as_ref()?.total.trim().parse().ok()?;
        (total.is_finite() && total >= 0.0).then_some(total)
    }

    /// Sum of itinerary durations in minutes.
    ///
    /// `None` if there are no itineraries or any duration is missing or
    /// malformed.
    pub fn total_duration_minutes(&self) -> Option<u32> {
        if self.itineraries.is_empty() {
            return None;
        }
        self.itineraries.iter().try_fold(0u32, |acc, itinerary| {
            let minutes = parse_duration_minutes(itinerary.duration.as_deref()?)?;
            acc.checked_add(minutes)
        })
    }

    /// Local hour of the first segment's departure.
    pub fn departure_hour(&self) -> Option<u32> {
        let at = self
            .itineraries
            .first()?
            .segments
            .first()?
            .departure
            .at
            .as_deref()?;
        departure_hour(at)
    }

    /// Carrier codes across every segment.
    pub fn carrier_codes(&self) -> impl Iterator<Item = &str> {
        self.itineraries
            .iter()
            .flat_map(|i| i.segments.iter())
            .map(|s| s.carrier_code.as_str())
    }

    /// Largest connection count over all itineraries.
    pub fn max_stops(&self) -> usize {
        self.itineraries
            .iter()
            .map(Itinerary::stops)
            .max()
            .unwrap_or(0)
    }

    /// Whether the offer carries `tag`.
    pub fn has_tag(&self, tag: OfferTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Parse an ISO-8601 duration (`P1DT2H30M`, `PT45M`, `PT7H`) into minutes.
///
/// Seconds are truncated. Returns `None` for malformed or empty durations.
pub fn parse_duration_minutes(iso: &str) -> Option<u32> {
    let rest = iso.trim().strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut minutes: u32 = 0;
    let mut saw_component = false;

    let mut accumulate = |part: &str, units: &[(char, u32)]| -> Option<()> {
        let mut number = String::new();
        let mut allowed = units.iter();
        for c in part.chars() {
            if c.is_ascii_digit() {
                number.push(c);
                continue;
            }
            // Units must appear in order, each at most once.
            let (_, factor) = allowed.find(|(unit, _)| *unit == c)?;
            let value: u32 = number.parse().ok()?;
            minutes = minutes.checked_add(value.checked_mul(*factor)?)?;
            number.clear();
            saw_component = true;
        }
        number.is_empty().then_some(())
    };

    accumulate(date_part, &[('D', 1440)])?;
    if let Some(time) = time_part {
        if time.is_empty() {
            return None;
        }
        accumulate(time, &[('H', 60), ('M', 1), ('S', 0)])?;
    }
    saw_component.then_some(minutes)
}

fn departure_hour(at: &str) -> Option<u32> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(at) {
        return Some(dt.hour());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(at, fmt).ok())
        .map(|dt| dt.hour())
}
