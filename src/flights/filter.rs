//! Post-hoc flight filtering.
//!
//! Predicates run in a fixed order and compose by intersection. A field left
//! at its default is a no-op. An empty result is a valid outcome.

use tracing::debug;

use super::compile::FilterSpec;
use super::offer::FlightOffer;

/// First hour (inclusive) of the red-eye range.
pub const RED_EYE_START_HOUR: u32 = 22;
/// Hour (exclusive) at which the red-eye range ends.
pub const RED_EYE_END_HOUR: u32 = 6;

/// Apply `spec` to `offers`, preserving input order.
pub fn filter_offers(offers: Vec<FlightOffer>, spec: &FilterSpec) -> Vec<FlightOffer> {
    let before = offers.len();
    let kept: Vec<FlightOffer> = offers
        .into_iter()
        .filter(|o| avoids_carriers(o, spec))
        .filter(|o| uses_preferred_carrier(o, spec))
        .filter(|o| within_stop_limit(o, spec))
        .filter(|o| in_requested_window(o, spec))
        .filter(|o| outside_avoided_windows(o, spec))
        .filter(|o| !(spec.avoid_red_eye && is_red_eye(o)))
        .collect();
    debug!(before, after = kept.len(), "offers filtered");
    kept
}

/// Whether the first segment departs at 22:00 or later, or before 06:00.
///
/// Offers without a parseable departure time are not red-eyes.
pub fn is_red_eye(offer: &FlightOffer) -> bool {
    offer
        .departure_hour()
        .is_some_and(|h| h >= RED_EYE_START_HOUR || h < RED_EYE_END_HOUR)
}

fn avoids_carriers(offer: &FlightOffer, spec: &FilterSpec) -> bool {
    spec.avoided_airlines.is_empty()
        || !offer
            .carrier_codes()
            .any(|c| spec.avoided_airlines.contains(c))
}

fn uses_preferred_carrier(offer: &FlightOffer, spec: &FilterSpec) -> bool {
    spec.preferred_airlines.is_empty()
        || offer
            .carrier_codes()
            .any(|c| spec.preferred_airlines.contains(c))
}

fn within_stop_limit(offer: &FlightOffer, spec: &FilterSpec) -> bool {
    match spec.max_stops {
        Some(max) => {
            let max = usize::try_from(max).unwrap_or(usize::MAX);
            offer.itineraries.iter().all(|i| i.stops() <= max)
        }
        None => true,
    }
}

// Offers without a departure time pass both window checks.

fn in_requested_window(offer: &FlightOffer, spec: &FilterSpec) -> bool {
    if spec.departure_windows.is_empty() {
        return true;
    }
    match offer.departure_hour() {
        Some(hour) => spec.departure_windows.iter().any(|w| w.contains(hour)),
        None => true,
    }
}

fn outside_avoided_windows(offer: &FlightOffer, spec: &FilterSpec) -> bool {
    match offer.departure_hour() {
        Some(hour) => !spec.avoided_windows.iter().any(|w| w.contains(hour)),
        None => true,
    }
}
