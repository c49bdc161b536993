//! Conversion of a raw flight-offers API response into [`FlightOffer`]s.
//!
//! The response carries `data[]` offers and a `dictionaries.carriers` map
//! from carrier code to name. Offers that fail to decode are skipped with a
//! warning; the rest of the response still converts.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, warn};

use super::offer::{Endpoint, FlightOffer, Itinerary, Price, Segment, TravelClass};
use super::OfferError;

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
    #[serde(default)]
    dictionaries: RawDictionaries,
}

#[derive(Debug, Default, Deserialize)]
struct RawDictionaries {
    #[serde(default)]
    carriers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOffer {
    id: String,
    price: RawPrice,
    itineraries: Vec<RawItinerary>,
    #[serde(default)]
    traveler_pricings: Vec<RawTravelerPricing>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPrice {
    total: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct RawItinerary {
    duration: Option<String>,
    segments: Vec<RawSegment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSegment {
    departure: RawEndpoint,
    arrival: RawEndpoint,
    carrier_code: String,
    number: Option<String>,
    #[serde(default)]
    number_of_stops: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEndpoint {
    iata_code: String,
    at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTravelerPricing {
    #[serde(default)]
    fare_details_by_segment: Vec<RawFareDetail>,
}

#[derive(Debug, Deserialize)]
struct RawFareDetail {
    cabin: Option<String>,
}

/// Convert a raw flight-offers response.
///
/// # Errors
///
/// Returns [`OfferError::Malformed`] only if the top-level document has the
/// wrong shape. Individual malformed offers are dropped.
pub fn parse_offers(response: &serde_json::Value) -> Result<Vec<FlightOffer>, OfferError> {
    let raw: RawResponse = serde_json::from_value(response.clone())?;
    let carriers = raw.dictionaries.carriers;

    let total = raw.data.len();
    let offers: Vec<FlightOffer> = raw
        .data
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<RawOffer>(value) {
            Ok(offer) => Some(convert(offer, &carriers)),
            Err(err) => {
                warn!(index, error = %err, "skipping malformed flight offer");
                None
            }
        })
        .collect();

    debug!(total, converted = offers.len(), "flight offers converted");
    Ok(offers)
}

fn convert(raw: RawOffer, carriers: &HashMap<String, String>) -> FlightOffer {
    let travel_class = raw
        .traveler_pricings
        .first()
        .and_then(|tp| tp.fare_details_by_segment.first())
        .and_then(|fd| fd.cabin.as_deref())
        .and_then(|cabin| TravelClass::parse(cabin).ok());

    FlightOffer {
        id: raw.id,
        price: Some(Price {
            total: raw.price.total,
            currency: raw.price.currency,
        }),
        itineraries: raw
            .itineraries
            .into_iter()
            .map(|itinerary| Itinerary {
                duration: itinerary.duration,
                segments: itinerary
                    .segments
                    .into_iter()
                    .map(|s| Segment {
                        carrier_name: carriers.get(&s.carrier_code).cloned(),
                        departure: endpoint(s.departure),
                        arrival: endpoint(s.arrival),
                        carrier_code: s.carrier_code,
                        number: s.number,
                        number_of_stops: s.number_of_stops,
                    })
                    .collect(),
            })
            .collect(),
        travel_class,
        tags: Vec::new(),
    }
}

fn endpoint(raw: RawEndpoint) -> Endpoint {
    Endpoint {
        iata_code: raw.iata_code,
        at: raw.at,
    }
}
