//! Tests for `src/flights/amadeus.rs`: raw response conversion.

use serde_json::json;

use skymate::flights::amadeus::parse_offers;
use skymate::flights::{rank_offers, OfferTag, RankingWeights, TravelClass};

fn response() -> serde_json::Value {
    json!({
        "data": [
            {
                "id": "1",
                "price": {"total": "612.40", "currency": "EUR"},
                "itineraries": [{
                    "duration": "PT7H25M",
                    "segments": [{
                        "departure": {"iataCode": "JFK", "at": "2026-03-15T18:30:00"},
                        "arrival": {"iataCode": "LHR", "at": "2026-03-16T06:55:00"},
                        "carrierCode": "BA",
                        "number": "178",
                        "numberOfStops": 0
                    }]
                }],
                "travelerPricings": [{
                    "fareDetailsBySegment": [{"cabin": "BUSINESS"}]
                }]
            },
            {
                "id": "2",
                "itineraries": []
            },
            {
                "id": "3",
                "price": {"total": "455.00", "currency": "EUR"},
                "itineraries": [{
                    "duration": "PT10H5M",
                    "segments": [
                        {
                            "departure": {"iataCode": "JFK", "at": "2026-03-15T07:10:00"},
                            "arrival": {"iataCode": "DUB", "at": "2026-03-15T18:40:00"},
                            "carrierCode": "UA"
                        },
                        {
                            "departure": {"iataCode": "DUB", "at": "2026-03-15T20:00:00"},
                            "arrival": {"iataCode": "LHR", "at": "2026-03-15T21:15:00"},
                            "carrierCode": "AA"
                        }
                    ]
                }]
            }
        ],
        "dictionaries": {
            "carriers": {"BA": "BRITISH AIRWAYS", "UA": "UNITED AIRLINES"}
        }
    })
}

#[test]
fn valid_offers_convert_and_malformed_ones_are_skipped() {
    let offers = parse_offers(&response()).expect("response should parse");
    let ids: Vec<&str> = offers.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);
}

#[test]
fn converted_offer_carries_fields() {
    let offers = parse_offers(&response()).expect("response should parse");
    let first = &offers[0];

    assert_eq!(first.price_value(), Some(612.40));
    assert_eq!(first.total_duration_minutes(), Some(445));
    assert_eq!(first.departure_hour(), Some(18));
    assert_eq!(first.travel_class, Some(TravelClass::Business));
    assert_eq!(first.max_stops(), 0);

    let segment = &first.itineraries[0].segments[0];
    assert_eq!(segment.carrier_code, "BA");
    assert_eq!(segment.carrier_name.as_deref(), Some("BRITISH AIRWAYS"));
    assert_eq!(segment.number.as_deref(), Some("178"));
}

#[test]
fn carriers_missing_from_dictionary_have_no_name() {
    let offers = parse_offers(&response()).expect("response should parse");
    let second = &offers[1];

    assert_eq!(second.travel_class, None);
    assert_eq!(second.max_stops(), 1);
    assert_eq!(second.carrier_codes().collect::<Vec<_>>(), vec!["UA", "AA"]);
    assert_eq!(second.itineraries[0].segments[1].carrier_name, None);
}

#[test]
fn converted_offers_rank() {
    let mut offers = parse_offers(&response()).expect("response should parse");
    rank_offers(&mut offers, &RankingWeights::default());
    assert!(offers[0].has_tag(OfferTag::Fastest));
    assert!(offers[1].has_tag(OfferTag::Cheapest));
}

#[test]
fn empty_and_malformed_documents() {
    assert!(parse_offers(&json!({})).expect("empty document").is_empty());
    assert!(parse_offers(&json!({"data": "nope"})).is_err());
}

#[test]
fn tagged_offers_serialise_with_lowercase_tags() {
    let mut offers = parse_offers(&response()).expect("response should parse");
    rank_offers(&mut offers, &RankingWeights::default());
    let json = serde_json::to_value(&offers).expect("serialise");
    assert_eq!(json[1]["tags"], json!(["cheapest"]));
    assert_eq!(json[0]["travelClass"], json!("BUSINESS"));
}
