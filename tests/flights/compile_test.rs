//! Tests for `src/flights/compile.rs`: preferences to search parameters and
//! filter predicates.

use chrono::Utc;

use skymate::flights::{
    compile, compile_with, DepartureWindow, PassengerDefaults, SearchRequest, TravelClass,
};
use skymate::preferences::resolver::merge_layers;
use skymate::preferences::{PreferenceCategory, PreferenceRecord, ResolvedPreferences, UiPreferences};

fn request() -> SearchRequest {
    SearchRequest {
        origin: "JFK".to_owned(),
        destination: "LHR".to_owned(),
        departure_date: "2026-03-15".to_owned(),
        ..SearchRequest::default()
    }
}

fn stored(pairs: &[(PreferenceCategory, &str)]) -> ResolvedPreferences {
    let records: Vec<PreferenceRecord> = pairs
        .iter()
        .enumerate()
        .map(|(i, (category, text))| PreferenceRecord {
            id: i.to_string(),
            user_id: "alice".to_owned(),
            category: *category,
            raw_text: (*text).to_owned(),
            canonical_text: (*text).to_owned(),
            created_at: Utc::now(),
        })
        .collect();
    merge_layers(&UiPreferences::default(), &records, &[])
}

#[test]
fn no_preferences_compile_to_defaults() {
    let (params, filter) = compile(&request(), &ResolvedPreferences::default());

    assert_eq!(params.origin, "JFK");
    assert_eq!(params.destination, "LHR");
    assert_eq!(params.adults, 1);
    assert_eq!(params.travel_class, None);
    assert!(!params.non_stop);
    assert!(filter.is_empty());
}

#[test]
fn ui_business_beats_stored_economy() {
    let records = vec![PreferenceRecord {
        id: "1".to_owned(),
        user_id: "alice".to_owned(),
        category: PreferenceCategory::CabinClass,
        raw_text: "economy".to_owned(),
        canonical_text: "Cabin class: Economy".to_owned(),
        created_at: Utc::now(),
    }];
    let ui = UiPreferences {
        cabin_class: Some("Business".to_owned()),
        ..UiPreferences::default()
    };
    let prefs = merge_layers(&ui, &records, &[]);

    let (params, _) = compile(&request(), &prefs);
    assert_eq!(params.travel_class, Some(TravelClass::Business));
    assert_eq!(params.travel_class.map(|c| c.as_str()), Some("BUSINESS"));
}

#[test]
fn explicit_request_values_are_never_overwritten() {
    let prefs = stored(&[
        (PreferenceCategory::CabinClass, "Cabin class: First"),
        (PreferenceCategory::Passenger, "Travel: With family"),
        (PreferenceCategory::FlightType, "Stops: Direct only"),
    ]);
    let req = SearchRequest {
        adults: Some(3),
        travel_class: Some(TravelClass::Economy),
        non_stop: Some(false),
        ..request()
    };

    let (params, filter) = compile(&req, &prefs);
    assert_eq!(params.adults, 3);
    assert_eq!(params.travel_class, Some(TravelClass::Economy));
    assert!(!params.non_stop);
    assert_eq!(filter.max_stops, None);
}

#[test]
fn passenger_labels_set_adults() {
    let cases = [
        ("Travel: Solo", 1),
        ("Travel: With family", 4),
        ("Travel: With partner", 2),
    ];
    for (label, adults) in cases {
        let prefs = stored(&[(PreferenceCategory::Passenger, label)]);
        let (params, _) = compile(&request(), &prefs);
        assert_eq!(params.adults, adults, "{label}");
    }
}

#[test]
fn configured_passenger_defaults_apply() {
    let prefs = stored(&[(PreferenceCategory::Passenger, "Travel: With family")]);
    let passengers = PassengerDefaults {
        default_adults: 2,
        family_adults: 5,
        partner_adults: 2,
    };
    let (params, _) = compile_with(&request(), &prefs, &passengers);
    assert_eq!(params.adults, 5);

    let (params, _) = compile_with(&request(), &ResolvedPreferences::default(), &passengers);
    assert_eq!(params.adults, 2);
}

#[test]
fn direct_preference_sets_non_stop() {
    let prefs = stored(&[(PreferenceCategory::FlightType, "Stops: Direct only")]);
    let (params, filter) = compile(&request(), &prefs);
    assert!(params.non_stop);
    assert_eq!(filter.max_stops, None);
}

#[test]
fn stop_thresholds_become_filter_limits() {
    let prefs = stored(&[(PreferenceCategory::FlightType, "Stops: At most 1")]);
    assert_eq!(compile(&request(), &prefs).1.max_stops, Some(1));

    let prefs = stored(&[(PreferenceCategory::FlightType, "Stops: Avoid layovers")]);
    assert_eq!(compile(&request(), &prefs).1.max_stops, Some(0));

    let prefs = stored(&[
        (PreferenceCategory::FlightType, "Stops: At most 2"),
        (PreferenceCategory::FlightType, "max one stop"),
    ]);
    assert_eq!(compile(&request(), &prefs).1.max_stops, Some(1));
}

#[test]
fn airline_labels_split_into_avoided_and_preferred() {
    let prefs = stored(&[
        (PreferenceCategory::Airline, "Avoid Delta"),
        (PreferenceCategory::Airline, "Prefer Delta"),
        (PreferenceCategory::Airline, "Prefer United"),
    ]);
    let (_, filter) = compile(&request(), &prefs);

    assert_eq!(filter.avoided_airlines.iter().collect::<Vec<_>>(), vec!["DL"]);
    assert_eq!(filter.preferred_airlines.iter().collect::<Vec<_>>(), vec!["UA"]);
}

#[test]
fn departure_labels_become_windows() {
    let prefs = stored(&[(PreferenceCategory::DepartureTime, "Departure time: Morning")]);
    let (_, filter) = compile(&request(), &prefs);
    assert!(filter.departure_windows.contains(&DepartureWindow::Morning));
    assert!(filter.avoided_windows.is_empty());

    let prefs = stored(&[(PreferenceCategory::DepartureTime, "Departure time: Avoid evening")]);
    let (_, filter) = compile(&request(), &prefs);
    assert!(filter.departure_windows.is_empty());
    assert!(filter.avoided_windows.contains(&DepartureWindow::Evening));
}

#[test]
fn any_red_eye_preference_enables_red_eye_filter() {
    for label in ["Red-eye: Avoid", "Red-eye: Prefer to avoid"] {
        let prefs = stored(&[(PreferenceCategory::RedEye, label)]);
        assert!(compile(&request(), &prefs).1.avoid_red_eye, "{label}");
    }
}

#[test]
fn filter_spec_serialises_camel_case() {
    let prefs = stored(&[
        (PreferenceCategory::Airline, "Avoid Delta"),
        (PreferenceCategory::RedEye, "Red-eye: Avoid"),
    ]);
    let (_, filter) = compile(&request(), &prefs);
    let json = serde_json::to_value(&filter).expect("serialise");
    assert_eq!(json["avoidedAirlines"], serde_json::json!(["DL"]));
    assert_eq!(json["avoidRedEye"], serde_json::json!(true));
}
