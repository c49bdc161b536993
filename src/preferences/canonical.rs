//! Canonicalization of preference phrases.
//!
//! Every phrase maps to exactly one label. Recognised phrases become a fixed
//! `"<Category>: <Value>"` label; everything else passes through with only
//! a leading "I prefer/like/love/want/need" removed. Canonicalization is
//! idempotent: a canonical label maps to itself.

use std::sync::LazyLock;

use regex::Regex;

use super::airlines;
use super::PreferenceCategory;

/// Labels produced by the detectors below, excluding the parameterised
/// `"Stops: At most N"` form.
const FIXED_LABELS: &[&str] = &[
    "Cabin class: Premium Economy",
    "Cabin class: Business",
    "Cabin class: First",
    "Cabin class: Economy",
    "Trip type: One-way",
    "Trip type: Round trip",
    "Stops: Direct only",
    "Stops: Avoid layovers",
    "Stops: Layovers OK",
    "Departure time: Morning",
    "Departure time: Afternoon",
    "Departure time: Evening",
    "Departure time: Avoid morning",
    "Departure time: Avoid afternoon",
    "Departure time: Avoid evening",
    "Red-eye: Avoid",
    "Red-eye: Prefer to avoid",
    "Seat: Window",
    "Seat: Aisle",
    "Seat: Exit row",
    "Seat: Avoid middle",
    "Baggage: Carry-on only",
    "Baggage: Checked bag",
    "Baggage: Extra baggage",
    "Travel: Solo",
    "Travel: With family",
    "Travel: With partner",
];

/// Label prefixes and the category each one belongs to.
const LABEL_PREFIXES: &[(&str, PreferenceCategory)] = &[
    ("Cabin class: ", PreferenceCategory::CabinClass),
    ("Trip type: ", PreferenceCategory::TripType),
    ("Stops: ", PreferenceCategory::FlightType),
    ("Departure time: ", PreferenceCategory::DepartureTime),
    ("Red-eye: ", PreferenceCategory::RedEye),
    ("Seat: ", PreferenceCategory::Seat),
    ("Baggage: ", PreferenceCategory::Baggage),
    ("Travel: ", PreferenceCategory::Passenger),
];

/// Leading phrases removed from pass-through text.
const LEADING_PHRASES: &[&str] = &["i prefer", "i like", "i love", "i want", "i need"];

const NEGATIONS: &[&str] = &[
    "avoid", "avoiding", "no", "not", "never", "hate", "dislike", "don't", "dont", "without",
];

const ACCEPTANCE: &[&str] = &[
    "ok", "okay", "fine", "don't mind", "dont mind", "do not mind", "willing",
];

static MAX_STOPS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?:at\s+most|max(?:imum)?|no\s+more\s+than|up\s+to)\s+(\d+|one|two|three)\s+(?:stops?|layovers?|connections?)\b",
    )
    .ok()
});

static AT_MOST_LABEL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^stops:\s+at\s+most\s+(\d+)$").ok());

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Remove storage wrappers such as a leading `"Travel Preference: "` and a
/// trailing `"(Type: X)"` annotation.
pub fn strip_wrappers(raw: &str) -> String {
    let mut text = raw.trim();
    for prefix in ["travel preference:", "preference:"] {
        if let Some(rest) = strip_prefix_ci(text, prefix) {
            text = rest.trim_start();
        }
    }
    if text.ends_with(')') {
        if let Some(open) = text.rfind('(') {
            let inner = text.get(open..).unwrap_or_default().to_lowercase();
            if inner.starts_with("(type:") {
                text = text.get(..open).unwrap_or(text);
            }
        }
    }
    text.trim().to_owned()
}

/// Map a preference phrase to its canonical label.
pub fn canonicalize(phrase: &str) -> String {
    let text = strip_leading_phrases(phrase);
    if let Some(label) = known_label(&text) {
        return label;
    }

    let lower = text.to_lowercase().replace('\u{2019}', "'");
    let detectors: [fn(&str) -> Option<String>; 8] = [
        detect_red_eye,
        detect_cabin,
        detect_trip_type,
        detect_stops,
        detect_departure,
        detect_seat,
        detect_baggage,
        detect_passenger,
    ];
    detectors
        .iter()
        .find_map(|detect| detect(&lower))
        .unwrap_or(text)
}

/// Category of a canonical label, if it is one of the fixed forms.
pub fn category_of_label(label: &str) -> Option<PreferenceCategory> {
    LABEL_PREFIXES
        .iter()
        .find(|(prefix, _)| label.starts_with(prefix))
        .map(|(_, category)| *category)
}

/// The value part of a canonical label (`"Business"` for
/// `"Cabin class: Business"`). Pass-through text is returned unchanged.
pub fn label_value(label: &str) -> &str {
    LABEL_PREFIXES
        .iter()
        .find_map(|(prefix, _)| label.strip_prefix(prefix))
        .unwrap_or(label)
}

/// Infer a category for free text, falling back to [`PreferenceCategory::Other`].
///
/// The canonical label decides first; otherwise a keyword table is consulted
/// in a fixed order.
pub fn infer_category(text: &str) -> PreferenceCategory {
    let canonical = canonicalize(&strip_wrappers(text));
    if let Some(category) = category_of_label(&canonical) {
        return category;
    }

    let lower = text.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["red-eye", "red eye", "redeye"]) {
        PreferenceCategory::RedEye
    } else if has(&["stop", "layover", "direct"]) {
        PreferenceCategory::FlightType
    } else if has(&["business", "economy", "first class", "premium", "cabin class"]) {
        PreferenceCategory::CabinClass
    } else if has(&["morning", "afternoon", "evening", "departure"]) {
        PreferenceCategory::DepartureTime
    } else if has(&["seat"]) {
        PreferenceCategory::Seat
    } else if has(&["baggage", "luggage", "carry-on", "bag"]) {
        PreferenceCategory::Baggage
    } else if has(&["airline", "carrier"]) || !airlines::carrier_codes_in(text).is_empty() {
        PreferenceCategory::Airline
    } else if has(&["solo", "alone", "family", "partner", "spouse"]) {
        PreferenceCategory::Passenger
    } else if has(&["one-way", "one way", "round-trip", "round trip"]) {
        PreferenceCategory::TripType
    } else if has(&["budget", "cheap", "afford", "price"]) {
        PreferenceCategory::Budget
    } else {
        PreferenceCategory::Other
    }
}

/// Whether `needle` occurs in `haystack` bounded by non-alphanumeric characters.
pub(crate) fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, matched)| {
        let before = haystack.get(..start).and_then(|s| s.chars().next_back());
        let after = haystack
            .get(start..)
            .and_then(|s| s.get(matched.len()..))
            .and_then(|s| s.chars().next());
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

// ---------------------------------------------------------------------------
// Normalisation helpers
// ---------------------------------------------------------------------------

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}

/// Collapse whitespace, drop trailing punctuation and leading "I prefer"-style
/// phrases until nothing changes.
fn strip_leading_phrases(phrase: &str) -> String {
    let mut text = collapse_whitespace(phrase);
    loop {
        let before = text.clone();
        text = text
            .trim_end_matches(['.', '!'])
            .trim()
            .to_owned();
        for lead in LEADING_PHRASES {
            if let Some(rest) = strip_prefix_ci(&text, lead) {
                if rest.is_empty() || rest.starts_with(' ') {
                    text = rest.trim_start().to_owned();
                }
            }
        }
        if text == before {
            return text;
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn known_label(text: &str) -> Option<String> {
    if let Some(label) = FIXED_LABELS.iter().find(|l| l.eq_ignore_ascii_case(text)) {
        return Some((*label).to_owned());
    }
    let caps = AT_MOST_LABEL.as_ref()?.captures(text)?;
    let count: u32 = caps.get(1)?.as_str().parse().ok()?;
    Some(at_most_label(count))
}

fn at_most_label(count: u32) -> String {
    format!("Stops: At most {count}")
}

fn any_word(lower: &str, words: &[&str]) -> bool {
    words.iter().any(|w| contains_word(lower, w))
}

fn negated(lower: &str) -> bool {
    any_word(lower, NEGATIONS) || lower.contains("do not")
}

// ---------------------------------------------------------------------------
// Category detectors
// ---------------------------------------------------------------------------

fn detect_red_eye(lower: &str) -> Option<String> {
    if !["red-eye", "red eye", "redeye"].iter().any(|m| lower.contains(m)) {
        return None;
    }
    let label = if negated(lower) {
        "Red-eye: Avoid"
    } else {
        "Red-eye: Prefer to avoid"
    };
    Some(label.to_owned())
}

fn detect_cabin(lower: &str) -> Option<String> {
    if !any_word(lower, &["class", "cabin", "flight", "flights"]) {
        return None;
    }
    let tier = if contains_word(lower, "premium") && contains_word(lower, "economy") {
        "Premium Economy"
    } else if contains_word(lower, "business") {
        "Business"
    } else if contains_word(lower, "first") {
        "First"
    } else if contains_word(lower, "economy") {
        "Economy"
    } else {
        return None;
    };
    Some(format!("Cabin class: {tier}"))
}

fn detect_trip_type(lower: &str) -> Option<String> {
    if any_word(lower, &["one-way", "one way"]) {
        Some("Trip type: One-way".to_owned())
    } else if any_word(lower, &["round trip", "round-trip", "return"]) {
        Some("Trip type: Round trip".to_owned())
    } else {
        None
    }
}

fn detect_stops(lower: &str) -> Option<String> {
    if any_word(lower, &["nonstop", "non-stop", "non stop", "direct"]) {
        return Some("Stops: Direct only".to_owned());
    }
    if let Some(count) = max_stops_in(lower) {
        return Some(at_most_label(count));
    }
    let mentions = ["layover", "layovers", "stopover", "stopovers", "connection", "connections", "stop", "stops"];
    if !any_word(lower, &mentions) {
        return None;
    }
    if any_word(lower, ACCEPTANCE) {
        Some("Stops: Layovers OK".to_owned())
    } else if negated(lower) {
        Some("Stops: Avoid layovers".to_owned())
    } else {
        None
    }
}

/// Parse an "at most N stops" style threshold.
pub(crate) fn max_stops_in(lower: &str) -> Option<u32> {
    let caps = MAX_STOPS.as_ref()?.captures(lower)?;
    match caps.get(1)?.as_str() {
        "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        digits => digits.parse().ok(),
    }
}

fn detect_departure(lower: &str) -> Option<String> {
    let bucket = ["morning", "afternoon", "evening"]
        .into_iter()
        .find(|b| lower.contains(b))?;
    if negated(lower) {
        Some(format!("Departure time: Avoid {bucket}"))
    } else {
        Some(format!("Departure time: {}", capitalise(bucket)))
    }
}

fn detect_seat(lower: &str) -> Option<String> {
    if !lower.contains("seat") && !lower.contains("exit row") {
        return None;
    }
    if contains_word(lower, "window") {
        Some("Seat: Window".to_owned())
    } else if contains_word(lower, "aisle") {
        Some("Seat: Aisle".to_owned())
    } else if lower.contains("exit row") {
        Some("Seat: Exit row".to_owned())
    } else if any_word(lower, &["middle", "center", "centre"]) && negated(lower) {
        Some("Seat: Avoid middle".to_owned())
    } else {
        None
    }
}

fn detect_baggage(lower: &str) -> Option<String> {
    let carry_on = ["carry-on", "carry on", "carryon", "cabin bag", "hand luggage", "light packer"];
    let bag_words = ["bag", "bags", "baggage", "luggage"];
    if carry_on.iter().any(|m| lower.contains(m)) {
        Some("Baggage: Carry-on only".to_owned())
    } else if contains_word(lower, "checked") && any_word(lower, &bag_words) {
        Some("Baggage: Checked bag".to_owned())
    } else if any_word(lower, &["extra", "additional"]) && any_word(lower, &bag_words) {
        Some("Baggage: Extra baggage".to_owned())
    } else {
        None
    }
}

fn detect_passenger(lower: &str) -> Option<String> {
    if any_word(lower, &["solo", "alone"]) {
        Some("Travel: Solo".to_owned())
    } else if any_word(lower, &["family", "kids", "children"]) {
        Some("Travel: With family".to_owned())
    } else if any_word(lower, &["partner", "spouse", "wife", "husband"]) {
        Some("Travel: With partner".to_owned())
    } else {
        None
    }
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
