//! Pattern extractor: classifies a raw utterance into preference labels.
//!
//! Rules live in a fixed, ordered table of rule groups (seat, airline,
//! time, flight type, passenger, baggage, budget, red-eye, cabin class).
//! Within a group more specific patterns come first. Each rule carries a
//! stance and a subject so that an avoidance and a positive mention of the
//! same subject in one utterance resolve to the avoidance alone.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use tracing::debug;

use super::airlines;
use super::PreferenceCategory;

/// A label extracted from an utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extracted {
    /// Category of the rule group that produced the label.
    pub category: PreferenceCategory,
    /// Human-readable label, e.g. `"Avoid morning flights"`.
    pub label: String,
}

/// Whether a rule expresses a positive mention or an avoidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stance {
    Positive,
    Avoid,
    Neutral,
}

/// What a rule is about, for contradiction checks.
#[derive(Debug, Clone, Copy)]
enum Subject {
    /// A fixed subject such as `"morning"` or `"layovers"`.
    Fixed(&'static str),
    /// The text of the named capture group.
    Captured(&'static str),
}

#[derive(Debug)]
struct Rule {
    regex: Regex,
    /// Label template; `{airline}` and `{count}` are filled from captures.
    label: &'static str,
    stance: Stance,
    subject: Subject,
}

#[derive(Debug)]
struct RuleGroup {
    category: PreferenceCategory,
    /// Stop at the first rule that matches.
    first_match_only: bool,
    rules: Vec<Rule>,
}

/// A matched rule before contradiction resolution.
struct Hit {
    label: String,
    stance: Stance,
    subject: String,
}

const AVOID_VERBS: &str = r"(?:avoid|avoiding|no|hate|dislike|never|don'?t\s+(?:like|want|do))";

/// Rule-table extractor. Construct once and reuse; all patterns are compiled
/// up front.
#[derive(Debug)]
pub struct PatternExtractor {
    groups: Vec<RuleGroup>,
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternExtractor {
    /// Compile the rule table.
    pub fn new() -> Self {
        let groups = vec![
            seat_group(),
            airline_group(),
            time_group(),
            flight_type_group(),
            passenger_group(),
            baggage_group(),
            budget_group(),
            red_eye_group(),
            cabin_group(),
        ];
        Self { groups }
    }

    /// Extract distinct labels, in first-seen order.
    pub fn extract(&self, text: &str) -> Vec<String> {
        self.extract_detailed(text)
            .into_iter()
            .map(|e| e.label)
            .collect()
    }

    /// Extract distinct labels together with their categories.
    ///
    /// No match is a valid outcome and yields an empty list.
    pub fn extract_detailed(&self, text: &str) -> Vec<Extracted> {
        let lower = text.to_lowercase().replace('\u{2019}', "'");
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for group in &self.groups {
            let hits = resolve_contradictions(group.matches(&lower));
            for hit in hits {
                if seen.insert(hit.label.clone()) {
                    out.push(Extracted {
                        category: group.category,
                        label: hit.label,
                    });
                }
            }
        }

        debug!(count = out.len(), "preferences extracted");
        out
    }
}

impl RuleGroup {
    fn matches(&self, lower: &str) -> Vec<Hit> {
        let mut hits = Vec::new();
        for rule in &self.rules {
            let before = hits.len();
            for caps in rule.regex.captures_iter(lower) {
                if let Some(hit) = rule.render(&caps) {
                    hits.push(hit);
                }
            }
            if self.first_match_only && hits.len() > before {
                break;
            }
        }
        hits
    }
}

impl Rule {
    fn render(&self, caps: &Captures<'_>) -> Option<Hit> {
        let mut label = self.label.to_owned();
        if let Some(name) = caps.name("airline") {
            let airline = airlines::by_name(&collapse(name.as_str()))?;
            label = label.replace("{airline}", airline.display);
        }
        if let Some(count) = caps.name("count") {
            let n = match count.as_str() {
                "one" => "1",
                "two" => "2",
                "three" => "3",
                digits => digits,
            };
            label = label.replace("{count}", n);
        }
        let subject = match self.subject {
            Subject::Fixed(s) => s.to_owned(),
            Subject::Captured(group) => collapse(caps.name(group)?.as_str()),
        };
        Some(Hit {
            label,
            stance: self.stance,
            subject,
        })
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop positive hits whose subject is also avoided in the same group.
fn resolve_contradictions(hits: Vec<Hit>) -> Vec<Hit> {
    let avoided: HashSet<String> = hits
        .iter()
        .filter(|h| h.stance == Stance::Avoid)
        .map(|h| h.subject.clone())
        .collect();
    hits.into_iter()
        .filter(|h| !(h.stance == Stance::Positive && avoided.contains(&h.subject)))
        .collect()
}

// ---------------------------------------------------------------------------
// Call-site filter
// ---------------------------------------------------------------------------

const STABLE_BUDGET_PATTERN: &str = r"\b(?:on\s+a\s+budget|tight\s+budget|budget[-\s]?friendly|budget[-\s]?conscious|as\s+cheap\s+as\s+possible|cheapest\s+possible)\b";

static STABLE_BUDGET: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(STABLE_BUDGET_PATTERN).ok());

/// Whether the utterance carries an explicit, stable budget marker.
///
/// Transient words like "cheap" on their own do not count.
pub fn has_stable_budget_marker(text: &str) -> bool {
    STABLE_BUDGET
        .as_ref()
        .is_some_and(|re| re.is_match(&text.to_lowercase()))
}

/// Keep only the extracted labels that should be persisted for `text`.
///
/// Budget labels survive only when the utterance has a stable budget marker.
pub fn persistable_preferences(text: &str, extracted: Vec<Extracted>) -> Vec<Extracted> {
    let stable_budget = has_stable_budget_marker(text);
    extracted
        .into_iter()
        .filter(|e| e.category != PreferenceCategory::Budget || stable_budget)
        .collect()
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

fn rule(pattern: &str, label: &'static str, stance: Stance, subject: Subject) -> Option<Rule> {
    Regex::new(pattern).ok().map(|regex| Rule {
        regex,
        label,
        stance,
        subject,
    })
}

fn group(
    category: PreferenceCategory,
    first_match_only: bool,
    rules: Vec<Option<Rule>>,
) -> RuleGroup {
    RuleGroup {
        category,
        first_match_only,
        rules: rules.into_iter().flatten().collect(),
    }
}

fn seat_group() -> RuleGroup {
    use Stance::*;
    use Subject::Fixed;
    group(
        PreferenceCategory::Seat,
        false,
        vec![
            rule(
                &format!(r"\b{AVOID_VERBS}\s+(?:the\s+)?(?:middle|center|centre)\s+seats?"),
                "Avoid middle seats",
                Avoid,
                Fixed("middle"),
            ),
            rule(r"\bwindow\s+seats?\b", "Window seat", Positive, Fixed("window")),
            rule(r"\baisle\s+seats?\b", "Aisle seat", Positive, Fixed("aisle")),
            rule(r"\bexit\s+rows?\b", "Exit row seat", Positive, Fixed("exit row")),
        ],
    )
}

fn airline_group() -> RuleGroup {
    use Stance::*;
    use Subject::Captured;
    let names = airlines::name_alternation();
    group(
        PreferenceCategory::Airline,
        false,
        vec![
            rule(
                &format!(
                    r"\b(?:avoid|avoiding|hate|dislike|never\s+fly|don'?t\s+(?:like|want|fly)|not)\s+(?:flying\s+)?(?:with\s+)?(?P<airline>{names})\b"
                ),
                "Avoid {airline}",
                Avoid,
                Captured("airline"),
            ),
            rule(
                &format!(
                    r"\b(?:prefer|like|love|fly|flying|choose)\s+(?:to\s+fly\s+)?(?:with\s+)?(?P<airline>{names})\b"
                ),
                "Prefer {airline}",
                Positive,
                Captured("airline"),
            ),
        ],
    )
}

fn time_group() -> RuleGroup {
    let mut rules = Vec::new();
    for (bucket, avoid_label, positive_label) in [
        ("morning", "Avoid morning flights", "Morning flights"),
        ("afternoon", "Avoid afternoon flights", "Afternoon flights"),
        ("evening", "Avoid evening flights", "Evening flights"),
    ] {
        rules.push(rule(
            &format!(r"\b{AVOID_VERBS}\s+(?:early\s+|late\s+)?{bucket}\s+(?:flights?|departures?)"),
            avoid_label,
            Stance::Avoid,
            Subject::Fixed(bucket),
        ));
        rules.push(rule(
            &format!(r"\b(?:early\s+|late\s+)?{bucket}\s+(?:flights?|departures?)"),
            positive_label,
            Stance::Positive,
            Subject::Fixed(bucket),
        ));
        rules.push(rule(
            &format!(
                r"\b(?:prefer|want|like|love)\s+to\s+(?:depart|leave|fly)\s+(?:in\s+the\s+)?{bucket}"
            ),
            positive_label,
            Stance::Positive,
            Subject::Fixed(bucket),
        ));
    }
    group(PreferenceCategory::DepartureTime, false, rules)
}

fn flight_type_group() -> RuleGroup {
    use Stance::*;
    use Subject::Fixed;
    group(
        PreferenceCategory::FlightType,
        false,
        vec![
            rule(
                r"\b(?:at\s+most|max(?:imum)?|no\s+more\s+than|up\s+to)\s+(?P<count>\d|one|two|three)\s+(?:stops?|layovers?|connections?)\b",
                "At most {count} stops",
                Neutral,
                Fixed("max stops"),
            ),
            rule(
                r"\b(?:no|avoid|avoiding|hate|without|don'?t\s+want)\s+(?:any\s+)?(?:layovers?|stopovers?|connections?)\b",
                "Avoid layovers",
                Avoid,
                Fixed("layovers"),
            ),
            rule(
                r"\b(?:direct|non-?stop)\s+(?:flights?|only|routes?)\b",
                "Direct flights only",
                Positive,
                Fixed("direct"),
            ),
            rule(
                r"\b(?:don'?t\s+mind|(?:am\s+)?ok(?:ay)?\s+with|fine\s+with|willing\s+to\s+take)\s+(?:a\s+|one\s+|1\s+|multiple\s+|some\s+)?(?:layovers?|stopovers?|connections?)",
                "Layovers are fine",
                Positive,
                Fixed("layovers"),
            ),
        ],
    )
}

fn passenger_group() -> RuleGroup {
    use Stance::*;
    use Subject::Fixed;
    group(
        PreferenceCategory::Passenger,
        true,
        vec![
            rule(
                r"\b(?:travel(?:l?ing)?\s+)?(?:alone|solo)\b",
                "Traveling solo",
                Neutral,
                Fixed("party"),
            ),
            rule(
                r"\b(?:family|kids|children)\b",
                "Traveling with family",
                Neutral,
                Fixed("party"),
            ),
            rule(
                r"\bwith\s+(?:my\s+)?(?:partner|spouse|wife|husband|significant\s+other)\b",
                "Traveling with partner",
                Neutral,
                Fixed("party"),
            ),
        ],
    )
}

fn baggage_group() -> RuleGroup {
    use Stance::*;
    use Subject::Fixed;
    group(
        PreferenceCategory::Baggage,
        false,
        vec![
            rule(
                r"\b(?:carry-?on|cabin\s+bag(?:gage)?|hand\s+luggage)\s+only\b|\bonly\s+(?:a\s+)?carry-?on\b|\blight\s+packer\b|\bminimal\s+baggage\b",
                "Carry-on only",
                Neutral,
                Fixed("carry-on"),
            ),
            rule(
                r"\b(?:need|require|bring|bringing|want)\s+(?:an?\s+)?(?:extra|additional)\s+(?:baggage|bags?|luggage)\b",
                "Extra baggage",
                Neutral,
                Fixed("extra"),
            ),
            rule(
                r"\b(?:need|require|bring|bringing|want)\s+(?:an?\s+)?checked\s+(?:baggage|bags?|luggage)\b",
                "Checked bag",
                Neutral,
                Fixed("checked"),
            ),
        ],
    )
}

fn budget_group() -> RuleGroup {
    use Stance::*;
    use Subject::Fixed;
    group(
        PreferenceCategory::Budget,
        false,
        vec![
            rule(STABLE_BUDGET_PATTERN, "Budget conscious", Neutral, Fixed("budget")),
            rule(
                r"\b(?:cheap|cheapest|low[-\s]cost|budget|inexpensive|affordable)\b",
                "Budget conscious",
                Neutral,
                Fixed("budget"),
            ),
        ],
    )
}

fn red_eye_group() -> RuleGroup {
    use Stance::*;
    use Subject::Fixed;
    group(
        PreferenceCategory::RedEye,
        false,
        vec![
            rule(
                &format!(r"\b(?:{AVOID_VERBS}|not)\s+(?:\w+\s+)?(?:red[-\s]?eyes?|overnight\s+flights?)"),
                "Avoid red-eye flights",
                Avoid,
                Fixed("red-eye"),
            ),
            rule(
                r"\bred[-\s]?eyes?\b",
                "Red-eye flights",
                Positive,
                Fixed("red-eye"),
            ),
        ],
    )
}

fn cabin_group() -> RuleGroup {
    use Stance::*;
    use Subject::Fixed;
    group(
        PreferenceCategory::CabinClass,
        true,
        vec![
            rule(r"\bpremium\s+economy\b", "Premium economy class", Neutral, Fixed("cabin")),
            rule(
                r"\bbusiness\s+class\b|\bfly(?:ing)?\s+business\b",
                "Business class",
                Neutral,
                Fixed("cabin"),
            ),
            rule(r"\bfirst\s+class\b", "First class", Neutral, Fixed("cabin")),
            rule(r"\beconomy(?:\s+class)?\b|\bcoach\b", "Economy class", Neutral, Fixed("cabin")),
        ],
    )
}
