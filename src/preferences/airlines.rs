//! Fixed airline vocabulary: spoken names to IATA carrier codes.

/// A known airline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Airline {
    /// Lowercase name as it appears in user text.
    pub name: &'static str,
    /// Display name used in labels.
    pub display: &'static str,
    /// Two-character IATA carrier code.
    pub code: &'static str,
}

/// Airlines recognised by name. Multi-word names come before any name they
/// contain so alternations match the longest form.
pub const AIRLINES: &[Airline] = &[
    Airline { name: "united", display: "United", code: "UA" },
    Airline { name: "american", display: "American", code: "AA" },
    Airline { name: "delta", display: "Delta", code: "DL" },
    Airline { name: "southwest", display: "Southwest", code: "WN" },
    Airline { name: "jetblue", display: "JetBlue", code: "B6" },
    Airline { name: "alaska", display: "Alaska", code: "AS" },
    Airline { name: "spirit", display: "Spirit", code: "NK" },
    Airline { name: "frontier", display: "Frontier", code: "F9" },
    Airline { name: "british airways", display: "British Airways", code: "BA" },
    Airline { name: "air france", display: "Air France", code: "AF" },
    Airline { name: "lufthansa", display: "Lufthansa", code: "LH" },
    Airline { name: "klm", display: "KLM", code: "KL" },
    Airline { name: "emirates", display: "Emirates", code: "EK" },
    Airline { name: "qatar airways", display: "Qatar Airways", code: "QR" },
    Airline { name: "qatar", display: "Qatar Airways", code: "QR" },
    Airline { name: "ryanair", display: "Ryanair", code: "FR" },
    Airline { name: "easyjet", display: "easyJet", code: "U2" },
];

/// Look up an airline by its lowercase spoken name.
pub fn by_name(name: &str) -> Option<&'static Airline> {
    let name = name.trim().to_lowercase();
    AIRLINES.iter().find(|a| a.name == name)
}

/// Regex alternation over all airline names, for embedding in patterns.
pub fn name_alternation() -> String {
    AIRLINES
        .iter()
        .map(|a| a.name.replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|")
}

/// Carrier codes mentioned in `text`, by airline name or bare IATA code.
///
/// Names match case-insensitively on word boundaries. Bare codes only match
/// when written in uppercase and present in [`AIRLINES`]. Order follows the
/// table; duplicates are removed.
pub fn carrier_codes_in(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let mut codes: Vec<&'static str> = Vec::new();
    for airline in AIRLINES {
        let named = crate::preferences::canonical::contains_word(&lower, airline.name);
        let coded = tokens.contains(&airline.code);
        if (named || coded) && !codes.contains(&airline.code) {
            codes.push(airline.code);
        }
    }
    codes
}
