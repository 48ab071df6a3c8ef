//! US address normalization.

use std::path::Path;

use anyhow::{Context, Result};
use hashbrown::{HashMap, HashSet};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Built-in USPS abbreviations (Publication 28, the common subset), plus compass points
const STREET_TYPES: &[(&str, &str)] = &[
    ("aly", "Alley"),
    ("ave", "Avenue"),
    ("av", "Avenue"),
    ("blvd", "Boulevard"),
    ("bdwy", "Broadway"),
    ("cir", "Circle"),
    ("ct", "Court"),
    ("cres", "Crescent"),
    ("dr", "Drive"),
    ("expy", "Expressway"),
    ("fwy", "Freeway"),
    ("hwy", "Highway"),
    ("ln", "Lane"),
    ("pkwy", "Parkway"),
    ("pl", "Place"),
    ("plz", "Plaza"),
    ("rd", "Road"),
    ("sq", "Square"),
    ("st", "Street"),
    ("ter", "Terrace"),
    ("tpke", "Turnpike"),
    ("trl", "Trail"),
    ("way", "Way"),
];

const OTHER_ABBREVIATIONS: &[(&str, &str)] = &[
    ("apt", "Apartment"),
    ("bldg", "Building"),
    ("fl", "Floor"),
    ("ste", "Suite"),
    ("rm", "Room"),
    ("ctr", "Center"),
    ("hts", "Heights"),
    ("n", "North"),
    ("e", "East"),
    ("s", "South"),
    ("w", "West"),
    ("ne", "Northeast"),
    ("nw", "Northwest"),
    ("se", "Southeast"),
    ("sw", "Southwest"),
];

const STATE_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM",
    "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA",
    "WV", "WI", "WY", "PR",
];

pub const DEFAULT_CITY: &str = "New York";
pub const DEFAULT_STATE: &str = "NY";

#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    #[error("input is not an address string: {0:?}")]
    TooShort(String),
    #[error("address has no street name nor street number")]
    MissingStreet,
}

/// Components of a free-text address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAddress {
    /// Street number and name, abbreviations expanded
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

/// One address in a match request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchAddress {
    pub line1: String,
    pub city: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

/// Request object for the property match endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRequest {
    pub addresses: Vec<MatchAddress>,
    /// Echoed back in the response, used to map batch answers to inputs
    pub custom_id: String,
}

impl MatchRequest {
    pub fn from_parsed(
        parsed: &ParsedAddress,
        custom_id: Option<usize>,
    ) -> Result<Self, AddressError> {
        let line1 = parsed.street.clone().ok_or(AddressError::MissingStreet)?;

        Ok(Self {
            addresses: vec![MatchAddress {
                line1,
                city: parsed
                    .city
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CITY.to_string()),
                // Only New York is covered by the match endpoint
                state: DEFAULT_STATE.to_string(),
                postal_code: parsed.zip.clone(),
            }],
            custom_id: custom_id.map(|i| i.to_string()).unwrap_or_default(),
        })
    }
}

/// Expands abbreviations and splits addresses into components
pub struct AddressNormalizer {
    abbreviations: HashMap<String, String>,
    street_types: HashSet<String>,
    states: HashSet<&'static str>,
    non_word: Regex,
    zip_tail: Regex,
    state_tail: Regex,
}

impl AddressNormalizer {
    pub fn new() -> Self {
        let abbreviations = STREET_TYPES
            .iter()
            .chain(OTHER_ABBREVIATIONS)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let street_types = STREET_TYPES
            .iter()
            .flat_map(|(k, v)| [k.to_string(), v.to_lowercase()])
            .collect();

        Self {
            abbreviations,
            street_types,
            states: STATE_CODES.iter().copied().collect(),
            non_word: Regex::new(r"[^\w\s]").expect("static regex"),
            zip_tail: Regex::new(r"[\s,]*\b(\d{5}(?:-\d{4})?)\s*$").expect("static regex"),
            state_tail: Regex::new(r"(?:^|([\s,]+))([A-Za-z]{2})\.?\s*$")
                .expect("static regex"),
        }
    }

    /// Built-in table extended with a JSON object of `abbreviation: expansion`
    pub fn with_abbreviations_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read abbreviations file {}", path.display()))?;
        let extra: std::collections::HashMap<String, String> =
            serde_json::from_str(&content).context("Failed to parse abbreviations file")?;

        let mut normalizer = Self::new();
        for (k, v) in extra {
            normalizer.abbreviations.insert(k.to_lowercase(), v);
        }
        Ok(normalizer)
    }

    /// Replace known abbreviations word by word, collapsing whitespace
    pub fn expand_abbreviations(&self, address: &str) -> String {
        address
            .split_whitespace()
            .map(|word| {
                let key = self.non_word.replace_all(word, "").to_lowercase();
                match self.abbreviations.get(&key) {
                    Some(expanded) => expanded.as_str(),
                    None => word,
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Split an address into street, city, state and zip code
    pub fn parse(&self, address: &str) -> Result<ParsedAddress, AddressError> {
        let input = address.trim();
        if input.chars().count() < 2 {
            return Err(AddressError::TooShort(address.to_string()));
        }

        let mut parsed = ParsedAddress::default();
        let mut rest = input.to_string();

        if let Some(caps) = self.zip_tail.captures(&rest) {
            parsed.zip = Some(caps[1].to_string());
            let start = caps.get(0).map_or(rest.len(), |m| m.start());
            rest.truncate(start);
        }

        // A trailing two-letter word is a state only after a comma or before a
        // zip code; otherwise "Ct" and friends would be read as states.
        if let Some(caps) = self.state_tail.captures(&rest) {
            let code = caps[2].to_uppercase();
            let after_comma = caps.get(1).map_or(false, |m| m.as_str().contains(','));
            if (after_comma || parsed.zip.is_some()) && self.states.contains(code.as_str()) {
                parsed.state = Some(code);
                let start = caps.get(0).map_or(rest.len(), |m| m.start());
                rest.truncate(start);
            }
        }

        let parts: Vec<&str> = rest
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let (street, city) = match parts.as_slice() {
            [] => (None, None),
            [only] => self.split_street_city(only),
            [first, .., last] => (Some(first.to_string()), Some(last.to_string())),
        };

        parsed.street = street.map(|s| self.expand_abbreviations(&s));
        parsed.city = city;

        if parsed == ParsedAddress::default() {
            parsed.street = Some(input.to_string());
        }

        debug!("Parsed '{}' as {:?}", address, parsed);
        Ok(parsed)
    }

    /// Without commas, the street ends at the last street type word
    fn split_street_city(&self, part: &str) -> (Option<String>, Option<String>) {
        let words: Vec<&str> = part.split_whitespace().collect();
        let last_type = words.iter().rposition(|w| {
            let key = self.non_word.replace_all(w, "").to_lowercase();
            self.street_types.contains(&key)
        });

        match last_type {
            // First word is a street type only in names like "Avenue A"; keep everything
            Some(i) if i > 0 && i + 1 < words.len() => (
                Some(words[..=i].join(" ")),
                Some(words[i + 1..].join(" ")),
            ),
            _ => (Some(part.to_string()), None),
        }
    }
}

impl Default for AddressNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
