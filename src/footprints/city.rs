//! Cities with footprint coverage.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum City {
    Berlin,
    London,
    Amsterdam,
    Dublin,
    Paris,
}

#[derive(Debug, Error, PartialEq)]
#[error("city not available: {0}. Try one of: Berlin, London, Amsterdam, Dublin, or Paris")]
pub struct UnknownCity(pub String);

impl City {
    pub fn all() -> &'static [City] {
        &[
            City::Berlin,
            City::London,
            City::Amsterdam,
            City::Dublin,
            City::Paris,
        ]
    }

    /// ISO 3166-1 alpha-2 code, lowercase, as used by the dataset and the geocoder
    pub fn country_code(&self) -> &'static str {
        match self {
            City::Berlin => "de",
            City::London => "gb",
            City::Amsterdam => "nl",
            City::Dublin => "ie",
            City::Paris => "fr",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            City::Berlin => "Berlin",
            City::London => "London",
            City::Amsterdam => "Amsterdam",
            City::Dublin => "Dublin",
            City::Paris => "Paris",
        }
    }
}

impl std::fmt::Display for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for City {
    type Err = UnknownCity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        City::all()
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCity(s.to_string()))
    }
}
