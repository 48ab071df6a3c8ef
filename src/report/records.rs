use anyhow::{Context, Result};
use csv::ReaderBuilder;
use hashbrown::HashMap;
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::footprints::open_source;
use crate::models::{Lease, Listing, Property};

pub const PROPERTIES_FILE: &str = "properties.csv";
pub const LEASES_FILE: &str = "leases.csv";
pub const LISTINGS_FILE: &str = "listings.csv";

#[derive(Debug, Error, PartialEq)]
pub enum ReportError {
    #[error("unknown property: {0}")]
    UnknownProperty(String),
}

/// Deserialize every row of a CSV stream into `T`
pub fn read_records<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>> {
    let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

    csv_reader
        .deserialize()
        .enumerate()
        .map(|(row, record)| record.with_context(|| format!("Invalid row {}", row + 1)))
        .collect()
}

/// Read a CSV extract from disk (`.gz` allowed)
pub fn load_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let records = read_records(open_source(path)?)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Properties with their leases and listings
#[derive(Debug, Default)]
pub struct PropertyData {
    properties: Vec<Property>,
    by_id: HashMap<String, usize>,
    leases: Vec<Lease>,
    listings: Vec<Listing>,
}

impl PropertyData {
    pub fn new(properties: Vec<Property>, leases: Vec<Lease>, listings: Vec<Listing>) -> Self {
        let by_id = properties
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        Self {
            properties,
            by_id,
            leases,
            listings,
        }
    }

    /// Load `properties.csv`, `leases.csv` and `listings.csv` from a directory
    pub fn load_dir(dir: &Path) -> Result<Self> {
        Ok(Self::new(
            load_records(&dir.join(PROPERTIES_FILE))?,
            load_records(&dir.join(LEASES_FILE))?,
            load_records(&dir.join(LISTINGS_FILE))?,
        ))
    }

    pub fn property(&self, id: &str) -> Result<&Property, ReportError> {
        self.by_id
            .get(id)
            .map(|&i| &self.properties[i])
            .ok_or_else(|| ReportError::UnknownProperty(id.to_string()))
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn leases_for<'a>(&'a self, building_id: &'a str) -> impl Iterator<Item = &'a Lease> + 'a {
        self.leases.iter().filter(move |l| l.building_id == building_id)
    }

    pub fn listings_for<'a>(
        &'a self,
        building_id: &'a str,
    ) -> impl Iterator<Item = &'a Listing> + 'a {
        self.listings
            .iter()
            .filter(move |l| l.building_id == building_id)
    }

    pub fn leases(&self) -> &[Lease] {
        &self.leases
    }
}
