//! Property, lease and listing records.
//!
//! Field names map the raw extract columns once, at deserialization time.
//! Report output goes through [`LeaseRow`], which carries the display labels.

use chrono::NaiveDate;
use geo::Point;
use serde::{Deserialize, Serialize};

/// Building-level record from the property extract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "reonomy_id")]
    pub id: String,
    pub address: String,
    #[serde(rename = "address_city")]
    pub city: String,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(rename = "zipcode", default)]
    pub zip: Option<String>,
    #[serde(rename = "address_state", default)]
    pub state: Option<String>,
    /// Rentable square feet
    #[serde(default)]
    pub rsf: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub year_built: Option<i32>,
    #[serde(default)]
    pub year_renovated: Option<i32>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub perc_known: Option<f64>,
    #[serde(default)]
    pub perc_vacant: Option<f64>,
    #[serde(default)]
    pub perc_occupied: Option<f64>,
}

impl Property {
    pub fn location(&self) -> Option<Point<f64>> {
        match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) => Some(Point::new(lon, lat)),
            _ => None,
        }
    }

    pub fn rsf(&self) -> f64 {
        self.rsf.unwrap_or(0.0)
    }

    /// Percentage of the building with known occupancy status (missing → 0)
    pub fn known_pct(&self) -> f64 {
        self.perc_known.unwrap_or(0.0)
    }

    pub fn vacant_pct(&self) -> f64 {
        self.perc_vacant.unwrap_or(0.0)
    }

    pub fn occupied_pct(&self) -> f64 {
        self.perc_occupied.unwrap_or(0.0)
    }

    pub fn is_office(&self) -> bool {
        self.category.as_deref() == Some("Office")
    }
}

/// Lease comp joined to the building it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub id: String,
    /// Identifier of the property in the lease source
    pub property_id: String,
    /// Building the lease was matched to
    #[serde(rename = "ry_id")]
    pub building_id: String,
    #[serde(default)]
    pub tenant_name: Option<String>,
    #[serde(rename = "floor_occupancies", default)]
    pub floor: Option<String>,
    #[serde(default)]
    pub suite: Option<String>,
    /// Leased square feet
    #[serde(rename = "transaction_size", default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub starting_rent: Option<f64>,
    #[serde(default)]
    pub current_rent: Option<f64>,
    #[serde(default)]
    pub effective_rent: Option<f64>,
    #[serde(default)]
    pub avg_rent: Option<f64>,
    #[serde(default)]
    pub asking_rent: Option<f64>,
    #[serde(default)]
    pub lease_escalations: Option<String>,
    #[serde(default)]
    pub execution_date: Option<NaiveDate>,
    #[serde(default)]
    pub commencement_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub submarket: Option<String>,
    #[serde(default)]
    pub space_type: Option<String>,
    #[serde(default)]
    pub break_option_dates: Option<String>,
    #[serde(default)]
    pub break_option_type: Option<String>,
    #[serde(default)]
    pub renewal_options: Option<String>,
    #[serde(default)]
    pub sublease: Option<String>,
    #[serde(default)]
    pub free_rent_type: Option<String>,
    #[serde(default)]
    pub work_value: Option<f64>,
}

impl Lease {
    /// Commenced on or before `today` and not yet expired
    pub fn is_current(&self, today: NaiveDate) -> bool {
        match (self.commencement_date, self.expiration_date) {
            (Some(start), Some(end)) => start <= today && end > today,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingType {
    Sale,
    Lease,
    #[serde(other)]
    Other,
}

/// Availability listing matched to a building
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub property_id: String,
    #[serde(rename = "ry_id")]
    pub building_id: String,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    #[serde(default)]
    pub floor: Option<String>,
    #[serde(default)]
    pub floor_order: Option<i32>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub unit_type: Option<String>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub rate_per_sqft_per_year: Option<f64>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub touched_at: Option<NaiveDate>,
    #[serde(default)]
    pub lease_expiration: Option<String>,
}

/// Lease as presented in market reports
#[derive(Debug, Clone, Serialize)]
pub struct LeaseRow {
    #[serde(rename = "Lease ID")]
    pub lease_id: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Company ID")]
    pub company_id: String,
    #[serde(rename = "Company Name")]
    pub company_name: Option<String>,
    #[serde(rename = "Floor")]
    pub floor: Option<String>,
    #[serde(rename = "Size")]
    pub size: Option<f64>,
    #[serde(rename = "Unit ID")]
    pub unit_id: Option<String>,
    #[serde(rename = "Starting Rate")]
    pub starting_rate: Option<f64>,
    #[serde(rename = "Current Rate")]
    pub current_rate: Option<f64>,
    #[serde(rename = "Average Rate")]
    pub average_rate: Option<f64>,
    #[serde(rename = "Signing Date")]
    pub signing_date: Option<NaiveDate>,
    #[serde(rename = "Start Date")]
    pub start_date: Option<NaiveDate>,
    #[serde(rename = "End Date")]
    pub end_date: Option<NaiveDate>,
    #[serde(rename = "Subleased")]
    pub subleased: Option<String>,
    #[serde(rename = "Extension Options")]
    pub extension_options: Option<String>,
    #[serde(rename = "Termination Type")]
    pub termination_type: Option<String>,
    #[serde(rename = "Termination Dates")]
    pub termination_dates: Option<String>,
    #[serde(rename = "Asking Rate")]
    pub asking_rate: Option<f64>,
    #[serde(rename = "Rate Increase")]
    pub rate_increase: Option<String>,
    #[serde(rename = "Concession Type")]
    pub concession_type: Option<String>,
    #[serde(rename = "Concession Work Value")]
    pub concession_work_value: Option<f64>,
}

impl LeaseRow {
    pub fn new(lease: &Lease, address: &str) -> Self {
        Self {
            lease_id: lease.id.clone(),
            address: address.to_string(),
            company_id: lease.property_id.clone(),
            company_name: lease.tenant_name.clone(),
            floor: lease.floor.clone(),
            size: lease.size,
            unit_id: lease.suite.clone(),
            starting_rate: lease.starting_rent,
            current_rate: lease.current_rent,
            average_rate: lease.avg_rent,
            signing_date: lease.execution_date,
            start_date: lease.commencement_date,
            end_date: lease.expiration_date,
            subleased: lease.sublease.clone(),
            extension_options: lease.renewal_options.clone(),
            termination_type: lease.break_option_type.clone(),
            termination_dates: lease.break_option_dates.clone(),
            asking_rate: lease.asking_rent,
            rate_increase: lease.lease_escalations.clone(),
            concession_type: lease.free_rent_type.clone(),
            concession_work_value: lease.work_value,
        }
    }
}
