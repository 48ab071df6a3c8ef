use chrono::{Months, NaiveDate};
use geo::{Distance, Haversine};

use super::records::{PropertyData, ReportError};
use crate::models::{Lease, Listing, ListingType, Property};

pub const DEFAULT_OCCUPIED_FROM_UNKNOWN: f64 = 0.75;
pub const DEFAULT_VACANT_FROM_UNKNOWN: f64 = 0.25;

/// A listing older than this is assumed to be filled
const STILL_VACANT_MONTHS: u32 = 6;
const METRES_PER_MILE: f64 = 1600.0;

/// Lease listing still considered open
#[derive(Debug, Clone, Copy)]
pub struct Vacancy<'a> {
    pub listing: &'a Listing,
    pub perc_of_bldg_size: Option<f64>,
}

/// Occupancy and revenue figures for one building as of `today`
#[derive(Debug)]
pub struct BuildingReport<'a> {
    property: &'a Property,
    leases: Vec<&'a Lease>,
    listings: Vec<&'a Listing>,
    today: NaiveDate,
}

impl<'a> BuildingReport<'a> {
    pub fn new(data: &'a PropertyData, id: &str, today: NaiveDate) -> Result<Self, ReportError> {
        let property = data.property(id)?;
        Ok(Self {
            property,
            leases: data.leases_for(&property.id).collect(),
            listings: data.listings_for(&property.id).collect(),
            today,
        })
    }

    pub fn property(&self) -> &'a Property {
        self.property
    }

    pub fn current_leases(&self) -> Vec<&'a Lease> {
        self.leases
            .iter()
            .copied()
            .filter(|l| l.is_current(self.today))
            .collect()
    }

    /// Lease listings touched within the last six months
    pub fn current_vacancies(&self) -> Vec<Vacancy<'a>> {
        let Some(cutoff) = self.today.checked_sub_months(Months::new(STILL_VACANT_MONTHS)) else {
            return Vec::new();
        };

        self.listings
            .iter()
            .copied()
            .filter(|l| l.listing_type == ListingType::Lease)
            .filter(|l| l.touched_at.map_or(false, |t| t > cutoff))
            .map(|listing| Vacancy {
                listing,
                perc_of_bldg_size: self.share_of_building(listing.size),
            })
            .collect()
    }

    /// Current leases expiring within `months`
    pub fn upcoming_expirations(&self, months: u32) -> Vec<&'a Lease> {
        let Some(horizon) = self.today.checked_add_months(Months::new(months)) else {
            return self.current_leases();
        };

        self.current_leases()
            .into_iter()
            .filter(|l| l.expiration_date.map_or(false, |d| d <= horizon))
            .collect()
    }

    /// Percentage of the building's rentable area covered by `size`
    pub fn share_of_building(&self, size: Option<f64>) -> Option<f64> {
        let rsf = self.property.rsf();
        match size {
            Some(size) if rsf > 0.0 => Some(size * 100.0 / rsf),
            _ => None,
        }
    }

    /// Mean current rent; 0 when no current lease states one
    pub fn mean_rent(&self) -> f64 {
        mean(self.current_leases().iter().filter_map(|l| l.current_rent))
    }

    /// Annual revenue from current leases, plus the share of unknown space
    /// assumed let at `rent`
    pub fn estimated_revenue(&self, rent: f64, occupied_from_unknown: f64) -> f64 {
        let current = self.current_leases();
        if current.is_empty() {
            return 0.0;
        }

        let known: f64 = current
            .iter()
            .filter_map(|l| l.size.map(|size| size * l.current_rent.unwrap_or(rent)))
            .sum();

        let known_pct = self.property.known_pct();
        if known_pct >= 100.0 {
            return known;
        }

        known + self.property.rsf() * (1.0 - known_pct / 100.0) * occupied_from_unknown * rent
    }

    /// Revenue from letting all estimated vacant space at `rent`
    pub fn vacancy_fill_revenue(&self, rent: f64, vacant_from_unknown: f64) -> f64 {
        let known_pct = self.property.known_pct();
        if known_pct == 0.0 {
            return 0.0;
        }

        let vacant_pct = self.property.vacant_pct() / 100.0;
        let vacant = if known_pct >= 100.0 {
            self.property.rsf() * vacant_pct
        } else {
            self.property.rsf() * (vacant_pct + (1.0 - known_pct / 100.0) * vacant_from_unknown)
        };

        vacant * rent
    }

    /// Ids of other office buildings in the same city within `radius_miles`
    pub fn surrounding<'p>(&self, radius_miles: f64, properties: &'p [Property]) -> Vec<&'p str> {
        let Some(origin) = self.property.location() else {
            return Vec::new();
        };
        let radius = radius_miles * METRES_PER_MILE;

        properties
            .iter()
            .filter(|p| p.id != self.property.id && p.city == self.property.city && p.is_office())
            .filter(|p| {
                p.location()
                    .map_or(false, |loc| Haversine.distance(origin, loc) <= radius)
            })
            .map(|p| p.id.as_str())
            .collect()
    }
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::records::fixtures::data;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn ids(leases: &[&Lease]) -> Vec<String> {
        leases.iter().map(|l| l.id.clone()).collect()
    }

    #[test]
    fn test_current_leases() {
        let data = data();
        let report = BuildingReport::new(&data, "B1", today()).unwrap();
        assert_eq!(ids(&report.current_leases()), vec!["L1", "L2"]);
    }

    #[test]
    fn test_current_vacancies_are_recent_lease_listings() {
        let data = data();
        let report = BuildingReport::new(&data, "B1", today()).unwrap();
        let vacancies = report.current_vacancies();
        assert_eq!(vacancies.len(), 1);
        assert_eq!(vacancies[0].listing.unit.as_deref(), Some("700"));
        assert_eq!(vacancies[0].perc_of_bldg_size, Some(4.0));
    }

    #[test]
    fn test_upcoming_expirations() {
        let data = data();
        let report = BuildingReport::new(&data, "B1", today()).unwrap();
        assert_eq!(ids(&report.upcoming_expirations(12)), vec!["L1"]);
        assert!(report.upcoming_expirations(1).is_empty());
        assert_eq!(ids(&report.upcoming_expirations(48)), vec!["L1", "L2"]);
    }

    #[test]
    fn test_mean_rent_ignores_missing_rents() {
        let data = data();
        let report = BuildingReport::new(&data, "B1", today()).unwrap();
        assert_eq!(report.mean_rent(), 60.0);

        let past = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        let empty = BuildingReport::new(&data, "B1", past).unwrap();
        assert_eq!(empty.mean_rent(), 0.0);
    }

    #[test]
    fn test_estimated_revenue() {
        let data = data();
        let report = BuildingReport::new(&data, "B1", today()).unwrap();
        // 10000 * 60 + 5000 * 70 from leases, 100000 * 0.4 * 0.75 * 70 from unknown space
        let revenue = report.estimated_revenue(70.0, DEFAULT_OCCUPIED_FROM_UNKNOWN);
        assert!((revenue - 3_050_000.0).abs() < 1e-6);

        let vacant = BuildingReport::new(&data, "B3", today()).unwrap();
        assert_eq!(vacant.estimated_revenue(70.0, DEFAULT_OCCUPIED_FROM_UNKNOWN), 0.0);
    }

    #[test]
    fn test_vacancy_fill_revenue() {
        let data = data();
        let report = BuildingReport::new(&data, "B1", today()).unwrap();
        // 100000 * (0.10 + 0.4 * 0.25) * 70
        let revenue = report.vacancy_fill_revenue(70.0, DEFAULT_VACANT_FROM_UNKNOWN);
        assert!((revenue - 1_400_000.0).abs() < 1e-6);

        let unknown = BuildingReport::new(&data, "B2", today()).unwrap();
        assert_eq!(unknown.vacancy_fill_revenue(70.0, DEFAULT_VACANT_FROM_UNKNOWN), 0.0);

        let fully_known = BuildingReport::new(&data, "B3", today()).unwrap();
        assert_eq!(fully_known.vacancy_fill_revenue(70.0, DEFAULT_VACANT_FROM_UNKNOWN), 0.0);
    }

    #[test]
    fn test_surrounding_offices() {
        let data = data();
        let report = BuildingReport::new(&data, "B1", today()).unwrap();
        // B3 is retail, B4 is too far, B5 is in another city
        assert_eq!(report.surrounding(0.5, data.properties()), vec!["B2"]);
        assert!(report.surrounding(0.01, data.properties()).is_empty());
        // B4 is about 9.4 km away: inside six miles, outside five
        assert_eq!(report.surrounding(6.0, data.properties()), vec!["B2", "B4"]);
        assert_eq!(report.surrounding(5.0, data.properties()), vec!["B2"]);
    }

    #[test]
    fn test_unknown_building() {
        let data = data();
        assert!(BuildingReport::new(&data, "B9", today()).is_err());
    }
}
