use chrono::NaiveDate;
use hashbrown::HashSet;
use tracing::warn;

use super::building::mean;
use super::records::PropertyData;
use crate::models::{Lease, LeaseRow};

/// Leasing activity over a set of buildings
pub struct MarketReport<'a> {
    data: &'a PropertyData,
    ids: HashSet<&'a str>,
    today: NaiveDate,
}

impl<'a> MarketReport<'a> {
    pub fn new<I, S>(data: &'a PropertyData, ids: I, today: NaiveDate) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = ids
            .into_iter()
            .filter_map(|id| match data.property(id.as_ref()) {
                Ok(p) => Some(p.id.as_str()),
                Err(e) => {
                    warn!("{}, left out of market", e);
                    None
                }
            })
            .collect();

        Self { data, ids, today }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn current(&self) -> impl Iterator<Item = &'a Lease> + '_ {
        self.data
            .leases()
            .iter()
            .filter(move |l| self.ids.contains(l.building_id.as_str()) && l.is_current(self.today))
    }

    /// Current leases with their building address, ready for export
    pub fn current_leases(&self) -> Vec<LeaseRow> {
        self.current()
            .filter_map(|lease| {
                let property = self.data.property(&lease.building_id).ok()?;
                Some(LeaseRow::new(lease, &property.address))
            })
            .collect()
    }

    /// Mean current rent across the market; 0 when no current lease states one
    pub fn mean_rent(&self) -> f64 {
        mean(self.current().filter_map(|l| l.current_rent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::records::fixtures::data;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_market_leases_carry_addresses() {
        let data = data();
        let market = MarketReport::new(&data, ["B1", "B2"], today());
        assert_eq!(market.len(), 2);

        let mut rows = market.current_leases();
        rows.sort_by(|a, b| a.lease_id.cmp(&b.lease_id));
        let summary: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.lease_id.as_str(), r.address.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("L1", "1 Main Street"),
                ("L2", "1 Main Street"),
                ("L4", "2 Main Street")
            ]
        );
    }

    #[test]
    fn test_market_mean_rent() {
        let data = data();
        let market = MarketReport::new(&data, ["B1", "B2"], today());
        assert_eq!(market.mean_rent(), 55.0);

        let single = MarketReport::new(&data, vec!["B2".to_string()], today());
        assert_eq!(single.mean_rent(), 50.0);
    }

    #[test]
    fn test_unknown_ids_are_dropped() {
        let data = data();
        let market = MarketReport::new(&data, ["B9"], today());
        assert!(market.is_empty());
        assert_eq!(market.mean_rent(), 0.0);
        assert!(market.current_leases().is_empty());
    }
}
