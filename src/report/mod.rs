//! Building and market reports over property, lease and listing extracts.

mod building;
mod market;
mod records;

pub use building::{BuildingReport, Vacancy, DEFAULT_OCCUPIED_FROM_UNKNOWN, DEFAULT_VACANT_FROM_UNKNOWN};
pub use market::MarketReport;
pub use records::{load_records, read_records, PropertyData, ReportError};
