//! Core data models for building lookup and reporting.

pub mod footprint;
pub mod property;

pub use footprint::{Footprint, FootprintError, FootprintId, Target};
pub use property::{Lease, LeaseRow, Listing, ListingType, Property};
