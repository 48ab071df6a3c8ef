//! bldgfinder - resolve addresses to building footprints
//!
//! This library provides the shared modules for the `find` and `query` binaries:
//! footprint loading, spatial resolution, geocoding, property matching and
//! building reports.

pub mod address;
pub mod config;
pub mod finder;
pub mod footprints;
pub mod geocode;
pub mod models;
pub mod report;
pub mod resolve;

pub use finder::{BuildingFinder, FindError, FindResult, MatchedBuilding};
pub use models::{Footprint, FootprintId, Target};
pub use resolve::{FootprintStore, NearestBuildingResolver, ResolveError, TieBreak};
