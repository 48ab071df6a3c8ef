//! Building footprint datasets.

mod city;
mod loader;

pub use city::{City, UnknownCity};
pub(crate) use loader::open_source;
pub use loader::{load_footprints, parse_geo_blob, read_footprints, LoadSummary};
