//! Nearest-building resolution.
//!
//! Maps a geocoded target onto a building footprint, relaxing the spatial
//! predicate step by step (contains, intersects, touches) before falling back
//! to centroid distance.

mod resolver;
mod store;

pub use resolver::{MatchStage, NearestBuildingResolver, Resolution, ResolveError, TieBreak};
pub use store::{FootprintStore, StoreError};
