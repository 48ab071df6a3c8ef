//! Fallback chain from a target to a single footprint.

use geo::{Contains, Intersects, Point};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::FootprintStore;
use crate::models::{Footprint, FootprintId, Target};

/// Step of the fallback chain that produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    /// Point strictly inside the polygon
    Contains,
    /// Point on the polygon, boundary included
    Intersects,
    /// Point on the polygon boundary only
    Touches,
    /// Closest centroid
    CentroidDistance,
}

impl std::fmt::Display for MatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStage::Contains => write!(f, "contains"),
            MatchStage::Intersects => write!(f, "intersects"),
            MatchStage::Touches => write!(f, "touches"),
            MatchStage::CentroidDistance => write!(f, "centroid_distance"),
        }
    }
}

/// How to settle footprints that are equally close to the target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// First footprint in load order wins
    #[default]
    FirstInOrder,
    /// Fail with [`ResolveError::AmbiguousTie`]
    Strict,
}

#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("no candidate footprints to resolve against")]
    EmptyCandidateSet,
    #[error("no footprint matched the target")]
    NoMatch,
    #[error("target coordinate ({0}, {1}) is not finite")]
    NonFiniteTarget(f64, f64),
    #[error("{} footprints are equally close to the target: {}", .0.len(), join_ids(.0))]
    AmbiguousTie(Vec<FootprintId>),
}

fn join_ids(ids: &[FootprintId]) -> String {
    ids.iter()
        .map(FootprintId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of a resolution call
#[derive(Debug, Clone)]
pub struct Resolution<'a> {
    pub footprint: &'a Footprint,
    pub stage: MatchStage,
    /// Predicate that narrowed the candidates before the distance step, if any
    pub narrowed_by: Option<MatchStage>,
    /// Every footprint that matched equally well, in load order (winner included)
    pub tied: Vec<&'a Footprint>,
    /// Centroid distance, when the distance step ran
    pub distance: Option<f64>,
}

impl Resolution<'_> {
    pub fn is_tie(&self) -> bool {
        self.tied.len() > 1
    }

    pub fn tied_ids(&self) -> Vec<FootprintId> {
        self.tied.iter().map(|fp| fp.id.clone()).collect()
    }
}

/// Resolves targets against a [`FootprintStore`].
///
/// Holds no data of its own; one resolver can serve any number of stores and
/// threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestBuildingResolver {
    tie_break: TieBreak,
}

impl NearestBuildingResolver {
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    pub fn strict() -> Self {
        Self::new(TieBreak::Strict)
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    pub fn resolve<'a>(
        &self,
        target: &Target,
        store: &'a FootprintStore,
    ) -> Result<Resolution<'a>, ResolveError> {
        if store.is_empty() {
            return Err(ResolveError::EmptyCandidateSet);
        }

        let origin = target.centroid();
        if !origin.x().is_finite() || !origin.y().is_finite() {
            return Err(ResolveError::NonFiniteTarget(origin.x(), origin.y()));
        }

        let narrowed = match target {
            Target::Point(point) => match_point(*point, store),
            // Geocoded polygons go straight to centroid distance
            Target::Polygon { .. } => None,
        };

        let (stage, candidates) = match narrowed {
            Some((stage, candidates)) if candidates.len() == 1 => {
                let footprint = store.at(candidates[0]);
                debug!("Resolved {} via {}", footprint.id, stage);
                return Ok(Resolution {
                    footprint,
                    stage,
                    narrowed_by: None,
                    tied: vec![footprint],
                    distance: None,
                });
            }
            Some((stage, candidates)) => {
                debug!(
                    "{} candidates via {}, falling back to centroid distance",
                    candidates.len(),
                    stage
                );
                (Some(stage), Some(candidates))
            }
            None => (None, None),
        };

        let (closest, distance) = match candidates {
            Some(candidates) => store.nearest_centroids_among(origin, &candidates),
            None => store.nearest_centroids(origin),
        };

        let Some(&winner) = closest.first() else {
            return Err(ResolveError::NoMatch);
        };

        if closest.len() > 1 && self.tie_break == TieBreak::Strict {
            return Err(ResolveError::AmbiguousTie(
                closest.iter().map(|&o| store.at(o).id.clone()).collect(),
            ));
        }

        let footprint = store.at(winner);
        debug!(
            "Resolved {} via centroid distance {:.8} ({} tied)",
            footprint.id,
            distance,
            closest.len()
        );

        Ok(Resolution {
            footprint,
            stage: MatchStage::CentroidDistance,
            narrowed_by: stage,
            tied: closest.iter().map(|&o| store.at(o)).collect(),
            distance: Some(distance),
        })
    }
}

/// First predicate stage with a non-empty result, with its candidates in load order
fn match_point(point: Point<f64>, store: &FootprintStore) -> Option<(MatchStage, Vec<usize>)> {
    let in_bbox = store.candidates_at(point);
    if in_bbox.is_empty() {
        return None;
    }

    // Intersects already admits boundary points, so Touches only sees what it rejects
    let stages: [(MatchStage, fn(&Footprint, &Point<f64>) -> bool); 3] = [
        (MatchStage::Contains, |fp: &Footprint, p: &Point<f64>| {
            fp.polygon.contains(p)
        }),
        (MatchStage::Intersects, |fp: &Footprint, p: &Point<f64>| {
            fp.polygon.intersects(p)
        }),
        (MatchStage::Touches, touches_boundary),
    ];

    for (stage, predicate) in stages {
        let matched: Vec<usize> = in_bbox
            .iter()
            .copied()
            .filter(|&o| predicate(store.at(o), &point))
            .collect();
        if !matched.is_empty() {
            return Some((stage, matched));
        }
    }

    None
}

/// Point lies on one of the polygon's rings
fn touches_boundary(footprint: &Footprint, point: &Point<f64>) -> bool {
    footprint.polygon.exterior().intersects(point)
        || footprint
            .polygon
            .interiors()
            .iter()
            .any(|ring| ring.intersects(point))
}
