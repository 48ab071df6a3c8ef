//! Immutable, spatially indexed footprint collection.

use geo::Point;
use hashbrown::HashMap;
use rstar::primitives::GeomWithData;
use rstar::{RTree, RTreeObject, AABB};
use thiserror::Error;
use tracing::info;

use crate::models::{Footprint, FootprintId};

/// Distances closer than this (in coordinate units) count as equal
pub(crate) const TIE_EPSILON: f64 = 1e-12;

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("duplicate footprint id: {0}")]
    DuplicateId(FootprintId),
}

/// Wrapper for R-tree indexing of footprint envelopes
#[derive(Clone)]
struct IndexedFootprint {
    ordinal: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedFootprint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

type IndexedCentroid = GeomWithData<[f64; 2], usize>;

/// Footprints of one dataset, in load order.
///
/// The load order is significant: it is the tie-breaker when two footprints
/// match a target equally well. Every lookup reports ordinals sorted ascending.
pub struct FootprintStore {
    footprints: Vec<Footprint>,
    by_id: HashMap<FootprintId, usize>,
    envelopes: RTree<IndexedFootprint>,
    centroids: RTree<IndexedCentroid>,
}

impl FootprintStore {
    /// Build the store and its spatial indexes
    pub fn build(footprints: Vec<Footprint>) -> Result<Self, StoreError> {
        info!("Building footprint index for {} footprints...", footprints.len());

        let mut by_id = HashMap::with_capacity(footprints.len());
        for (ordinal, fp) in footprints.iter().enumerate() {
            if by_id.insert(fp.id.clone(), ordinal).is_some() {
                return Err(StoreError::DuplicateId(fp.id.clone()));
            }
        }

        let indexed: Vec<IndexedFootprint> = footprints
            .iter()
            .enumerate()
            .filter_map(|(ordinal, fp)| {
                let (min_x, min_y, max_x, max_y) = fp.bbox()?;
                Some(IndexedFootprint {
                    ordinal,
                    envelope: AABB::from_corners([min_x, min_y], [max_x, max_y]),
                })
            })
            .collect();

        let centroids: Vec<IndexedCentroid> = footprints
            .iter()
            .enumerate()
            .map(|(ordinal, fp)| GeomWithData::new([fp.centroid.x(), fp.centroid.y()], ordinal))
            .collect();

        let store = Self {
            envelopes: RTree::bulk_load(indexed),
            centroids: RTree::bulk_load(centroids),
            footprints,
            by_id,
        };

        info!("Footprint index built with {} entries", store.len());
        Ok(store)
    }

    pub fn get(&self, id: &FootprintId) -> Option<&Footprint> {
        self.by_id.get(id).map(|&ordinal| &self.footprints[ordinal])
    }

    pub(crate) fn at(&self, ordinal: usize) -> &Footprint {
        &self.footprints[ordinal]
    }

    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }

    /// Iterate over footprints in load order
    pub fn iter(&self) -> impl Iterator<Item = &Footprint> {
        self.footprints.iter()
    }

    /// Ordinals of footprints whose bounding box covers the point
    pub(crate) fn candidates_at(&self, point: Point<f64>) -> Vec<usize> {
        let query_envelope = AABB::from_point([point.x(), point.y()]);
        let mut ordinals: Vec<usize> = self
            .envelopes
            .locate_in_envelope_intersecting(&query_envelope)
            .map(|ib| ib.ordinal)
            .collect();
        ordinals.sort_unstable();
        ordinals
    }

    /// Footprints whose centroid is closest to `origin`, with that distance.
    ///
    /// All footprints within [`TIE_EPSILON`] of the minimum are returned, in
    /// load order. Empty when the store is empty.
    pub(crate) fn nearest_centroids(&self, origin: Point<f64>) -> (Vec<usize>, f64) {
        let query = [origin.x(), origin.y()];
        let mut iter = self.centroids.nearest_neighbor_iter_with_distance_2(&query);

        let Some((first, first_d2)) = iter.next() else {
            return (Vec::new(), f64::INFINITY);
        };

        let best = first_d2.sqrt();
        let mut ordinals = vec![first.data];
        for (entry, d2) in iter {
            if d2.sqrt() > best + TIE_EPSILON {
                break;
            }
            ordinals.push(entry.data);
        }
        ordinals.sort_unstable();
        (ordinals, best)
    }

    /// Same as [`nearest_centroids`](Self::nearest_centroids), restricted to `among`
    pub(crate) fn nearest_centroids_among(
        &self,
        origin: Point<f64>,
        among: &[usize],
    ) -> (Vec<usize>, f64) {
        let mut best = f64::INFINITY;
        let mut ordinals = Vec::new();

        for &ordinal in among {
            let d = centroid_distance(origin, self.footprints[ordinal].centroid);
            if d < best - TIE_EPSILON {
                best = d;
                ordinals.clear();
                ordinals.push(ordinal);
            } else if d <= best + TIE_EPSILON {
                ordinals.push(ordinal);
            }
        }
        ordinals.sort_unstable();
        (ordinals, best)
    }
}

/// Euclidean distance between two points in coordinate units
pub(crate) fn centroid_distance(a: Point<f64>, b: Point<f64>) -> f64 {
    (a.x() - b.x()).hypot(a.y() - b.y())
}
