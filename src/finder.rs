//! Address to building lookup for one city.

use std::sync::Arc;

use geo::Polygon;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use crate::footprints::City;
use crate::geocode::{GeocodeError, GeocodedAddress, Geocoder};
use crate::models::{FootprintId, Target};
use crate::resolve::{FootprintStore, MatchStage, NearestBuildingResolver, ResolveError};

#[derive(Debug, Error)]
pub enum FindError {
    #[error(transparent)]
    Geocode(#[from] GeocodeError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// The building an address resolved to
#[derive(Debug, Clone, Serialize)]
pub struct MatchedBuilding {
    pub id: FootprintId,
    pub stage: MatchStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrowed_by: Option<MatchStage>,
    /// Equally good matches, winner first; empty unless there was a tie
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tied: Vec<FootprintId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip)]
    pub polygon: Polygon<f64>,
    #[serde(skip)]
    pub attributes: Vec<(String, String)>,
}

/// Geocoded address, its building and the popup shown on the map
#[derive(Debug, Clone)]
pub struct FindResult {
    pub address: GeocodedAddress,
    pub building: MatchedBuilding,
    pub popup: String,
}

/// Finds buildings for free-text addresses within one city's footprints
pub struct BuildingFinder {
    city: City,
    store: Arc<FootprintStore>,
    resolver: NearestBuildingResolver,
}

impl BuildingFinder {
    pub fn new(city: City, store: Arc<FootprintStore>, resolver: NearestBuildingResolver) -> Self {
        info!("Retrieved {} buildings in {}", store.len(), city);
        Self {
            city,
            store,
            resolver,
        }
    }

    pub fn city(&self) -> City {
        self.city
    }

    pub fn store(&self) -> &FootprintStore {
        &self.store
    }

    /// Geocode `address` and resolve it to a building
    pub async fn find<G: Geocoder>(
        &self,
        geocoder: &G,
        address: &str,
    ) -> Result<FindResult, FindError> {
        let geocoded = geocoder.search(address, self.city.country_code()).await?;
        Ok(self.locate(geocoded)?)
    }

    /// Resolve an already geocoded address
    pub fn locate(&self, address: GeocodedAddress) -> Result<FindResult, ResolveError> {
        let building = self.resolve(&address.target)?;
        let popup = popup_html(&address, &building);

        Ok(FindResult {
            address,
            building,
            popup,
        })
    }

    /// Resolve a bare target, without an address
    pub fn resolve(&self, target: &Target) -> Result<MatchedBuilding, ResolveError> {
        let resolution = self.resolver.resolve(target, &self.store)?;

        match resolution.narrowed_by {
            Some(stage) => info!(
                "Pin matched several buildings by {}, picked {} by centroid distance",
                stage, resolution.footprint.id
            ),
            None if target.is_point() => info!(
                "Pin resolved to {} via {}",
                resolution.footprint.id, resolution.stage
            ),
            None => info!(
                "Polygon resolved to {} by centroid distance",
                resolution.footprint.id
            ),
        }

        Ok(MatchedBuilding {
            id: resolution.footprint.id.clone(),
            stage: resolution.stage,
            narrowed_by: resolution.narrowed_by,
            tied: if resolution.is_tie() {
                resolution.tied_ids()
            } else {
                Vec::new()
            },
            distance: resolution.distance,
            polygon: resolution.footprint.polygon.clone(),
            attributes: resolution.footprint.attributes.clone(),
        })
    }
}

impl FindResult {
    /// GeoJSON FeatureCollection for the map renderer.
    ///
    /// Always carries a marker at the geocoded location, plus the matched
    /// building for point targets or the geocoded outline for polygon targets.
    pub fn to_feature_collection(&self) -> Value {
        let marker = json!({
            "type": "Feature",
            "geometry": {
                "type": "Point",
                "coordinates": [self.address.lon, self.address.lat]
            },
            "properties": {
                "kind": "marker",
                "tooltip": &self.address.title,
            }
        });

        let (kind, outline) = match &self.address.target {
            Target::Point(_) => ("building", &self.building.polygon),
            Target::Polygon { polygon, .. } => ("address", polygon),
        };

        let outline = json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": polygon_coordinates(outline)
            },
            "properties": {
                "kind": kind,
                "building_id": &self.building.id,
                "match": &self.building,
                "tooltip": &self.address.title,
                "popup": &self.popup,
            }
        });

        json!({
            "type": "FeatureCollection",
            "features": [marker, outline]
        })
    }
}

fn polygon_coordinates(polygon: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect())
        .collect()
}

/// Popup body: title, building id, country, then the building's own attributes
fn popup_html(address: &GeocodedAddress, building: &MatchedBuilding) -> String {
    let mut html = format!(
        "<h3> {} </h3>\n<b>Building ID:</b> {}<br>\nCountry: {}<br>\n",
        escape(&address.title),
        escape(building.id.as_str()),
        escape(address.country.as_deref().unwrap_or("")),
    );

    for (key, value) in &building.attributes {
        if key.contains("id") || key.contains("country") || value.trim().is_empty() {
            continue;
        }
        html.push_str(&format!("{}: {}<br>\n", escape(key), escape(value)));
    }

    html
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Footprint;
    use geo::{Coord, LineString, Point};

    fn rect(id: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> Footprint {
        Footprint::new(
            id,
            vec![
                Coord { x: x0, y: y0 },
                Coord { x: x1, y: y0 },
                Coord { x: x1, y: y1 },
                Coord { x: x0, y: y1 },
            ],
        )
        .unwrap()
    }

    fn finder() -> BuildingFinder {
        let store = FootprintStore::build(vec![
            rect("A", 0.0, 0.0, 1.0, 1.0).with_attributes(vec![
                ("year_built".to_string(), "1905".to_string()),
                ("osm_id".to_string(), "77".to_string()),
                ("owner".to_string(), String::new()),
                ("use".to_string(), "Shops & <Offices>".to_string()),
            ]),
            rect("B", 1.0, 0.0, 2.0, 1.0),
        ])
        .unwrap();
        BuildingFinder::new(
            City::Berlin,
            Arc::new(store),
            NearestBuildingResolver::default(),
        )
    }

    fn geocoded(target: Target) -> GeocodedAddress {
        let c = target.centroid();
        GeocodedAddress {
            display_name: "Somewhere 1, Mitte, Berlin, Deutschland".to_string(),
            title: "Somewhere 1, Mitte, Berlin".to_string(),
            country: Some("Deutschland".to_string()),
            lat: c.y(),
            lon: c.x(),
            target,
        }
    }

    struct FixedGeocoder(GeocodedAddress);

    impl Geocoder for FixedGeocoder {
        async fn search(
            &self,
            _address: &str,
            country: &str,
        ) -> Result<GeocodedAddress, GeocodeError> {
            assert_eq!(country, "de");
            Ok(self.0.clone())
        }
    }

    struct NoHits;

    impl Geocoder for NoHits {
        async fn search(
            &self,
            address: &str,
            country: &str,
        ) -> Result<GeocodedAddress, GeocodeError> {
            Err(GeocodeError::AddressNotFound {
                address: address.to_string(),
                country: country.to_string(),
            })
        }
    }

    #[test]
    fn test_locate_point_inside() {
        let result = finder().locate(geocoded(Target::point(0.5, 0.5))).unwrap();
        assert_eq!(result.building.id.as_str(), "A");
        assert_eq!(result.building.stage, MatchStage::Contains);
        assert!(result.building.tied.is_empty());
    }

    #[test]
    fn test_popup_skips_ids_and_empty_values() {
        let result = finder().locate(geocoded(Target::point(0.5, 0.5))).unwrap();
        let popup = &result.popup;
        assert!(popup.starts_with("<h3> Somewhere 1, Mitte, Berlin </h3>"));
        assert!(popup.contains("<b>Building ID:</b> A<br>"));
        assert!(popup.contains("Country: Deutschland<br>"));
        assert!(popup.contains("year_built: 1905<br>"));
        assert!(popup.contains("use: Shops &amp; &lt;Offices&gt;<br>"));
        assert!(!popup.contains("osm_id"));
        assert!(!popup.contains("owner"));
    }

    #[test]
    fn test_feature_collection_for_point_target() {
        let result = finder().locate(geocoded(Target::point(1.0, 0.5))).unwrap();
        let fc = result.to_feature_collection();

        assert_eq!(fc["type"], "FeatureCollection");
        let features = fc["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["geometry"]["coordinates"], json!([1.0, 0.5]));
        assert_eq!(features[1]["properties"]["kind"], "building");
        assert_eq!(features[1]["properties"]["building_id"], "A");
        assert_eq!(features[1]["properties"]["match"]["stage"], "centroid_distance");
        assert_eq!(features[1]["properties"]["match"]["tied"], json!(["A", "B"]));
        assert_eq!(
            features[1]["geometry"]["coordinates"][0][0],
            json!([0.0, 0.0])
        );
    }

    #[test]
    fn test_feature_collection_for_polygon_target() {
        let poly = Polygon::new(
            LineString::from(vec![(1.2, 0.2), (1.8, 0.2), (1.8, 0.8), (1.2, 0.8)]),
            vec![],
        );
        let target = Target::polygon_with_centroid(poly, Point::new(1.5, 0.5));
        let result = finder().locate(geocoded(target)).unwrap();
        assert_eq!(result.building.id.as_str(), "B");

        let fc = result.to_feature_collection();
        let outline = &fc["features"][1];
        assert_eq!(outline["properties"]["kind"], "address");
        assert_eq!(outline["geometry"]["coordinates"][0][0], json!([1.2, 0.2]));
    }

    #[test]
    fn test_resolve_bare_point() {
        let finder = finder();
        let building = finder.resolve(&Target::point(3.0, 0.5)).unwrap();
        assert_eq!(building.id.as_str(), "B");
        assert_eq!(building.stage, MatchStage::CentroidDistance);
        assert_eq!(building.distance, Some(1.5));
    }

    #[tokio::test]
    async fn test_find_through_geocoder() {
        let geocoder = FixedGeocoder(geocoded(Target::point(1.5, 0.5)));
        let result = finder().find(&geocoder, "Somewhere 1").await.unwrap();
        assert_eq!(result.building.id.as_str(), "B");
    }

    #[tokio::test]
    async fn test_find_address_not_found() {
        let err = finder().find(&NoHits, "Nowhere 0").await.unwrap_err();
        assert!(matches!(
            err,
            FindError::Geocode(GeocodeError::AddressNotFound { .. })
        ));
    }
}
