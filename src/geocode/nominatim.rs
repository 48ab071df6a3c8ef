//! Nominatim search client.

use std::future::Future;
use std::time::Duration;

use geo::{LineString, Point, Polygon};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::models::Target;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("address not found: {address}. Make sure it belongs to {country}")]
    AddressNotFound { address: String, country: String },
    #[error("geocoder returned an invalid coordinate: {0}")]
    InvalidCoordinate(String),
    #[error("invalid geocoder url: {0}")]
    Url(#[from] url::ParseError),
    #[error("geocoder url cannot take a path: {0}")]
    CannotBeABase(String),
    #[error("geocoder request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Something that turns a free-text address into a [`GeocodedAddress`]
pub trait Geocoder {
    /// Search `address`, restricted to the ISO country code `country`
    fn search(
        &self,
        address: &str,
        country: &str,
    ) -> impl Future<Output = Result<GeocodedAddress, GeocodeError>> + Send;
}

/// Best geocoder hit for an address
#[derive(Debug, Clone)]
pub struct GeocodedAddress {
    pub display_name: String,
    /// First three parts of the display name
    pub title: String,
    pub country: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub target: Target,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    address: HitAddress,
    geojson: Option<HitGeometry>,
}

#[derive(Debug, Default, Deserialize)]
struct HitAddress {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum HitGeometry {
    Point { coordinates: [f64; 2] },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    #[serde(other)]
    Other,
}

impl GeocodedAddress {
    fn from_hit(hit: SearchHit) -> Result<Self, GeocodeError> {
        let lat = parse_coordinate(&hit.lat)?;
        let lon = parse_coordinate(&hit.lon)?;

        let target = match hit.geojson {
            Some(HitGeometry::Point { coordinates: [x, y] }) => Target::point(x, y),
            Some(HitGeometry::Polygon { coordinates }) if !coordinates.is_empty() => {
                let mut rings = coordinates.into_iter().map(|ring| {
                    LineString::from(ring.into_iter().map(|[x, y]| (x, y)).collect::<Vec<_>>())
                });
                match rings.next() {
                    Some(exterior) if exterior.0.len() >= 3 => {
                        let polygon = Polygon::new(exterior, rings.collect());
                        // The hit's own lat/lon is the polygon's reference point
                        Target::polygon_with_centroid(polygon, Point::new(lon, lat))
                    }
                    _ => Target::point(lon, lat),
                }
            }
            _ => Target::point(lon, lat),
        };

        Ok(Self {
            title: short_title(&hit.display_name),
            display_name: hit.display_name,
            country: hit.address.country,
            lat,
            lon,
            target,
        })
    }
}

/// Finite coordinate from Nominatim's string form ("NaN" and "inf" are rejected)
fn parse_coordinate(raw: &str) -> Result<f64, GeocodeError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GeocodeError::InvalidCoordinate(raw.to_string()))
}

/// First three comma-separated parts of a display name
pub(crate) fn short_title(display_name: &str) -> String {
    display_name
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .take(3)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Geocodes addresses against a Nominatim instance
#[derive(Clone)]
pub struct NominatimClient {
    client: Client,
    search_url: Url,
}

impl NominatimClient {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, GeocodeError> {
        let mut search_url = Url::parse(base_url)?;
        search_url
            .path_segments_mut()
            .map_err(|_| GeocodeError::CannotBeABase(base_url.to_string()))?
            .pop_if_empty()
            .push("search");

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, search_url })
    }
}

impl Geocoder for NominatimClient {
    async fn search(&self, address: &str, country: &str) -> Result<GeocodedAddress, GeocodeError> {
        info!("Geocoding '{}' in {}", address, country.to_uppercase());

        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("q", address)
            .append_pair("format", "json")
            .append_pair("polygon_geojson", "1")
            .append_pair("addressdetails", "1")
            .append_pair("countrycodes", country);

        let hits: Vec<SearchHit> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("Nominatim returned {} hits", hits.len());

        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::AddressNotFound {
                address: address.to_string(),
                country: country.to_uppercase(),
            })?;

        GeocodedAddress::from_hit(hit)
    }
}
