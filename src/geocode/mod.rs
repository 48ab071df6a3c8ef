//! Address geocoding.

mod nominatim;

pub use nominatim::{
    GeocodeError, GeocodedAddress, Geocoder, NominatimClient, DEFAULT_NOMINATIM_URL,
};
