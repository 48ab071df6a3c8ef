//! Query server for building lookups.
//!
//! Loads one city's footprints at startup and serves address and point
//! resolution over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use bldgfinder::config::Config;
use bldgfinder::footprints::{load_footprints, City};
use bldgfinder::geocode::{GeocodeError, NominatimClient};
use bldgfinder::{
    BuildingFinder, FindError, FootprintStore, MatchedBuilding, NearestBuildingResolver,
    ResolveError, Target, TieBreak,
};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Building lookup server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// City whose footprints are served
    #[arg(short, long, default_value = "Berlin")]
    city: City,

    /// Footprint CSV (overrides the configured dataset)
    #[arg(long)]
    data: Option<PathBuf>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Answer 409 when several buildings are equally close
    #[arg(long)]
    strict: bool,
}

/// Application state shared across handlers
struct AppState {
    finder: BuildingFinder,
    geocoder: NominatimClient,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;

    info!("bldgfinder query server for {}", args.city);

    let path = args
        .data
        .clone()
        .unwrap_or_else(|| config.dataset_path(args.city));
    let (footprints, _) = load_footprints(&path, args.city.country_code())?;
    let store = FootprintStore::build(footprints)?;

    let tie_break = if args.strict {
        TieBreak::Strict
    } else {
        TieBreak::FirstInOrder
    };

    let state = Arc::new(AppState {
        finder: BuildingFinder::new(
            args.city,
            Arc::new(store),
            NearestBuildingResolver::new(tie_break),
        ),
        geocoder: NominatimClient::new(
            &config.global.nominatim_url,
            &config.global.user_agent,
            config.timeout(),
        )?,
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/find", get(find_handler))
        .route("/v1/resolve", get(resolve_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        city: state.finder.city().name(),
        footprints: state.finder.store().len(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    city: &'static str,
    footprints: usize,
}

/// Geocode an address and return its building as GeoJSON
async fn find_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FindQueryParams>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let result = state
        .finder
        .find(&state.geocoder, &params.text)
        .await
        .map_err(|e| {
            let status = match &e {
                FindError::Geocode(GeocodeError::AddressNotFound { .. }) => StatusCode::NOT_FOUND,
                FindError::Geocode(_) => StatusCode::BAD_GATEWAY,
                FindError::Resolve(e) => resolve_status(e),
            };
            tracing::warn!("Find '{}' failed: {}", params.text, e);
            (status, e.to_string())
        })?;

    Ok(Json(result.to_feature_collection()))
}

/// Resolve a coordinate to a building
async fn resolve_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResolveQueryParams>,
) -> Result<Json<MatchedBuilding>, (StatusCode, String)> {
    let target = Target::point(params.point_lon, params.point_lat);
    let building = state
        .finder
        .resolve(&target)
        .map_err(|e| (resolve_status(&e), e.to_string()))?;

    Ok(Json(building))
}

fn resolve_status(e: &ResolveError) -> StatusCode {
    match e {
        ResolveError::EmptyCandidateSet | ResolveError::NoMatch => StatusCode::NOT_FOUND,
        ResolveError::AmbiguousTie(_) => StatusCode::CONFLICT,
        ResolveError::NonFiniteTarget(..) => StatusCode::BAD_REQUEST,
    }
}

#[derive(Deserialize)]
struct FindQueryParams {
    /// Free-text address
    text: String,
}

#[derive(Deserialize)]
struct ResolveQueryParams {
    /// Point longitude
    #[serde(rename = "point.lon")]
    point_lon: f64,
    /// Point latitude
    #[serde(rename = "point.lat")]
    point_lat: f64,
}
