//! Command-line building lookup.
//!
//! Geocodes one address, resolves it to a building footprint of the chosen
//! city and writes the result as a GeoJSON FeatureCollection.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use bldgfinder::config::Config;
use bldgfinder::footprints::{load_footprints, City};
use bldgfinder::geocode::NominatimClient;
use bldgfinder::{BuildingFinder, FootprintStore, NearestBuildingResolver, TieBreak};

#[derive(Parser, Debug)]
#[command(name = "find")]
#[command(about = "Find the building at an address")]
struct Args {
    /// Free-text address
    address: String,

    /// City whose footprints are searched
    #[arg(short, long, default_value = "Berlin")]
    city: City,

    /// Footprint CSV (overrides the configured dataset)
    #[arg(long)]
    data: Option<PathBuf>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fail when several buildings are equally close instead of taking the first
    #[arg(long)]
    strict: bool,

    /// Write the GeoJSON here instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;

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
    let finder = BuildingFinder::new(
        args.city,
        Arc::new(store),
        NearestBuildingResolver::new(tie_break),
    );

    let geocoder = NominatimClient::new(
        &config.global.nominatim_url,
        &config.global.user_agent,
        config.timeout(),
    )?;

    let result = finder
        .find(&geocoder, &args.address)
        .await
        .with_context(|| format!("Failed to find a building for '{}'", args.address))?;

    info!(
        "{} -> building {} ({})",
        result.address.title, result.building.id, result.building.stage
    );
    if !result.building.tied.is_empty() {
        info!(
            "{} buildings tied, kept the first in load order",
            result.building.tied.len()
        );
    }

    let geojson = serde_json::to_string_pretty(&result.to_feature_collection())?;
    match &args.out {
        Some(out) => {
            fs::write(out, geojson)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Wrote {}", out.display());
        }
        None => println!("{}", geojson),
    }

    Ok(())
}
