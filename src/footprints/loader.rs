use anyhow::{Context, Result};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use geo::Coord;
use hashbrown::HashSet;
use serde_json::Value;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::models::Footprint;

/// Counts from one load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    /// Rows for the requested country whose geometry could not be used
    pub skipped: usize,
    /// Rows belonging to other countries
    pub other_countries: usize,
}

/// Load the footprints of one country from the combined building file
pub fn load_footprints(path: &Path, country: &str) -> Result<(Vec<Footprint>, LoadSummary)> {
    info!(
        "Loading {} footprints from {}",
        country.to_uppercase(),
        path.display()
    );

    read_footprints(open_source(path)?, country)
}

/// Open a data file, decompressing `.gz` transparently
pub(crate) fn open_source(path: &Path) -> Result<Box<dyn Read>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    if path.extension().map_or(false, |e| e == "gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Read footprints from CSV.
///
/// Columns `id`, `country` and `geo` are required; every other column is kept
/// as a footprint attribute.
pub fn read_footprints<R: Read>(reader: R, country: &str) -> Result<(Vec<Footprint>, LoadSummary)> {
    //schema

    //id      country geo                                                       year_built ...
    //1001    de      {'type': 'Polygon', 'coordinates': [[[13.37, 52.51], ...]]}  1905

    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();

    let id_idx = headers
        .iter()
        .position(|h| h == "id")
        .context("Column 'id' not found")?;
    let country_idx = headers
        .iter()
        .position(|h| h == "country")
        .context("Column 'country' not found")?;
    let geo_idx = headers
        .iter()
        .position(|h| h == "geo")
        .context("Column 'geo' not found")?;

    let mut footprints = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut summary = LoadSummary::default();

    for (row, result) in csv_reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read footprint row {}", row + 1))?;

        if !record
            .get(country_idx)
            .map_or(false, |c| c.trim().eq_ignore_ascii_case(country))
        {
            summary.other_countries += 1;
            continue;
        }

        let id = record.get(id_idx).unwrap_or("").trim();
        if id.is_empty() {
            warn!("Row {} has no id, skipping", row + 1);
            summary.skipped += 1;
            continue;
        }

        if seen.contains(id) {
            warn!("Duplicate footprint id {} at row {}, keeping the first", id, row + 1);
            summary.skipped += 1;
            continue;
        }

        let ring = match record.get(geo_idx).map(parse_geo_blob) {
            Some(Ok(ring)) => ring,
            Some(Err(e)) => {
                warn!("Bad geometry for footprint {}: {}", id, e);
                summary.skipped += 1;
                continue;
            }
            None => {
                warn!("Footprint {} has no geometry column", id);
                summary.skipped += 1;
                continue;
            }
        };

        let footprint = match Footprint::new(id, ring) {
            Ok(fp) => fp,
            Err(e) => {
                warn!("{}", e);
                summary.skipped += 1;
                continue;
            }
        };

        let attributes = headers
            .iter()
            .zip(record.iter())
            .enumerate()
            .filter(|(i, _)| *i != id_idx && *i != country_idx && *i != geo_idx)
            .map(|(_, (k, v))| (k.to_string(), v.to_string()))
            .collect();

        seen.insert(id.to_string());
        footprints.push(footprint.with_attributes(attributes));
        summary.loaded += 1;
    }

    info!(
        "Loaded {} footprints ({} skipped)",
        summary.loaded, summary.skipped
    );
    Ok((footprints, summary))
}

/// Extract the boundary ring from a serialized geometry.
///
/// Accepts GeoJSON-like JSON as well as the single-quoted dict form written by
/// the upstream exporter. The first ring of a Polygon (or of the first polygon
/// of a MultiPolygon) is the boundary.
pub fn parse_geo_blob(blob: &str) -> Result<Vec<Coord<f64>>> {
    let value: Value = match serde_json::from_str(blob) {
        Ok(v) => v,
        Err(_) => serde_json::from_str(&blob.replace('\'', "\""))
            .context("Geometry is neither JSON nor a quoted dict")?,
    };

    let coordinates = value
        .get("coordinates")
        .context("Geometry has no 'coordinates'")?;

    let mut ring = coordinates.get(0).context("Geometry has no rings")?;
    // MultiPolygon: descend into the first polygon
    if ring.get(0).and_then(|c| c.get(0)).map_or(false, Value::is_array) {
        ring = ring.get(0).context("MultiPolygon has no rings")?;
    }

    ring.as_array()
        .context("Ring is not an array")?
        .iter()
        .map(|pos| {
            let x = pos.get(0).and_then(Value::as_f64);
            let y = pos.get(1).and_then(Value::as_f64);
            match (x, y) {
                (Some(x), Some(y)) => Ok(Coord { x, y }),
                _ => anyhow::bail!("Invalid position {}", pos),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
id,country,geo,year_built,owner
1,de,\"{'type': 'Polygon', 'coordinates': [[[13.0, 52.0], [13.001, 52.0], [13.001, 52.001], [13.0, 52.001], [13.0, 52.0]]]}\",1905,
2,gb,\"{'type': 'Polygon', 'coordinates': [[[0.0, 51.0], [0.001, 51.0], [0.001, 51.001], [0.0, 51.0]]]}\",1960,Crown
3,de,\"{\"\"type\"\": \"\"Polygon\"\", \"\"coordinates\"\": [[[13.1, 52.1], [13.101, 52.1], [13.101, 52.101]]]}\",,Acme
4,DE,\"{'type': 'Point', 'coordinates': [13.2, 52.2]}\",2001,
";

    #[test]
    fn test_read_filters_by_country() {
        let (footprints, summary) = read_footprints(SAMPLE.as_bytes(), "de").unwrap();
        assert_eq!(summary.loaded, 2);
        assert_eq!(summary.other_countries, 1);
        // The Point geometry cannot form a ring
        assert_eq!(summary.skipped, 1);

        let ids: Vec<&str> = footprints.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_attributes_keep_column_order() {
        let (footprints, _) = read_footprints(SAMPLE.as_bytes(), "de").unwrap();
        assert_eq!(
            footprints[1].attributes,
            vec![
                ("year_built".to_string(), String::new()),
                ("owner".to_string(), "Acme".to_string())
            ]
        );
    }

    #[test]
    fn test_duplicate_ids_keep_first_row() {
        let csv = "\
id,country,geo,year_built
7,de,\"{'type': 'Polygon', 'coordinates': [[[13.0, 52.0], [13.001, 52.0], [13.001, 52.001]]]}\",1905
7,de,\"{'type': 'Polygon', 'coordinates': [[[14.0, 53.0], [14.001, 53.0], [14.001, 53.001]]]}\",1999
8,de,\"{'type': 'Polygon', 'coordinates': [[[15.0, 54.0], [15.001, 54.0], [15.001, 54.001]]]}\",2001
";
        let (footprints, summary) = read_footprints(csv.as_bytes(), "de").unwrap();
        assert_eq!(summary.loaded, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            footprints[0].attributes,
            vec![("year_built".to_string(), "1905".to_string())]
        );
        assert!(crate::resolve::FootprintStore::build(footprints).is_ok());
    }

    #[test]
    fn test_missing_geo_column() {
        let err = read_footprints("id,country\n1,de\n".as_bytes(), "de").unwrap_err();
        assert!(err.to_string().contains("geo"));
    }

    #[test]
    fn test_parse_multipolygon_blob() {
        let ring = parse_geo_blob(
            r#"{"type": "MultiPolygon", "coordinates": [[[[1, 1], [2, 1], [2, 2], [1, 1]]]]}"#,
        )
        .unwrap();
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[1], Coord { x: 2.0, y: 1.0 });
    }

    #[test]
    fn test_parse_garbage_blob() {
        assert!(parse_geo_blob("not a geometry").is_err());
        assert!(parse_geo_blob("{'type': 'Polygon'}").is_err());
    }

    #[test]
    fn test_load_gzipped_file() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bldgs.csv.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(SAMPLE.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let (footprints, summary) = load_footprints(&path, "gb").unwrap();
        assert_eq!(summary.loaded, 1);
        assert_eq!(footprints[0].id.as_str(), "2");
    }
}
